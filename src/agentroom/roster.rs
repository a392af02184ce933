//! Active/benched partition of a room's agent population.
//!
//! The [`Roster`] is owned by the [`ChatRoom`](crate::room::ChatRoom) and only
//! mutated through its `open`, `step` and `shuffle` operations. Every agent
//! in the population is in exactly one of the two sets at all times.

use crate::config::ChurnBounds;
use crate::error::RoomError;
use crate::personality::AgentConfig;
use crate::random::{shuffle_with, RandomSource};
use std::collections::HashMap;

/// Fraction of the population seated when a room opens.
pub const INITIAL_ACTIVE_FRACTION: f64 = 0.5;

/// Silence credited to an agent when it joins, so it gets a word in soon.
pub const JOIN_SILENCE_BIAS: u32 = 3;

pub struct Roster {
    population: Vec<AgentConfig>,
    /// Indices into `population`, in seating order.
    active: Vec<usize>,
    benched: Vec<usize>,
    silence: HashMap<String, u32>,
    last_speaker: Option<String>,
}

impl Roster {
    /// A roster with everybody benched. Call one of the partition methods before use.
    pub fn new(population: Vec<AgentConfig>) -> Self {
        let benched = (0..population.len()).collect();
        Self {
            population,
            active: Vec::new(),
            benched,
            silence: HashMap::new(),
            last_speaker: None,
        }
    }

    /// Seat a fresh partition.
    ///
    /// `initial = clamp(floor(n * 0.5), min, max)`. Priority agents go first in
    /// ascending priority order and are never cut by `initial` (up to `max`);
    /// the rest are shuffled and fill the remaining seats.
    pub fn partition(&mut self, bounds: ChurnBounds, rng: &mut dyn RandomSource) {
        let n = self.population.len();
        let initial = ((n as f64 * INITIAL_ACTIVE_FRACTION).floor() as usize)
            .clamp(bounds.min_agents, bounds.max_agents);

        let mut priority: Vec<usize> = (0..n)
            .filter(|&i| self.population[i].is_priority())
            .collect();
        priority.sort_by_key(|&i| self.population[i].priority);

        let mut rest: Vec<usize> = (0..n)
            .filter(|&i| !self.population[i].is_priority())
            .collect();
        shuffle_with(rng, &mut rest);

        let seats = initial
            .max(priority.len().min(bounds.max_agents))
            .min(n);

        let mut order = priority;
        order.extend(rest);
        self.benched = order.split_off(seats);
        self.active = order;
        self.reset_turn_state();
    }

    /// Seat exactly the named agents, in the given order, benching everyone else.
    pub fn partition_preferred(&mut self, names: &[String]) -> Result<(), RoomError> {
        let mut active = Vec::with_capacity(names.len());
        for name in names {
            let index = self
                .index_of(name)
                .ok_or_else(|| RoomError::UnknownAgent(name.clone()))?;
            if !active.contains(&index) {
                active.push(index);
            }
        }
        self.benched = (0..self.population.len())
            .filter(|i| !active.contains(i))
            .collect();
        self.active = active;
        self.reset_turn_state();
        Ok(())
    }

    /// Check an explicit roster before it is seated: every name must be known
    /// and the distinct count must lie within `bounds`.
    pub fn check_preferred(&self, names: &[String], bounds: ChurnBounds) -> Result<(), RoomError> {
        let mut distinct: Vec<&str> = Vec::with_capacity(names.len());
        for name in names {
            if self.index_of(name).is_none() {
                return Err(RoomError::UnknownAgent(name.clone()));
            }
            if !distinct.contains(&name.as_str()) {
                distinct.push(name);
            }
        }
        if distinct.len() < bounds.min_agents || distinct.len() > bounds.max_agents {
            return Err(RoomError::InvalidConfig(format!(
                "preferred roster seats {} agents, outside {}..={}",
                distinct.len(),
                bounds.min_agents,
                bounds.max_agents
            )));
        }
        Ok(())
    }

    /// Bring a persisted roster back within `bounds`. Unknown and repeated
    /// names are skipped, the list is cut at `max`, and a short list is topped
    /// up with priority agents first, then in population order.
    pub fn fit_to_bounds(&self, names: &[String], bounds: ChurnBounds) -> Vec<String> {
        let mut seated: Vec<usize> = Vec::with_capacity(bounds.max_agents);
        for name in names {
            if let Some(index) = self.index_of(name) {
                if !seated.contains(&index) {
                    seated.push(index);
                }
            }
        }
        seated.truncate(bounds.max_agents);

        if seated.len() < bounds.min_agents {
            let mut spare: Vec<usize> = (0..self.population.len())
                .filter(|i| !seated.contains(i))
                .collect();
            spare.sort_by_key(|&i| {
                let agent = &self.population[i];
                (!agent.is_priority(), agent.priority)
            });
            let missing = bounds.min_agents - seated.len();
            seated.extend(spare.into_iter().take(missing));
        }

        seated
            .into_iter()
            .map(|i| self.population[i].name().to_string())
            .collect()
    }

    /// Forget the previous speaker and zero every silence counter.
    pub fn reset_turn_state(&mut self) {
        self.last_speaker = None;
        self.silence = self
            .active
            .iter()
            .map(|&i| (self.population[i].name().to_string(), 0))
            .collect();
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.population.iter().position(|a| a.name() == name)
    }

    pub fn population(&self) -> &[AgentConfig] {
        &self.population
    }

    pub fn get(&self, name: &str) -> Option<&AgentConfig> {
        self.index_of(name).map(|i| &self.population[i])
    }

    /// Position of an agent in the population, used to derive its default color.
    pub fn population_index(&self, name: &str) -> Option<usize> {
        self.index_of(name)
    }

    pub fn active(&self) -> Vec<&AgentConfig> {
        self.active.iter().map(|&i| &self.population[i]).collect()
    }

    pub fn benched(&self) -> Vec<&AgentConfig> {
        self.benched.iter().map(|&i| &self.population[i]).collect()
    }

    pub fn active_names(&self) -> Vec<String> {
        self.active
            .iter()
            .map(|&i| self.population[i].name().to_string())
            .collect()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active
            .iter()
            .any(|&i| self.population[i].name() == name)
    }

    /// Move an active agent to the bench. Returns `false` if it was not active.
    pub fn bench(&mut self, name: &str) -> bool {
        let Some(pos) = self
            .active
            .iter()
            .position(|&i| self.population[i].name() == name)
        else {
            return false;
        };
        let index = self.active.remove(pos);
        self.benched.push(index);
        self.silence.remove(name);
        if self.last_speaker.as_deref() == Some(name) {
            self.last_speaker = None;
        }
        true
    }

    /// Seat a benched agent with a head start on silence. Returns `false` if it was not benched.
    pub fn activate(&mut self, name: &str) -> bool {
        let Some(pos) = self
            .benched
            .iter()
            .position(|&i| self.population[i].name() == name)
        else {
            return false;
        };
        let index = self.benched.remove(pos);
        self.active.push(index);
        self.silence.insert(name.to_string(), JOIN_SILENCE_BIAS);
        true
    }

    /// One more turn of silence for everyone seated.
    pub fn tick(&mut self) {
        for &i in &self.active {
            *self
                .silence
                .entry(self.population[i].name().to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn record_speech(&mut self, name: &str) {
        self.last_speaker = Some(name.to_string());
        self.silence.insert(name.to_string(), 0);
    }

    pub fn last_speaker(&self) -> Option<&str> {
        self.last_speaker.as_deref()
    }

    pub fn silence(&self) -> &HashMap<String, u32> {
        &self.silence
    }

    pub fn silence_of(&self, name: &str) -> u32 {
        self.silence.get(name).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personality::{Personality, ProviderRef};
    use crate::random::ScriptedRandom;

    fn agent(name: &str, priority: Option<u32>) -> AgentConfig {
        let mut agent = AgentConfig::new(Personality::new(name, "t"), ProviderRef::new("mock", "m"));
        agent.priority = priority;
        agent
    }

    fn bounds(min_agents: usize, max_agents: usize) -> ChurnBounds {
        ChurnBounds {
            min_agents,
            max_agents,
        }
    }

    #[test]
    fn test_initial_count_is_half_clamped() {
        let pop: Vec<AgentConfig> = (0..8).map(|i| agent(&format!("A{i}"), None)).collect();
        let mut roster = Roster::new(pop);
        roster.partition(bounds(2, 3), &mut ScriptedRandom::constant(0.3));
        assert_eq!(roster.active_len(), 3);
        assert_eq!(roster.benched().len(), 5);

        let pop: Vec<AgentConfig> = (0..3).map(|i| agent(&format!("A{i}"), None)).collect();
        let mut roster = Roster::new(pop);
        roster.partition(bounds(2, 5), &mut ScriptedRandom::constant(0.3));
        assert_eq!(roster.active_len(), 2);
    }

    #[test]
    fn test_priority_agents_seated_first_in_order() {
        let pop = vec![
            agent("Free1", None),
            agent("Second", Some(2)),
            agent("Free2", None),
            agent("First", Some(1)),
            agent("Free3", None),
            agent("Free4", None),
        ];
        let mut roster = Roster::new(pop);
        roster.partition(bounds(2, 4), &mut ScriptedRandom::constant(0.0));
        let names = roster.active_names();
        assert_eq!(names.len(), 3);
        assert_eq!(&names[..2], &["First".to_string(), "Second".to_string()]);
    }

    #[test]
    fn test_priority_agents_exceed_initial_count() {
        let pop = vec![
            agent("P1", Some(1)),
            agent("P2", Some(2)),
            agent("P3", Some(3)),
            agent("F1", None),
        ];
        let mut roster = Roster::new(pop);
        roster.partition(bounds(1, 5), &mut ScriptedRandom::constant(0.0));
        assert_eq!(roster.active_names(), vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn test_preferred_partition_keeps_order() {
        let pop = vec![agent("A", None), agent("B", None), agent("C", None)];
        let mut roster = Roster::new(pop);
        roster
            .partition_preferred(&["C".to_string(), "A".to_string()])
            .unwrap();
        assert_eq!(roster.active_names(), vec!["C", "A"]);
        assert_eq!(roster.benched().len(), 1);
        assert!(roster.partition_preferred(&["Z".to_string()]).is_err());
    }

    #[test]
    fn test_check_preferred_enforces_bounds() {
        let pop = vec![agent("A", None), agent("B", None), agent("C", None), agent("D", None)];
        let roster = Roster::new(pop);
        let names = |list: &[&str]| list.iter().map(|n| n.to_string()).collect::<Vec<_>>();

        assert!(roster.check_preferred(&names(&["A", "B"]), bounds(2, 3)).is_ok());
        assert!(matches!(
            roster.check_preferred(&names(&[]), bounds(2, 3)),
            Err(RoomError::InvalidConfig(_))
        ));
        // Repeats count once.
        assert!(matches!(
            roster.check_preferred(&names(&["A", "A"]), bounds(2, 3)),
            Err(RoomError::InvalidConfig(_))
        ));
        assert!(matches!(
            roster.check_preferred(&names(&["A", "B", "C", "D"]), bounds(2, 3)),
            Err(RoomError::InvalidConfig(_))
        ));
        assert!(matches!(
            roster.check_preferred(&names(&["A", "Z"]), bounds(2, 3)),
            Err(RoomError::UnknownAgent(name)) if name == "Z"
        ));
    }

    #[test]
    fn test_fit_to_bounds_trims_and_tops_up() {
        let pop = vec![
            agent("A", None),
            agent("B", None),
            agent("P", Some(1)),
            agent("C", None),
            agent("D", None),
        ];
        let roster = Roster::new(pop);
        let names = |list: &[&str]| list.iter().map(|n| n.to_string()).collect::<Vec<_>>();

        assert_eq!(
            roster.fit_to_bounds(&names(&["D", "C", "B", "A"]), bounds(2, 3)),
            vec!["D", "C", "B"]
        );
        assert_eq!(
            roster.fit_to_bounds(&names(&["D", "Gone"]), bounds(3, 4)),
            vec!["D", "P", "A"]
        );
        assert_eq!(roster.fit_to_bounds(&names(&["C", "A"]), bounds(2, 4)), vec!["C", "A"]);
    }

    #[test]
    fn test_bench_and_activate_move_between_sets() {
        let pop = vec![agent("A", None), agent("B", None), agent("C", None)];
        let mut roster = Roster::new(pop);
        roster
            .partition_preferred(&["A".to_string(), "B".to_string()])
            .unwrap();
        roster.record_speech("A");
        assert!(roster.bench("A"));
        assert!(roster.last_speaker().is_none());
        assert!(!roster.bench("A"));
        assert!(roster.activate("C"));
        assert_eq!(roster.silence_of("C"), JOIN_SILENCE_BIAS);
        assert_eq!(roster.active_len() + roster.benched().len(), 3);
    }

    #[test]
    fn test_tick_and_record_speech() {
        let pop = vec![agent("A", None), agent("B", None)];
        let mut roster = Roster::new(pop);
        roster
            .partition_preferred(&["A".to_string(), "B".to_string()])
            .unwrap();
        roster.tick();
        roster.tick();
        roster.record_speech("B");
        assert_eq!(roster.silence_of("A"), 2);
        assert_eq!(roster.silence_of("B"), 0);
        assert_eq!(roster.last_speaker(), Some("B"));
    }
}
