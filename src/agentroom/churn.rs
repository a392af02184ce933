//! Membership churn: who drifts out of the room and who wanders in.
//!
//! [`evaluate`] is a pure function of the rosters, the bounds and the random
//! source. Leave and join are independent draws; either, both or neither may
//! fire in one evaluation. Priority agents are never chosen to leave.

use crate::config::ChurnBounds;
use crate::personality::AgentConfig;
use crate::random::RandomSource;

/// Base leave probability, scaled by `1 - chattiness`.
pub const LEAVE_PROBABILITY: f64 = 0.25;
/// Probability that a benched agent joins on an evaluation.
pub const JOIN_PROBABILITY: f64 = 0.3;

/// Outcome of one churn evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChurnDecision {
    pub leave: Option<String>,
    pub join: Option<String>,
}

impl ChurnDecision {
    pub fn is_empty(&self) -> bool {
        self.leave.is_none() && self.join.is_none()
    }
}

/// Decide whether one active agent leaves and/or one benched agent joins.
///
/// Draw order: leaver pick, leave roll, join roll, joiner pick. Gates that
/// fail (bounds, empty pools) consume no draws.
pub fn evaluate(
    active: &[&AgentConfig],
    benched: &[&AgentConfig],
    bounds: ChurnBounds,
    rng: &mut dyn RandomSource,
) -> ChurnDecision {
    let mut decision = ChurnDecision::default();

    if active.len() > bounds.min_agents {
        let evictable: Vec<&AgentConfig> = active
            .iter()
            .copied()
            .filter(|agent| !agent.is_priority())
            .collect();

        if !evictable.is_empty() {
            let candidate = evictable[rng.pick_index(evictable.len())];
            let p = LEAVE_PROBABILITY * (1.0 - candidate.personality.chattiness);
            if rng.next_f64() < p {
                decision.leave = Some(candidate.name().to_string());
            }
        }
    }

    let active_after_leave = active.len() - usize::from(decision.leave.is_some());
    if !benched.is_empty() && active_after_leave < bounds.max_agents {
        if rng.next_f64() < JOIN_PROBABILITY {
            let pool: Vec<&AgentConfig> = benched
                .iter()
                .copied()
                .filter(|agent| Some(agent.name()) != decision.leave.as_deref())
                .collect();
            if !pool.is_empty() {
                decision.join = Some(pool[rng.pick_index(pool.len())].name().to_string());
            }
        }
    }

    decision
}
