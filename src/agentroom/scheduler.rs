//! Speaker selection.
//!
//! Each turn every active agent except the previous speaker volunteers with
//! probability `chattiness + min(silence_turns * 0.15, 0.4)`, clamped to
//! `[0, 1]`. When nobody volunteers the longest-silent eligible agent is picked
//! deterministically, ties going to roster order.

use crate::personality::AgentConfig;
use crate::random::RandomSource;
use std::collections::HashMap;

/// Bonus added per turn of silence.
pub const SILENCE_BONUS_PER_TURN: f64 = 0.15;
/// Cap on the accumulated silence bonus.
pub const SILENCE_BONUS_CAP: f64 = 0.4;

/// Probability that an agent volunteers to speak this turn.
pub fn speak_probability(chattiness: f64, silence_turns: u32) -> f64 {
    let bonus = (silence_turns as f64 * SILENCE_BONUS_PER_TURN).min(SILENCE_BONUS_CAP);
    (chattiness + bonus).clamp(0.0, 1.0)
}

fn silence_of(silence: &HashMap<String, u32>, name: &str) -> u32 {
    silence.get(name).copied().unwrap_or(0)
}

fn eligible<'a>(
    active: &'a [&'a AgentConfig],
    last_speaker: Option<&'a str>,
) -> impl Iterator<Item = &'a AgentConfig> + 'a {
    active
        .iter()
        .copied()
        .filter(move |agent| Some(agent.name()) != last_speaker)
}

/// The longest-silent eligible agent; the first one in roster order wins ties.
pub fn fallback_speaker(
    active: &[&AgentConfig],
    last_speaker: Option<&str>,
    silence: &HashMap<String, u32>,
) -> Option<String> {
    let mut best: Option<(&AgentConfig, u32)> = None;
    for agent in eligible(active, last_speaker) {
        let turns = silence_of(silence, agent.name());
        match best {
            Some((_, best_turns)) if turns <= best_turns => {}
            _ => best = Some((agent, turns)),
        }
    }
    best.map(|(agent, _)| agent.name().to_string())
}

/// Probabilistic candidate set for the current turn.
///
/// Draws exactly once per eligible agent, in roster order.
pub fn select_candidates(
    active: &[&AgentConfig],
    last_speaker: Option<&str>,
    silence: &HashMap<String, u32>,
    rng: &mut dyn RandomSource,
) -> Vec<String> {
    let mut candidates = Vec::new();
    for agent in eligible(active, last_speaker) {
        let p = speak_probability(
            agent.personality.chattiness,
            silence_of(silence, agent.name()),
        );
        if rng.next_f64() < p {
            candidates.push(agent.name().to_string());
        }
    }

    if candidates.is_empty() {
        if let Some(name) = fallback_speaker(active, last_speaker, silence) {
            log::debug!(
                "agentroom::scheduler::select_candidates(...): nobody volunteered, falling back to {}",
                name
            );
            candidates.push(name);
        }
    }
    candidates
}

/// Deterministic preview: every eligible agent silent for at least one turn.
///
/// Consumes no randomness, so it can be called any number of times without
/// affecting the next real turn.
pub fn peek_candidates(
    active: &[&AgentConfig],
    last_speaker: Option<&str>,
    silence: &HashMap<String, u32>,
) -> Vec<String> {
    let candidates: Vec<String> = eligible(active, last_speaker)
        .filter(|agent| silence_of(silence, agent.name()) >= 1)
        .map(|agent| agent.name().to_string())
        .collect();

    if candidates.is_empty() {
        fallback_speaker(active, last_speaker, silence)
            .into_iter()
            .collect()
    } else {
        candidates
    }
}
