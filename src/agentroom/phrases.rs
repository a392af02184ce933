//! Canned lines for membership changes.

use crate::random::RandomSource;

pub const LEAVE_EXCUSES: &[&str] = &[
    "has to take a call",
    "stepped out for coffee",
    "got pulled into another meeting",
    "needs a minute to think",
    "wandered off to stretch",
    "lost their connection",
    "went to check on something",
    "is heading out for now",
];

pub const JOIN_GREETINGS: &[&str] = &[
    "Hey everyone, what did I miss?",
    "Mind if I jump in?",
    "Hi all, carry on, I'll catch up.",
    "Sorry I'm late, what are we on?",
    "Hello! This sounds interesting.",
    "Evening, folks.",
    "Pulling up a chair.",
    "I heard my name, or maybe not. Hi!",
];

pub fn random_excuse(rng: &mut dyn RandomSource) -> &'static str {
    LEAVE_EXCUSES[rng.pick_index(LEAVE_EXCUSES.len())]
}

pub fn random_greeting(rng: &mut dyn RandomSource) -> &'static str {
    JOIN_GREETINGS[rng.pick_index(JOIN_GREETINGS.len())]
}

/// Content of a `leave` message.
pub fn leave_line(name: &str, excuse: &str) -> String {
    format!("{} {}", name, excuse)
}

/// Content of a `join` message after churn or a reshuffle.
pub fn join_line(tagline: &str, greeting: &str) -> String {
    format!("{} | \"{}\"", tagline, greeting)
}
