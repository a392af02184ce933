//! Prompt construction for a single turn.
//!
//! The prompt is a system message describing who the agent is, followed by
//! the last `context_window` history entries rendered from the speaker's point
//! of view, followed by a short nudge asking for the next line.

use crate::config::RoomConfig;
use crate::message::{MessageKind, RoomMessage};
use crate::personality::Personality;
use crate::provider::{ChatRole, PromptMessage};

/// Tag used for the human participant inside prompts.
pub const HOST_TAG: &str = "HOST";
/// Tag used for narration inside prompts.
pub const NARRATOR_TAG: &str = "SYSTEM";

/// System prompt for `personality` in a room about `config.topic`.
pub fn system_prompt(personality: &Personality, config: &RoomConfig) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("You are {}. {}\n", personality.name, personality.tagline));

    if !personality.traits.is_empty() {
        prompt.push_str(&format!("Your traits: {}.\n", personality.traits.join(", ")));
    }

    if !personality.perspective.is_empty() {
        prompt.push_str(&format!("Your perspective: {}\n", personality.perspective));
    }

    for directive in &personality.style {
        prompt.push_str(&format!("- {}\n", directive));
    }

    prompt.push_str(&format!(
        "\nYou are in a casual group conversation about \"{}\". ",
        config.topic
    ));
    prompt.push_str(contrarian_hint(personality.contrarianism));
    prompt.push_str(&format!(
        "\nAlways answer in {}. Keep it to one to three sentences. \
         Lines from others are prefixed with [Name]; [{}] is the human host and \
         [{}] marks narration. Do not prefix your reply with your own name.",
        config.language, HOST_TAG, NARRATOR_TAG
    ));

    prompt
}

fn contrarian_hint(contrarianism: f64) -> &'static str {
    if contrarianism >= 0.7 {
        "You enjoy pushing back and will happily disagree with the room."
    } else if contrarianism >= 0.4 {
        "You disagree when you have a reason to."
    } else {
        "You tend to build on what others say."
    }
}

/// Render one history entry as seen by `speaker`.
fn render(message: &RoomMessage, speaker: &str) -> PromptMessage {
    match message.kind {
        MessageKind::Chat if message.agent == speaker => {
            PromptMessage::new(ChatRole::Assistant, message.content.clone())
        }
        MessageKind::Chat => PromptMessage::new(
            ChatRole::User,
            format!("[{}]: {}", message.agent, message.content),
        ),
        MessageKind::User => PromptMessage::new(
            ChatRole::User,
            format!("[{}]: {}", HOST_TAG, message.content),
        ),
        MessageKind::Join => PromptMessage::new(
            ChatRole::User,
            format!(
                "[{}]: {} joined the room ({})",
                NARRATOR_TAG, message.agent, message.content
            ),
        ),
        MessageKind::Leave | MessageKind::System => PromptMessage::new(
            ChatRole::User,
            format!("[{}]: {}", NARRATOR_TAG, message.content),
        ),
    }
}

/// Full prompt for `personality`'s turn.
pub fn build_prompt(
    personality: &Personality,
    config: &RoomConfig,
    history: &[RoomMessage],
) -> Vec<PromptMessage> {
    let start = history.len().saturating_sub(config.context_window);
    let mut messages = Vec::with_capacity(history.len() - start + 2);

    messages.push(PromptMessage::new(
        ChatRole::System,
        system_prompt(personality, config),
    ));
    messages.extend(
        history[start..]
            .iter()
            .map(|message| render(message, &personality.name)),
    );
    messages.push(PromptMessage::new(
        ChatRole::User,
        format!(
            "It's your turn, {}. Reply with your next line only.",
            personality.name
        ),
    ));

    messages
}

/// Dashes only separate when set off by whitespace, so `Nova-style` is left alone.
const DASHES: [&str; 3] = ["\u{2014}", "\u{2013}", "-"];
const WRAPPERS: [(&str, &str); 3] = [("**", "**"), ("[", "]"), ("", "")];

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.to_lowercase() == prefix.to_lowercase() {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Remove a leading `Name:` the model echoed back. Also handles `[Name]:`,
/// `**Name:**` and dash separators, matching the name case-insensitively.
/// Returns the trimmed reply.
pub fn strip_self_name(name: &str, text: &str) -> String {
    let trimmed = text.trim();
    if name.is_empty() {
        return trimmed.to_string();
    }

    for (open, close) in WRAPPERS {
        let Some(rest) = trimmed.strip_prefix(open) else {
            continue;
        };
        let Some(rest) = strip_prefix_ignore_case(rest, name) else {
            continue;
        };
        let rest = rest.strip_prefix(close).unwrap_or(rest);
        let spaced = rest.starts_with(char::is_whitespace);
        let rest = rest.trim_start();
        let after = match rest.strip_prefix(':') {
            Some(after) => Some(after),
            None if spaced => DASHES.iter().find_map(|dash| rest.strip_prefix(dash)),
            None => None,
        };
        if let Some(after) = after {
            let after = after.strip_prefix(close).unwrap_or(after);
            return after.trim().to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_prefix() {
        assert_eq!(strip_self_name("Nova", "Nova: trains are great"), "trains are great");
        assert_eq!(strip_self_name("Nova", "nova \u{2014} sure"), "sure");
        assert_eq!(strip_self_name("Nova", "NOVA - fine"), "fine");
    }

    #[test]
    fn test_strip_wrapped_prefix() {
        assert_eq!(strip_self_name("Nova", "[Nova]: hello"), "hello");
        assert_eq!(strip_self_name("Nova", "**Nova:** hello"), "hello");
        assert_eq!(strip_self_name("Nova", "**Nova**: hello"), "hello");
    }

    #[test]
    fn test_leaves_other_text_alone() {
        assert_eq!(strip_self_name("Nova", "Novak: hi"), "Novak: hi");
        assert_eq!(
            strip_self_name("Nova", "Nova-style trams are overrated"),
            "Nova-style trams are overrated"
        );
        assert_eq!(strip_self_name("Nova", "Nova\u{2014}really"), "Nova\u{2014}really");
        assert_eq!(strip_self_name("Nova", "**Nova** \u{2014} fine"), "fine");
        assert_eq!(strip_self_name("Nova", "  I agree with Nova: yes "), "I agree with Nova: yes");
        assert_eq!(strip_self_name("Nova", "Nova:   "), "");
    }

    #[test]
    fn test_prompt_renders_roles_and_window() {
        let me = Personality::new("Nova", "Optimist");
        let config = RoomConfig {
            context_window: 3,
            ..RoomConfig::default()
        };
        let history = vec![
            RoomMessage::system("dropped by window"),
            RoomMessage::new("Nova", "my old line", "cyan", MessageKind::Chat),
            RoomMessage::new("Rex", "a reply", "red", MessageKind::Chat),
            RoomMessage::user("hello agents"),
        ];

        let prompt = build_prompt(&me, &config, &history);
        assert_eq!(prompt.len(), 5);
        assert_eq!(prompt[0].role, ChatRole::System);
        assert!(prompt[0].content.contains("You are Nova."));
        assert_eq!(prompt[1].role, ChatRole::Assistant);
        assert_eq!(prompt[1].content, "my old line");
        assert_eq!(prompt[2].content, "[Rex]: a reply");
        assert_eq!(prompt[3].content, "[HOST]: hello agents");
        assert_eq!(prompt[4].role, ChatRole::User);
    }

    #[test]
    fn test_events_become_narration() {
        let me = Personality::new("Nova", "Optimist");
        let history = vec![RoomMessage::new("Rex", "Skeptic", "red", MessageKind::Join)];
        let prompt = build_prompt(&me, &RoomConfig::default(), &history);
        assert_eq!(prompt[1].content, "[SYSTEM]: Rex joined the room (Skeptic)");
    }
}
