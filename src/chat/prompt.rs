//! Conversation-to-prompt formatting.
//!
//! A bounded message history plus the new user message fold into a single
//! prompt string; generated text is scrubbed of any role labels the model
//! echoed back.

use crate::chat::{ChatMessage, ChatRole};

pub const USER_LABEL: &str = "User";
pub const ASSISTANT_LABEL: &str = "Assistant";

/// Sliding-window bound: only this many most-recent entries (6 exchanges)
/// fold into the prompt. Older entries are dropped, not summarized.
pub const MAX_HISTORY_MESSAGES: usize = 12;

const SYSTEM_PREAMBLE: &str = "You are a friendly, helpful AI assistant. \
Reply to the user naturally, taking the conversation history into account.\n\n";

/// Turn-boundary markers in the prompt format; generation stops at the
/// first occurrence of any of them.
pub const STOP_SEQUENCES: &[&str] = &[
    "\nUser:",
    "\n\n",
    "User:",
    "Assistant:",
    "\nAssistant:",
];

/// Fold the last `MAX_HISTORY_MESSAGES` entries of `history` and the new
/// user message into a single prompt ending with an open assistant turn
#[must_use]
pub fn build_prompt(history: &[ChatMessage], new_message: &str) -> String {
    let mut prompt = String::from(SYSTEM_PREAMBLE);

    let start = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    for message in &history[start..] {
        let label = match message.role {
            ChatRole::User => USER_LABEL,
            ChatRole::Assistant => ASSISTANT_LABEL,
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }

    prompt.push_str(USER_LABEL);
    prompt.push_str(": ");
    prompt.push_str(new_message);
    prompt.push('\n');
    prompt.push_str(ASSISTANT_LABEL);
    prompt.push_str(": ");
    prompt
}

/// Strip role labels the model may have echoed, plus surrounding whitespace
#[must_use]
pub fn postprocess(raw: &str) -> String {
    raw.replace("Assistant:", "")
        .replace("User:", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(i: usize) -> [ChatMessage; 2] {
        [
            ChatMessage::user(format!("question {i}")),
            ChatMessage::assistant(format!("answer {i}")),
        ]
    }

    #[test]
    fn test_build_prompt_shape() {
        let history = vec![
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi, how can I help?"),
        ];
        let prompt = build_prompt(&history, "what is rust?");

        assert!(prompt.starts_with("You are a friendly, helpful AI assistant."));
        assert!(prompt.contains("User: hello\n"));
        assert!(prompt.contains("Assistant: hi, how can I help?\n"));
        assert!(prompt.ends_with("User: what is rust?\nAssistant: "));
    }

    #[test]
    fn test_build_prompt_empty_history() {
        let prompt = build_prompt(&[], "hi");
        assert!(prompt.ends_with("User: hi\nAssistant: "));
        assert!(!prompt.contains("answer"));
    }

    #[test]
    fn test_build_prompt_uses_only_last_twelve() {
        let mut history = Vec::new();
        for i in 0..10 {
            history.extend(exchange(i));
        }
        assert_eq!(history.len(), 20);

        let prompt = build_prompt(&history, "latest");

        // entries 0..8 fell out of the window; 8 onward remain
        assert!(!prompt.contains("question 3"));
        assert!(!prompt.contains("answer 3"));
        assert!(prompt.contains("question 4"));
        assert!(prompt.contains("answer 9"));
    }

    #[test]
    fn test_postprocess_strips_labels_and_whitespace() {
        assert_eq!(postprocess("  Assistant: sure thing  "), "sure thing");
        assert_eq!(postprocess("User: echoed back"), "echoed back");
        assert_eq!(postprocess("plain"), "plain");
        assert_eq!(postprocess("   "), "");
    }

    #[test]
    fn test_stop_sequences_cover_both_labels() {
        assert!(STOP_SEQUENCES.contains(&"User:"));
        assert!(STOP_SEQUENCES.contains(&"Assistant:"));
        assert!(STOP_SEQUENCES.contains(&"\n\n"));
    }
}
