//! Turn-concatenation rules.
//!
//! Every provider declares one [`TurnFormat`]; adapters call
//! [`TurnFormat::render`] instead of stitching messages themselves.

use crate::{ChatMessage, Role};

/// How a provider wants a conversation laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnFormat {
    /// Ordered `{role, content}` list, sent as-is.
    RoleTagged,
    /// Role-tagged list with system turns lifted into a dedicated field.
    SystemField,
    /// Contents joined with newlines, roles dropped.
    PlainJoin,
    /// `<role>\ncontent\n</role>` blocks joined with newlines.
    XmlTagged,
    /// `<|role|>\ncontent` blocks, ending with an open assistant turn.
    ChatMarkup,
    /// Only the last user turn is sent.
    LastUserTurn,
}

/// The output of a [`TurnFormat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedTurns {
    /// Structured body: optional system text plus remaining turns.
    Messages { system: Option<String>, messages: Vec<ChatMessage> },
    /// A single prompt string.
    Prompt(String),
}

impl RenderedTurns {
    /// Flattens to a prompt string; structured turns become `role: content` lines.
    pub fn into_prompt(self) -> String {
        match self {
            Self::Prompt(prompt) => prompt,
            Self::Messages { system, messages } => system
                .into_iter()
                .map(|s| format!("system: {}", s))
                .chain(messages.iter().map(|m| format!("{}: {}", m.role.as_str(), m.content)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl TurnFormat {
    /// Applies this rule to a conversation.
    pub fn render(&self, messages: &[ChatMessage]) -> RenderedTurns {
        match self {
            Self::RoleTagged => {
                RenderedTurns::Messages { system: None, messages: messages.to_vec() }
            }
            Self::SystemField => {
                let system: Vec<&str> = messages
                    .iter()
                    .filter(|m| m.role == Role::System)
                    .map(|m| m.content.as_str())
                    .collect();
                let rest =
                    messages.iter().filter(|m| m.role != Role::System).cloned().collect();
                RenderedTurns::Messages {
                    system: (!system.is_empty()).then(|| system.join("\n\n")),
                    messages: rest,
                }
            }
            Self::PlainJoin => RenderedTurns::Prompt(
                messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n"),
            ),
            Self::XmlTagged => RenderedTurns::Prompt(
                messages
                    .iter()
                    .map(|m| format!("<{0}>\n{1}\n</{0}>", m.role.as_str(), m.content))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Self::ChatMarkup => {
                let body = messages
                    .iter()
                    .map(|m| format!("<|{}|>\n{}", m.role.as_str(), m.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                RenderedTurns::Prompt(format!("{}\n<|assistant|>\n", body))
            }
            Self::LastUserTurn => RenderedTurns::Prompt(
                messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.clone())
                    .unwrap_or_default(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("You review code."),
            ChatMessage::user("first"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("second"),
        ]
    }

    #[test]
    fn test_system_field_lifts_system_turns() {
        let RenderedTurns::Messages { system, messages } =
            TurnFormat::SystemField.render(&conversation())
        else {
            panic!("expected structured turns");
        };
        assert_eq!(system.as_deref(), Some("You review code."));
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn test_system_field_without_system_turn() {
        let RenderedTurns::Messages { system, .. } =
            TurnFormat::SystemField.render(&[ChatMessage::user("hi")])
        else {
            panic!("expected structured turns");
        };
        assert!(system.is_none());
    }

    #[test]
    fn test_xml_tagged() {
        let prompt = TurnFormat::XmlTagged.render(&conversation()).into_prompt();
        assert!(prompt.starts_with("<system>\nYou review code.\n</system>\n<user>\nfirst\n</user>"));
        assert!(prompt.ends_with("<user>\nsecond\n</user>"));
    }

    #[test]
    fn test_chat_markup_leaves_assistant_turn_open() {
        let prompt = TurnFormat::ChatMarkup.render(&[ChatMessage::user("hi")]).into_prompt();
        assert_eq!(prompt, "<|user|>\nhi\n<|assistant|>\n");
    }

    #[test]
    fn test_last_user_turn() {
        let prompt = TurnFormat::LastUserTurn.render(&conversation()).into_prompt();
        assert_eq!(prompt, "second");
        let empty = TurnFormat::LastUserTurn.render(&[ChatMessage::system("x")]).into_prompt();
        assert_eq!(empty, "");
    }

    #[test]
    fn test_plain_join() {
        let prompt = TurnFormat::PlainJoin.render(&conversation()).into_prompt();
        assert_eq!(prompt, "You review code.\nfirst\nok\nsecond");
    }
}
