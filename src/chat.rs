//! Conversation transcript types.
//!
//! The TDD loop keeps no store of its own: every invocation receives the full
//! message history and reconstructs its state from the assistant turns.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Load a transcript stored as a JSON array of `{role, content}` objects.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid transcript.
pub fn load_transcript(path: &Path) -> crate::Result<Vec<ChatMessage>> {
    let content = std::fs::read_to_string(path)?;
    let messages: Vec<ChatMessage> = serde_json::from_str(&content)?;
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_constructors_set_role() {
        assert_eq!(ChatMessage::user("hi").role, Role::User);
        assert_eq!(ChatMessage::assistant("hi").role, Role::Assistant);
        assert_eq!(ChatMessage::system("hi").role, Role::System);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("done")).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
    }

    #[test]
    fn test_load_transcript() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"role":"user","content":"add two numbers"}},{{"role":"assistant","content":"ok"}}]"#
        )
        .unwrap();

        let messages = load_transcript(file.path()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::user("add two numbers"));
    }

    #[test]
    fn test_load_transcript_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_transcript(file.path()).is_err());
    }
}
