//! Reconstruct the latest TDD cycle from a chat transcript.
//!
//! Nothing is persisted between invocations. The session writes recognisable
//! headings into its progress stream, and this module reads them back out of
//! earlier assistant turns.

use crate::chat::{ChatMessage, Role};
use crate::tdd::framework::TestFramework;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Prefix of every progress stream the session produces.
pub const TDD_MARKER: &str = "🧪 **TDD Mode";

/// Heading text for each phase, shared by the writer and the reader.
pub const RED_HEADING: &str = "🔴 Phase 1: RED";
pub const GREEN_HEADING: &str = "🟢 Phase 2: GREEN";
pub const REFACTOR_HEADING: &str = "🔵 Phase 3: REFACTOR";
pub const COMPLETE_BANNER: &str = "✅ TDD Cycle Complete!";

/// Messages that mean "carry on" rather than a new requirement.
pub const CONTINUE_COMMANDS: &[&str] = &[
    "continue",
    "continnue",
    "continue with the next cycle",
    "next",
    "next cycle",
    "proceed",
    "go",
    "go on",
    "skip",
    "done",
    "ok",
    "yes",
    "y",
];

const REQUIREMENT_PATTERN: &str = r#"(?s)_Requirement: "(.+?)(?:\.\.\.)?"\s*_"#;
const FRAMEWORK_PATTERN: &str = r"📋 \*\*Framework:\*\* ([^\n]+)";

/// Where a cycle had got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TddPhase {
    #[default]
    Red,
    Green,
    Refactor,
    Complete,
}

impl fmt::Display for TddPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Red => "RED",
            Self::Green => "GREEN",
            Self::Refactor => "REFACTOR",
            Self::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

/// State recovered from the transcript.
///
/// An empty `requirement` means there is no cycle to continue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TddState {
    pub phase: TddPhase,
    pub requirement: String,
    pub test_code: String,
    pub impl_code: String,
    pub framework: Option<TestFramework>,
}

impl TddState {
    /// Whether a previous cycle was found.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.requirement.is_empty()
    }
}

/// Whether a user message asks to continue instead of stating a requirement.
#[must_use]
pub fn is_continue_command(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    CONTINUE_COMMANDS.contains(&normalized.as_str())
        || normalized.chars().count() <= 3
        || normalized.starts_with("continue")
        || normalized.starts_with("next")
}

/// First fenced block that follows `heading` in `content`.
fn code_after(content: &str, heading: &str) -> String {
    let Some(start) = content.find(heading) else {
        return String::new();
    };
    let rest = &content[start + heading.len()..];

    let Some(open) = rest.find("```") else {
        return String::new();
    };
    let after_fence = &rest[open + 3..];
    // Skip the language tag line.
    let Some(newline) = after_fence.find('\n') else {
        return String::new();
    };
    let tag = &after_fence[..newline];
    if !tag.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return String::new();
    }
    let body = &after_fence[newline + 1..];
    body.find("```")
        .map(|close| body[..close].trim().to_string())
        .unwrap_or_default()
}

fn phase_of(content: &str) -> TddPhase {
    if content.contains(COMPLETE_BANNER) {
        TddPhase::Complete
    } else if content.contains(REFACTOR_HEADING) {
        TddPhase::Refactor
    } else if content.contains(GREEN_HEADING) {
        TddPhase::Green
    } else {
        TddPhase::Red
    }
}

/// Parse one assistant turn. `None` when it carries no usable requirement.
fn parse_message(content: &str) -> Option<TddState> {
    let requirement = Regex::new(REQUIREMENT_PATTERN)
        .ok()?
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())?;

    if is_continue_command(&requirement) {
        debug!(requirement = %requirement, "Ignoring continuation command captured as requirement");
        return None;
    }

    let framework = Regex::new(FRAMEWORK_PATTERN).ok().and_then(|re| {
        re.captures(content)
            .and_then(|caps| caps.get(1))
            .map(|m| TestFramework::from_name(m.as_str().trim()))
    });

    Some(TddState {
        phase: phase_of(content),
        requirement,
        test_code: code_after(content, RED_HEADING),
        impl_code: code_after(content, GREEN_HEADING),
        framework,
    })
}

/// Recover the most recent cycle from `messages`.
///
/// Assistant turns are scanned newest first. Turns without the TDD marker are
/// skipped, as are marked turns whose requirement is missing or is itself a
/// continuation command. Returns the default (inactive) state when nothing
/// usable is found.
#[must_use]
pub fn extract_tdd_state(messages: &[ChatMessage]) -> TddState {
    for (index, message) in messages.iter().enumerate().rev() {
        if message.role != Role::Assistant || !message.content.contains(TDD_MARKER) {
            continue;
        }

        if let Some(state) = parse_message(&message.content) {
            debug!(index, phase = %state.phase, "Recovered TDD state");
            return state;
        }
        debug!(index, "TDD-marked message has no usable requirement");
    }

    TddState::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tdd_message(body: &str) -> ChatMessage {
        ChatMessage::assistant(format!(
            "🧪 **TDD Mode - Automated Red-Green-Refactor Cycle**\n\n\
             _Requirement: \"Implement a function that validates email addresses\"_\n\n\
             📋 **Framework:** Jest (default)\n\n{}",
            body
        ))
    }

    #[test]
    fn test_continue_commands() {
        assert!(is_continue_command("continue"));
        assert!(is_continue_command("  Next Cycle "));
        assert!(is_continue_command("ok"));
        assert!(is_continue_command("abc"));
        assert!(is_continue_command("continue please"));
        assert!(is_continue_command("next one"));
        assert!(is_continue_command(""));
        assert!(!is_continue_command("Implement a function that adds numbers"));
        assert!(!is_continue_command("fine"));
    }

    #[test]
    fn test_red_only_message_is_red() {
        let messages = vec![
            ChatMessage::user("Implement a function that validates email addresses"),
            tdd_message("## 🔴 Phase 1: RED - Writing failing test\n\n**Generated test:**\n```typescript\nexpect(isValid('a@b.c')).toBe(true);\n```\n"),
        ];

        let state = extract_tdd_state(&messages);
        assert_eq!(state.phase, TddPhase::Red);
        assert_eq!(
            state.requirement,
            "Implement a function that validates email addresses"
        );
        assert_eq!(state.test_code, "expect(isValid('a@b.c')).toBe(true);");
        assert_eq!(state.framework, Some(TestFramework::Jest));
    }

    #[test]
    fn test_green_heading_means_green() {
        let state = extract_tdd_state(&[tdd_message(
            "## 🔴 Phase 1: RED\n\n## 🟢 Phase 2: GREEN\n```typescript\nexport const f = 1;\n```\n",
        )]);
        assert_eq!(state.phase, TddPhase::Green);
        assert_eq!(state.impl_code, "export const f = 1;");
    }

    #[test]
    fn test_refactor_heading_means_refactor() {
        let state = extract_tdd_state(&[tdd_message(
            "## 🔴 Phase 1: RED\n## 🟢 Phase 2: GREEN\n## 🔵 Phase 3: REFACTOR\n",
        )]);
        assert_eq!(state.phase, TddPhase::Refactor);
    }

    #[test]
    fn test_completion_banner_means_complete() {
        let state = extract_tdd_state(&[tdd_message(
            "## 🔴 Phase 1: RED\n## 🟢 Phase 2: GREEN\n## ✅ TDD Cycle Complete!\n",
        )]);
        assert_eq!(state.phase, TddPhase::Complete);
    }

    #[test]
    fn test_truncated_requirement() {
        let content = format!(
            "{} - Automated**\n_Requirement: \"Build a very long thing...\"_\n## 🔴 Phase 1: RED\n",
            TDD_MARKER
        );
        let state = extract_tdd_state(&[ChatMessage::assistant(content)]);
        assert_eq!(state.requirement, "Build a very long thing");
    }

    #[test]
    fn test_continuation_requirement_is_discarded() {
        let content = format!(
            "{}**\n_Requirement: \"continue\"_\n## 🔴 Phase 1: RED\n",
            TDD_MARKER
        );
        let state = extract_tdd_state(&[ChatMessage::assistant(content)]);
        assert!(!state.is_active());
        assert_eq!(state, TddState::default());
    }

    #[test]
    fn test_newest_marked_message_wins() {
        let older = tdd_message("## 🔴 Phase 1: RED\n## 🟢 Phase 2: GREEN\n## ✅ TDD Cycle Complete!\n");
        let newer = ChatMessage::assistant(format!(
            "{} - Automated**\n_Requirement: \"Parse dates from strings\"_\n## 🔴 Phase 1: RED\n",
            TDD_MARKER
        ));
        let state = extract_tdd_state(&[older, ChatMessage::user("new"), newer]);
        assert_eq!(state.requirement, "Parse dates from strings");
        assert_eq!(state.phase, TddPhase::Red);
    }

    #[test]
    fn test_skips_unmarked_and_user_messages() {
        let messages = vec![
            ChatMessage::user("_Requirement: \"sneaky user text\"_ 🧪 **TDD Mode"),
            ChatMessage::assistant("_Requirement: \"plain answer\"_"),
        ];
        assert!(!extract_tdd_state(&messages).is_active());
    }

    #[test]
    fn test_falls_back_to_older_message_with_requirement() {
        let older = tdd_message("## 🔴 Phase 1: RED\n## 🟢 Phase 2: GREEN\n");
        let guidance = ChatMessage::assistant(format!(
            "{} - Previous Cycle Found**\n\n**Previous requirement:** \"x\"\n",
            TDD_MARKER
        ));
        let state = extract_tdd_state(&[older, guidance]);
        assert_eq!(state.phase, TddPhase::Green);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(TddPhase::Green.to_string(), "GREEN");
        assert_eq!(TddPhase::Complete.to_string(), "COMPLETE");
    }
}
