//! End-to-end sessions against the in-memory host and a scripted model

use redgreen::llm::MockLlmClient;
use redgreen::tdd::messages;
use redgreen::testing::{MockDiagnostics, MockHost};
use redgreen::{
    extract_tdd_state, AutonomousSession, ChatMessage, CommandOutput, TddPhase, TddSession,
    TestFramework, VerificationConfig,
};

const REQUEST: &str = "Implement a function that validates email addresses";
const TEST_FILE: &str = "/proj/__tests__/implement-validates.test.ts";
const IMPL_FILE: &str = "/proj/src/implement-validates.ts";

const EMAIL_TEST: &str = "import { isValidEmail } from '../src/implement-validates';\n\ntest('rejects missing at', () => {\n  expect(isValidEmail('nope')).toBe(false);\n});";
const FIRST_IMPL: &str = "export function isValidEmail(email: string): boolean {\n  return true;\n}";
const FIXED_IMPL: &str = "export function isValidEmail(email: string): boolean {\n  return email.includes('@');\n}";

fn failing() -> CommandOutput {
    CommandOutput::new("Tests: 1 failed, 1 total", "", 1)
}

fn passing() -> CommandOutput {
    CommandOutput::new("Tests: 1 passed, 1 total", "", 0)
}

#[tokio::test]
async fn test_cycle_recovers_after_a_failed_implementation() {
    let host = MockHost::new()
        .with_command_output("npm test", failing())
        .with_command_output("npm test", failing())
        .with_command_output("npm test", passing());
    let model = MockLlmClient::new().with_responses([
        EMAIL_TEST,
        FIRST_IMPL,
        FIXED_IMPL,
        "Extract the check into a named regex.",
    ]);
    let session = TddSession::new(&host, &model);

    let output = session.run_to_string(vec![ChatMessage::user(REQUEST)]).await;

    assert!(output.contains("Jest (default)"));
    assert!(output.contains("Test fails as expected"));
    assert!(output.contains("### Iteration 1/15"));
    assert!(output.contains("❌ **Tests still failing**"));
    assert!(output.contains("### Iteration 2/15"));
    assert!(!output.contains("### Iteration 3/15"));
    assert!(output.contains("**Iterations:** 2"));

    assert_eq!(host.file(TEST_FILE).unwrap(), EMAIL_TEST);
    assert_eq!(host.file(IMPL_FILE).unwrap(), FIXED_IMPL);
    assert_eq!(host.commands(), vec!["npm test"; 3]);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[2].contains("The previous implementation failed"));
    assert!(prompts[2].contains("return true;"));
    assert!(prompts[2].contains("1 failed"));
}

#[tokio::test]
async fn test_continuation_after_interrupted_cycle() {
    let previous = format!(
        "{}{}{}{}",
        messages::cycle_header(),
        messages::requirement_banner(REQUEST),
        messages::red_heading(),
        messages::green_heading()
    );
    let transcript = vec![
        ChatMessage::user(REQUEST),
        ChatMessage::assistant(previous),
        ChatMessage::user("ok"),
    ];
    let host = MockHost::new();
    let model = MockLlmClient::new();
    let session = TddSession::new(&host, &model);

    let output = session.run_to_string(transcript).await;

    assert!(output.contains("Previous Cycle Found"));
    assert!(output.contains("Phase reached:** GREEN"));
    assert!(output.contains("The previous cycle was interrupted"));
    assert_eq!(model.call_count(), 0);
    assert!(host.commands().is_empty());
    assert!(host.writes().is_empty());
}

#[tokio::test]
async fn test_completed_cycle_output_round_trips_through_transcript() {
    let host = MockHost::new()
        .with_command_output("npm test", failing())
        .with_command_output("npm test", passing());
    let model = MockLlmClient::new().with_responses([EMAIL_TEST, FIXED_IMPL, "Nothing to add."]);
    let session = TddSession::new(&host, &model);
    let output = session.run_to_string(vec![ChatMessage::user(REQUEST)]).await;

    let history = vec![ChatMessage::user(REQUEST), ChatMessage::assistant(output)];
    let state = extract_tdd_state(&history);
    assert_eq!(state.phase, TddPhase::Complete);
    assert_eq!(state.requirement, REQUEST);
    assert_eq!(state.test_code, EMAIL_TEST);
    assert_eq!(state.framework, Some(TestFramework::Jest));

    let mut transcript = history;
    transcript.push(ChatMessage::user("continue"));
    let reply = session.run_to_string(transcript).await;
    assert!(reply.contains("already complete"));
    assert_eq!(model.call_count(), 3);
}

#[tokio::test]
async fn test_autonomous_edit_with_diagnostics() {
    let before = "var total = 0;\nvar count = 0;\n";
    let after = "let total = 0;\nlet count = 0;";
    let host = MockHost::new().with_file("/proj/counter.js", before);
    let model = MockLlmClient::new().with_response(after);
    let diagnostics = MockDiagnostics::new();
    let config = VerificationConfig {
        use_llm: false,
        ..VerificationConfig::default()
    };
    let session = AutonomousSession::new(&host, &model)
        .with_config(config)
        .with_diagnostics(&diagnostics);

    let output = session
        .run_to_string("replace var declarations with let", "counter.js")
        .await;

    assert!(output.contains("## ✅ Edit Verified"));
    assert_eq!(host.file("/proj/counter.js").unwrap(), after);
    assert_eq!(host.opened(), vec![std::path::PathBuf::from("/proj/counter.js")]);
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_autonomous_diagnostics_block_verification() {
    let before = "var total = 0;\n";
    let after = "let total = 0;";
    let host = MockHost::new().with_file("/proj/counter.js", before);
    let model = MockLlmClient::new().with_response(after);
    let diagnostics = MockDiagnostics::new().with_errors(["counter.js:1 Unexpected token"]);
    let config = VerificationConfig {
        use_llm: false,
        max_attempts: 1,
        ..VerificationConfig::default()
    };
    let session = AutonomousSession::new(&host, &model)
        .with_config(config)
        .with_diagnostics(&diagnostics);

    let output = session
        .run_to_string("replace var declarations with let", "counter.js")
        .await;

    assert!(output.contains("❌ Verification FAILED"));
    assert!(output.contains("Verification failed after 1 attempts"));
}
