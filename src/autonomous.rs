//! Autonomous edit-and-verify loop.
//!
//! An [`AutonomousSession`] asks the model to rewrite one file until the
//! change passes verification or the attempt budget runs out. Each attempt
//! after the first sees the previous verification summary and suggestions.
//! Like the TDD loop, progress is a markdown stream and nothing here is
//! fatal: empty output and failed writes are reported and use up an attempt.

use crate::config::VerificationConfig;
use crate::host::Host;
use crate::llm::{truncate_content, ContentKind, LlmClient};
use crate::tdd::{messages, strip_code_block};
use crate::verification::{
    DiagnosticsProvider, FileSnapshot, LlmJudge, ModelJudge, SuccessCriteria, TaskAnalyzer,
    VerificationContext, VerificationEngine, VerificationResult,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One autonomous edit bound to a host and a model.
pub struct AutonomousSession<'a> {
    host: &'a dyn Host,
    model: &'a dyn LlmClient,
    diagnostics: Option<&'a dyn DiagnosticsProvider>,
    config: VerificationConfig,
    session_id: String,
}

impl<'a> AutonomousSession<'a> {
    #[must_use]
    pub fn new(host: &'a dyn Host, model: &'a dyn LlmClient) -> Self {
        Self {
            host,
            model,
            diagnostics: None,
            config: VerificationConfig::default(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: VerificationConfig) -> Self {
        self.config = config;
        self
    }

    /// Check compile/lint errors after every edit.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: &'a dyn DiagnosticsProvider) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    #[must_use]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = id.into();
        self
    }

    async fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            return file.to_path_buf();
        }
        let root = self
            .host
            .workspace_dirs()
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| PathBuf::from("."));
        root.join(file)
    }

    /// Edit `file` until `instruction` verifiably holds.
    pub fn run(&self, instruction: String, file: PathBuf) -> BoxStream<'_, String> {
        Box::pin(async_stream::stream! {
            let caps = self.model.capabilities();
            let max_attempts = self.config.max_attempts.max(1);

            info!(session = %self.session_id, file = %file.display(), "Starting autonomous edit");
            yield "🤖 **Autonomous Mode - Edit and Verify**\n\n".to_string();
            yield messages::model_banner(self.model.model_name(), &caps);
            yield messages::requirement_banner(&instruction);

            let path = self.resolve(&file).await;
            let before = match self.host.read_file(&path).await {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = %path.display(), "Starting from an empty file: {}", e);
                    yield format!("⚠️ `{}` not found, starting from an empty file.\n\n", file.display());
                    String::new()
                }
            };

            let criteria = TaskAnalyzer::new().analyze(&instruction, Some(&before));
            yield format!("📋 **Success criteria:**\n```\n{}\n```\n\n", criteria.success_description);

            let engine = VerificationEngine::new((&self.config).into()).with_capabilities(caps);
            let model_judge = ModelJudge(self.model);
            let judge: Option<&dyn LlmJudge> = if self.config.use_llm { Some(&model_judge) } else { None };

            let mut context = VerificationContext::new(instruction.clone(), criteria)
                .with_max_attempts(max_attempts);
            let mut current = before.clone();
            let mut passed = false;

            for attempt in 1..=max_attempts {
                context.attempt = attempt;
                yield format!("### Attempt {}/{}\n\n", attempt, max_attempts);

                let prompt = edit_prompt(
                    &instruction,
                    &file,
                    &current,
                    &context.criteria,
                    context.previous_results.last(),
                    caps.content_limit(ContentKind::File),
                );

                yield "🤖 _Generating edit..._\n\n".to_string();
                yield "**Proposed content:**\n```\n".to_string();
                let mut raw = String::new();
                let mut chunks = self.model.stream_complete(&prompt);
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        Ok(text) => {
                            raw.push_str(&text);
                            yield text;
                        }
                        Err(e) => {
                            warn!(session = %self.session_id, attempt, "Model stream failed: {}", e);
                            yield format!("\n⚠️ **Model error:** {}\n", e);
                            break;
                        }
                    }
                }
                drop(chunks);
                yield "\n```\n\n".to_string();

                if raw.trim().is_empty() {
                    yield "❌ **Error:** Model did not generate any content.\n_Skipping this attempt..._\n\n"
                        .to_string();
                    continue;
                }
                let edited = strip_code_block(&raw);

                if let Err(e) = self.host.write_file(&path, &edited).await {
                    warn!(session = %self.session_id, path = %path.display(), "Failed to write edit: {}", e);
                    yield format!("❌ **Error writing file:** {}\n\n", e);
                    continue;
                }
                if let Err(e) = self.host.open_file(&path).await {
                    debug!(path = %path.display(), "Could not open file in host: {}", e);
                }
                yield format!("✅ **Updated:** `{}`\n\n", file.display());

                context.add_snapshot(FileSnapshot::capture(path.clone(), before.clone()).complete(edited.clone()));
                yield "🔍 _Verifying..._\n\n".to_string();
                let result = engine.verify(&context, self.diagnostics, judge).await;
                yield format!("{}\n\n", result.summary);

                current = edited;
                if result.passed {
                    info!(session = %self.session_id, attempt, confidence = result.confidence, "Edit verified");
                    passed = true;
                    break;
                }
                if !result.suggestions.is_empty() {
                    yield format!("**Suggestions:**\n{}\n\n", bullet_list(&result.suggestions));
                }
                context.previous_results.push(result);
            }

            yield "---\n\n".to_string();
            if passed {
                yield format!("## ✅ Edit Verified\n\n**Attempts:** {}\n", context.attempt);
            } else {
                warn!(session = %self.session_id, max_attempts, "Attempt budget exhausted");
                yield format!(
                    "## ⚠️ Edit Not Verified\n\n⛔ **Verification failed after {} attempts.** Review `{}` manually.\n",
                    max_attempts,
                    file.display()
                );
            }
        })
    }

    /// Run the session and collect the whole progress stream.
    pub async fn run_to_string(&self, instruction: &str, file: impl Into<PathBuf>) -> String {
        self.run(instruction.to_string(), file.into())
            .collect::<Vec<_>>()
            .await
            .concat()
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn edit_prompt(
    instruction: &str,
    file: &Path,
    content: &str,
    criteria: &SuccessCriteria,
    previous: Option<&VerificationResult>,
    file_limit: usize,
) -> String {
    let mut prompt = format!(
        r#"You are editing a file to accomplish a task.

Task: {instruction}
File: {file}

Success criteria:
{criteria}

Current content:
```
{content}
```

"#,
        file = file.display(),
        criteria = criteria.success_description,
        content = truncate_content(content, file_limit, true),
    );

    if let Some(previous) = previous {
        prompt.push_str(&format!(
            "Your previous attempt did not pass verification:\n{}\n\n",
            previous.summary
        ));
        if !previous.suggestions.is_empty() {
            prompt.push_str(&format!("Suggestions:\n{}\n\n", bullet_list(&previous.suggestions)));
        }
    }

    prompt.push_str(
        "IMPORTANT: Respond with ONLY the complete new file content. \
         Do NOT wrap it in markdown code blocks. Do NOT include any explanation.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::testing::{MockDiagnostics, MockHost};

    const BEFORE: &str = "var a = 1;\nvar b = 2;\n";
    const AFTER: &str = "const a = 1;\nconst b = 2;";

    fn no_judge() -> VerificationConfig {
        VerificationConfig {
            use_llm: false,
            ..VerificationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_edit_verified_on_first_attempt() {
        let host = MockHost::new().with_file("/proj/app.js", BEFORE);
        let model = MockLlmClient::new().with_response(AFTER);
        let session = AutonomousSession::new(&host, &model).with_config(no_judge());

        let output = session.run_to_string("replace var with const", "app.js").await;

        assert!(output.contains("### Attempt 1/3"));
        assert!(output.contains("✅ Verification PASSED"));
        assert!(output.contains("## ✅ Edit Verified"));
        assert_eq!(host.file("/proj/app.js").unwrap(), AFTER);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_carries_suggestions() {
        let host = MockHost::new().with_file("/proj/app.js", BEFORE);
        let model = MockLlmClient::new().with_responses([BEFORE, AFTER]);
        let session = AutonomousSession::new(&host, &model).with_config(no_judge());

        let output = session.run_to_string("replace var with const", "app.js").await;

        assert!(output.contains("❌ Verification FAILED"));
        assert!(output.contains("### Attempt 2/3"));
        assert!(output.contains("## ✅ Edit Verified"));
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("previous attempt"));
        assert!(prompts[1].contains("Continue removing: var keyword"));
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let host = MockHost::new().with_file("/proj/app.js", BEFORE);
        let model = MockLlmClient::new().with_response(BEFORE);
        let config = VerificationConfig {
            max_attempts: 2,
            ..no_judge()
        };
        let session = AutonomousSession::new(&host, &model).with_config(config);

        let output = session.run_to_string("replace var with const", "app.js").await;

        assert!(output.contains("### Attempt 2/2"));
        assert!(!output.contains("Attempt 3"));
        assert!(output.contains("Verification failed after 2 attempts"));
    }

    #[tokio::test]
    async fn test_empty_output_and_write_failure_use_attempts() {
        let host = MockHost::new()
            .with_file("/proj/app.js", BEFORE)
            .with_write_failure("/proj/app.js");
        let model = MockLlmClient::new().with_responses(["  ", AFTER]);
        let config = VerificationConfig {
            max_attempts: 2,
            ..no_judge()
        };
        let session = AutonomousSession::new(&host, &model).with_config(config);

        let output = session.run_to_string("replace var with const", "app.js").await;

        assert!(output.contains("Model did not generate any content"));
        assert!(output.contains("❌ **Error writing file:**"));
        assert!(output.contains("## ⚠️ Edit Not Verified"));
        assert_eq!(host.file("/proj/app.js").unwrap(), BEFORE);
    }

    #[tokio::test]
    async fn test_model_judge_and_diagnostics() {
        let host = MockHost::new().with_file("/proj/app.js", BEFORE);
        let model = MockLlmClient::new().with_responses([
            AFTER,
            "ACCOMPLISHED: YES\nCOMPLETION: 100%\nREMAINING_ISSUES:\nIMPROVEMENTS_MADE:\n- const",
        ]);
        let diagnostics = MockDiagnostics::new();
        let session = AutonomousSession::new(&host, &model).with_diagnostics(&diagnostics);

        let output = session.run_to_string("replace var with const", "app.js").await;

        assert!(output.contains("✅ Verification PASSED (100% confidence)\n4/4 criteria met"));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let host = MockHost::new();
        let model = MockLlmClient::new().with_response("export let a = 1;");
        let session = AutonomousSession::new(&host, &model).with_config(no_judge());

        let output = session.run_to_string("create a constant", "src/a.ts").await;

        assert!(output.contains("not found, starting from an empty file"));
        assert_eq!(host.file("/proj/src/a.ts").unwrap(), "export let a = 1;");
    }
}
