//! Automated red-green-refactor cycle.
//!
//! A [`TddSession`] turns one user request into a markdown progress stream:
//!
//! 1. **RED**: the model writes a failing test, which is written and run
//! 2. **GREEN**: the model writes the implementation, retried until the tests
//!    pass or the iteration budget runs out
//! 3. **REFACTOR**: the model suggests improvements once
//!
//! The session keeps no state between requests. A continuation command
//! ("continue", "ok", ...) is answered from the state reconstructed out of the
//! transcript by [`extract_tdd_state`] and never touches the model or the host.

pub mod cleaner;
pub mod framework;
pub mod messages;
pub mod prompts;
pub mod repetition;
pub mod runner;
pub mod state;

pub use cleaner::strip_code_block;
pub use framework::{
    build_test_command, detect_target_file, detect_test_framework, module_name, register_rust_module,
    setup_project_structure, suggest_impl_filename, suggest_test_filename, FrameworkDescriptor,
    Language, SetupReport, TestFramework, TestLayout,
};
pub use repetition::RepetitionGuard;
pub use runner::{classify, detect_tests_passed, run_tests, TestResult};
pub use state::{extract_tdd_state, is_continue_command, TddPhase, TddState};

use crate::chat::ChatMessage;
use crate::config::TddConfig;
use crate::host::{FileCache, Host};
use crate::llm::{ContentKind, LlmClient};
use futures::stream::BoxStream;
use futures::StreamExt;
use prompts::{GreenAttempt, PromptLimits};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One TDD invocation bound to a host and a model.
pub struct TddSession<'a> {
    host: &'a dyn Host,
    model: &'a dyn LlmClient,
    config: TddConfig,
    cache_ttl: Duration,
    session_id: String,
}

impl<'a> TddSession<'a> {
    #[must_use]
    pub fn new(host: &'a dyn Host, model: &'a dyn LlmClient) -> Self {
        Self {
            host,
            model,
            config: TddConfig::default(),
            cache_ttl: crate::host::cache::DEFAULT_TTL,
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: TddConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Use a caller-provided id in log records.
    #[must_use]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = id.into();
        self
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Project root: the first workspace directory, else the process cwd.
    async fn project_root(&self) -> PathBuf {
        let root = self
            .host
            .workspace_dirs()
            .await
            .into_iter()
            .next()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        match root.to_str().and_then(|s| s.strip_prefix("file://")) {
            Some(stripped) => PathBuf::from(stripped),
            None => root,
        }
    }

    async fn open_quietly(&self, path: &Path) {
        if let Err(e) = self.host.open_file(path).await {
            debug!(path = %path.display(), "Could not open file in host: {}", e);
        }
    }

    /// Run the session over a transcript whose last message is the request.
    pub fn run(&self, transcript: Vec<ChatMessage>) -> BoxStream<'_, String> {
        Box::pin(async_stream::stream! {
            let request = transcript
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let history = &transcript[..transcript.len().saturating_sub(1)];
            let caps = self.model.capabilities();
            let banner = messages::model_banner(self.model.model_name(), &caps);

            if is_continue_command(&request) {
                let previous = extract_tdd_state(history);
                if previous.is_active() {
                    info!(session = %self.session_id, phase = %previous.phase, "Continuation requested");
                    yield messages::continuation(&previous, &banner);
                } else {
                    info!(session = %self.session_id, "Continuation requested without a previous cycle");
                    yield messages::no_previous_cycle();
                }
                return;
            }

            info!(session = %self.session_id, model = self.model.model_name(), "Starting TDD cycle");
            yield messages::cycle_header();
            yield banner;
            yield messages::requirement_banner(&request);

            let root = self.project_root().await;
            let mut cache = FileCache::new(self.cache_ttl);

            let target = detect_target_file(&request);
            if let Some(target) = &target {
                yield format!("🎯 **Target file:** `{}`\n\n", target);
            }

            let framework = detect_test_framework(self.host, &root, &mut cache, Some(&request)).await;
            info!(session = %self.session_id, framework = %framework, "Detected test framework");
            yield format!(
                "📋 **Framework:** {}\n   _Command:_ `{}`\n\n",
                framework.name(),
                framework.command()
            );

            if self.config.setup_project {
                let project_name = root
                    .file_name()
                    .and_then(|n| n.to_str())
                    .filter(|n| !n.is_empty())
                    .unwrap_or("tdd_project")
                    .to_string();
                let setup = setup_project_structure(self.host, &root, framework, &project_name).await;
                if !setup.created.is_empty() {
                    yield format!("🔧 **Project setup:** Created {}\n\n", setup.created.join(", "));
                }
                if !setup.errors.is_empty() {
                    yield format!("⚠️ **Setup warnings:** {}\n\n", setup.errors.join(", "));
                }
            }

            let layout = framework.layout();
            let colocated = layout == TestLayout::Colocated;
            let lang = framework.language();
            let verb = if target.is_some() { "Updated" } else { "Created" };
            let test_file = target
                .clone()
                .unwrap_or_else(|| suggest_test_filename(&request, framework));
            let impl_file = target
                .clone()
                .unwrap_or_else(|| suggest_impl_filename(&request, framework));
            let module = module_name(&impl_file);

            // RED
            info!(session = %self.session_id, "Phase RED");
            yield messages::red_heading();
            let red_prompt = prompts::red_prompt(framework, &request);
            yield "🤖 _Generating test..._\n\n".to_string();
            yield format!("**Generated test:**\n```{}\n", lang);
            let mut raw_test = String::new();
            let mut chunks = self.model.stream_complete(&red_prompt);
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(text) => {
                        raw_test.push_str(&text);
                        yield text;
                    }
                    Err(e) => {
                        warn!(session = %self.session_id, "Model stream failed: {}", e);
                        yield format!("\n⚠️ **Model error:** {}\n", e);
                        break;
                    }
                }
            }
            drop(chunks);
            yield "\n```\n\n".to_string();

            if raw_test.trim().is_empty() {
                yield "❌ **Error:** Model did not generate any test code.\n\
                       _Try using a more capable model or simplifying the requirement._\n"
                    .to_string();
                return;
            }
            let test_code = strip_code_block(&raw_test);

            if colocated {
                yield format!("📝 **Writing test:** `{}`\n", test_file);
            } else {
                yield format!("📝 **Writing:** `{}`\n", test_file);
            }
            let test_path = root.join(&test_file);
            if let Err(e) = self.host.write_file(&test_path, &test_code).await {
                warn!(session = %self.session_id, file = %test_file, "Failed to write test: {}", e);
                yield format!(
                    "❌ **Error creating file:** {}\n\n_Unable to continue TDD cycle without test file._\n",
                    e
                );
                return;
            }
            self.open_quietly(&test_path).await;
            if colocated {
                yield format!("✅ **{}:** `{}` (test only, will fail to compile)\n\n", verb, test_file);
                if let Err(e) = register_rust_module(self.host, &root, &module).await {
                    yield format!(
                        "❌ **Error creating file:** {}\n\n_Unable to continue TDD cycle without test file._\n",
                        e
                    );
                    return;
                }
                yield format!("📦 **Registered module:** `{}` in lib.rs\n\n", module);
            } else {
                yield format!("✅ **{}:** `{}`\n\n", verb, test_file);
            }

            let test_command = build_test_command(framework, &test_file);
            yield format!("🏃 **Running tests:** `{}`\n\n", test_command);
            let mut result = run_tests(self.host, &test_command, &root).await;
            yield messages::output_block(&result.output, self.config.output_preview_chars);
            if result.passed {
                warn!(session = %self.session_id, "Test passed before any implementation");
                yield "⚠️ **Unexpected:** Test passed on first run! The test may not be properly failing.\n\
                       Consider reviewing the test to ensure it tests for behavior that doesn't exist yet.\n\n"
                    .to_string();
            } else {
                yield format!("✅ **Test fails as expected** (exit code: {})\n\n", result.display_code());
            }

            // GREEN
            info!(session = %self.session_id, "Phase GREEN");
            yield messages::green_heading();
            let context_limit = caps.content_limit(ContentKind::Context);
            let limits = PromptLimits {
                context: context_limit,
                failure_output: self.config.failure_output_chars,
            };
            let max_iterations = self.config.max_iterations;
            let mut impl_code = String::new();
            let mut iteration = 0u32;
            let mut guard = RepetitionGuard::new();
            let mut warned = false;

            while !result.passed && iteration < max_iterations {
                iteration += 1;
                debug!(session = %self.session_id, iteration, "GREEN iteration");
                yield format!("### Iteration {}/{}\n\n", iteration, max_iterations);

                if !caps.is_cloud
                    && iteration == self.config.local_model_warning_threshold
                    && !warned
                {
                    warned = true;
                    yield messages::struggling_advisory(iteration, max_iterations);
                }

                // Nothing written yet, or the last write failed: start over.
                let attempt = if impl_code.is_empty() {
                    GreenAttempt::First
                } else {
                    GreenAttempt::Retry {
                        previous_impl: &impl_code,
                        failure_output: &result.output,
                    }
                };
                let green_prompt = prompts::green_prompt(framework, &test_code, attempt, limits);

                yield "🤖 _Generating implementation..._\n\n".to_string();
                yield format!("**Generated implementation:**\n```{}\n", lang);
                let mut raw_impl = String::new();
                let mut chunks = self.model.stream_complete(&green_prompt);
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        Ok(text) => {
                            raw_impl.push_str(&text);
                            yield text;
                        }
                        Err(e) => {
                            warn!(session = %self.session_id, iteration, "Model stream failed: {}", e);
                            yield format!("\n⚠️ **Model error:** {}\n", e);
                            break;
                        }
                    }
                }
                drop(chunks);
                yield "\n```\n\n".to_string();

                if raw_impl.trim().is_empty() {
                    yield "❌ **Error:** Model did not generate any implementation code.\n\
                           _Skipping this iteration..._\n\n"
                        .to_string();
                    continue;
                }

                let cleaned = strip_code_block(&raw_impl);
                if !caps.is_cloud && guard.is_repeat(&cleaned) {
                    debug!(session = %self.session_id, iteration, "Repeated implementation");
                    yield messages::repetition_warning(iteration);
                }
                guard.record(&cleaned);

                yield format!("📝 **Writing:** `{}`\n", impl_file);
                let impl_path = root.join(&impl_file);
                if let Err(e) = self.host.write_file(&impl_path, &cleaned).await {
                    warn!(session = %self.session_id, file = %impl_file, "Failed to write implementation: {}", e);
                    yield format!("❌ **Error creating file:** {}\n\n", e);
                    impl_code.clear();
                    continue;
                }
                impl_code = cleaned;
                self.open_quietly(&impl_path).await;
                yield format!("✅ **{}:** `{}`\n\n", verb, impl_file);
                if colocated {
                    match register_rust_module(self.host, &root, &module).await {
                        Ok(_) => {
                            yield format!("📦 **Registered module:** `{}` in lib.rs\n\n", module);
                        }
                        Err(e) => {
                            yield format!("❌ **Error creating file:** {}\n\n", e);
                            continue;
                        }
                    }
                }

                yield format!("🏃 **Running tests:** `{}`\n\n", test_command);
                result = run_tests(self.host, &test_command, &root).await;
                yield messages::output_block(&result.output, self.config.output_preview_chars);

                if result.passed {
                    info!(session = %self.session_id, iteration, "Tests pass");
                    yield "✅ **Tests pass!** 🎉\n\n".to_string();
                    break;
                }
                yield format!("❌ **Tests still failing** (exit code: {})\n\n", result.display_code());
            }

            if !result.passed {
                warn!(session = %self.session_id, max_iterations, "Iteration budget exhausted");
                yield messages::exhaustion_report(max_iterations, caps.is_cloud);
            }

            // REFACTOR
            info!(session = %self.session_id, "Phase REFACTOR");
            yield messages::refactor_heading();
            let refactor_prompt =
                prompts::refactor_prompt(framework, &test_code, &impl_code, context_limit);
            let mut chunks = self.model.stream_complete(&refactor_prompt);
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(text) => {
                        yield text;
                    }
                    Err(e) => {
                        warn!(session = %self.session_id, "Model stream failed: {}", e);
                        yield format!("\n⚠️ **Model error:** {}\n", e);
                        break;
                    }
                }
            }
            drop(chunks);
            yield "\n\n".to_string();

            info!(session = %self.session_id, passed = result.passed, iterations = iteration, "TDD cycle finished");
            yield messages::summary(result.passed, &test_file, &impl_file, iteration, layout);
        })
    }

    /// Run the session and collect the whole progress stream.
    pub async fn run_to_string(&self, transcript: Vec<ChatMessage>) -> String {
        self.run(transcript).collect::<Vec<_>>().await.concat()
    }
}
