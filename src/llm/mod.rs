//! Model client abstraction.
//!
//! The loops talk to language models through the [`LlmClient`] trait. The
//! important operation is [`LlmClient::stream_complete`], which yields text
//! chunks as the model produces them; the TDD loop concatenates them before
//! cleaning the output.
//!
//! Providers are driven through their command-line tools:
//!
//! - [`ClaudeClient`] runs `claude -p`
//! - [`OllamaProvider`] runs `ollama run <model>`
//! - [`MockLlmClient`] returns scripted responses for tests and dry runs
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use redgreen::llm::{LlmClient, MockLlmClient};
//!
//! let client = MockLlmClient::new().with_response("fn a() {}");
//! let mut stream = client.stream_complete("write a function");
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?);
//! }
//! ```

pub mod capabilities;
pub mod ollama;

pub use capabilities::{smart_truncate, truncate_content, ContentKind, ModelCapabilities};
pub use ollama::{OllamaApiError, OllamaModel, OllamaProvider};

use crate::error::RedGreenError;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command as AsyncCommand};
use tracing::debug;

/// Abstraction for language model operations.
///
/// Object-safe so sessions can hold a `&dyn LlmClient` chosen at runtime.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run a prompt and return the complete response.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be reached or exits abnormally.
    async fn run_prompt(&self, prompt: &str) -> Result<String>;

    /// Stream the response to a prompt as text chunks.
    ///
    /// The default implementation yields the whole [`run_prompt`] result as
    /// a single chunk.
    ///
    /// [`run_prompt`]: LlmClient::run_prompt
    fn stream_complete<'a>(&'a self, prompt: &'a str) -> BoxStream<'a, Result<String>> {
        Box::pin(stream::once(self.run_prompt(prompt)))
    }

    /// Model identifier shown to the user.
    fn model_name(&self) -> &str;

    /// Provider identifier used to resolve [`ModelCapabilities`].
    fn provider_name(&self) -> &str;

    /// Limits for this model.
    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::resolve(self.provider_name(), self.model_name())
    }
}

// =============================================================================
// CLI plumbing shared by the command-line providers
// =============================================================================

async fn spawn_with_prompt(
    mut command: AsyncCommand,
    prompt: &str,
) -> Result<(Child, Lines<BufReader<ChildStdout>>)> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.flush().await?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("child process has no stdout"))?;
    Ok((child, BufReader::new(stdout).lines()))
}

/// Run `command` with `prompt` on stdin, yielding stdout line by line.
pub(crate) fn stream_command(
    command: AsyncCommand,
    program: &'static str,
    prompt: String,
) -> BoxStream<'static, Result<String>> {
    let output = async_stream::stream! {
        let (mut child, mut lines) = match spawn_with_prompt(command, &prompt).await {
            Ok(spawned) => spawned,
            Err(e) => {
                yield Err(e);
                return;
            }
        };

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => yield Ok(format!("{}\n", line)),
                Ok(None) => break,
                Err(e) => {
                    yield Err(anyhow::Error::from(e));
                    return;
                }
            }
        }

        match child.wait().await {
            Ok(status) if !status.success() => {
                yield Err(anyhow::Error::from(RedGreenError::model(
                    program,
                    format!("process exited with code {}", status.code().unwrap_or(-1)),
                )));
            }
            Ok(_) => {}
            Err(e) => yield Err(anyhow::Error::from(e)),
        }
    };
    Box::pin(output)
}

// =============================================================================
// Claude
// =============================================================================

/// Claude client driving the `claude` CLI in print mode.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    project_dir: PathBuf,
    model: String,
}

impl ClaudeClient {
    /// Variant used when none is configured.
    pub const DEFAULT_MODEL: &'static str = "sonnet";

    #[must_use]
    pub fn new<P: Into<PathBuf>>(project_dir: P) -> Self {
        Self {
            project_dir: project_dir.into(),
            model: Self::DEFAULT_MODEL.to_string(),
        }
    }

    /// Set the model variant ("opus", "sonnet", "haiku" or a full model id).
    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Whether the `claude` binary is on `PATH`.
    #[must_use]
    pub fn available() -> bool {
        which::which("claude").is_ok()
    }

    fn command(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new("claude");
        cmd.args([
            "-p",
            "--dangerously-skip-permissions",
            "--model",
            self.model.as_str(),
            "--output-format",
            "text",
        ])
        .current_dir(&self.project_dir);
        cmd
    }
}

#[async_trait]
impl LlmClient for ClaudeClient {
    async fn run_prompt(&self, prompt: &str) -> Result<String> {
        debug!(
            "Running Claude with model {} ({} chars prompt)",
            self.model,
            prompt.len()
        );

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.flush().await?;
        }

        let output = child.wait_with_output().await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(RedGreenError::model(
                self.model_name(),
                format!("process exited with code {}", output.status.code().unwrap_or(-1)),
            )
            .into())
        }
    }

    fn stream_complete<'a>(&'a self, prompt: &'a str) -> BoxStream<'a, Result<String>> {
        debug!("Streaming Claude {} ({} chars prompt)", self.model, prompt.len());
        stream_command(self.command(), "claude", prompt.to_string())
    }

    fn model_name(&self) -> &str {
        match self.model.as_str() {
            "opus" => "claude-opus-4",
            "sonnet" => "claude-sonnet-4",
            "haiku" => "claude-haiku-3.5",
            other => other,
        }
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

// =============================================================================
// Mock
// =============================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted client for tests and dry runs.
///
/// Responses queued with [`with_responses`](Self::with_responses) are
/// returned in order; once the queue is empty the fallback response from
/// [`with_response`](Self::with_response) is returned. Every prompt is
/// recorded.
#[derive(Debug)]
pub struct MockLlmClient {
    queued: Mutex<VecDeque<String>>,
    response: String,
    error: Option<String>,
    model: String,
    provider: String,
    call_count: AtomicU32,
    fail_count: AtomicU32,
    fail_error: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl Clone for MockLlmClient {
    fn clone(&self) -> Self {
        Self {
            queued: Mutex::new(lock(&self.queued).clone()),
            response: self.response.clone(),
            error: self.error.clone(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            call_count: AtomicU32::new(self.call_count.load(Ordering::SeqCst)),
            fail_count: AtomicU32::new(self.fail_count.load(Ordering::SeqCst)),
            fail_error: self.fail_error.clone(),
            prompts: Mutex::new(lock(&self.prompts).clone()),
        }
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            response: String::new(),
            error: None,
            model: "mock-llm".to_string(),
            provider: "ollama".to_string(),
            call_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(0),
            fail_error: None,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl MockLlmClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Response returned when the queue is empty.
    #[must_use]
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Responses returned one per call, in order.
    #[must_use]
    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.queued).extend(responses.into_iter().map(Into::into));
        self
    }

    /// Fail every call with `error`.
    #[must_use]
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    #[must_use]
    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model = name.to_string();
        self
    }

    /// Provider reported for capability lookup ("ollama" unless set).
    #[must_use]
    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = provider.to_string();
        self
    }

    /// Fail the first `count` calls, then succeed.
    #[must_use]
    pub fn with_fail_count(mut self, count: u32, error: &str) -> Self {
        self.fail_count = AtomicU32::new(count);
        self.fail_error = Some(error.to_string());
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    fn next_response(&self, prompt: &str) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts).push(prompt.to_string());

        if self.fail_count.load(Ordering::SeqCst) > 0 {
            self.fail_count.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!(
                "{}",
                self.fail_error.as_deref().unwrap_or("Mock failure")
            );
        }

        if let Some(ref error) = self.error {
            anyhow::bail!("{}", error)
        }

        Ok(lock(&self.queued)
            .pop_front()
            .unwrap_or_else(|| self.response.clone()))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn run_prompt(&self, prompt: &str) -> Result<String> {
        self.next_response(prompt)
    }

    fn stream_complete<'a>(&'a self, prompt: &'a str) -> BoxStream<'a, Result<String>> {
        // Split on spaces so consumers see more than one chunk.
        let chunks: Vec<Result<String>> = match self.next_response(prompt) {
            Ok(text) => text.split_inclusive(' ').map(|c| Ok(c.to_string())).collect(),
            Err(e) => vec![Err(e)],
        };
        Box::pin(stream::iter(chunks))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// The `llm` section of `.redgreen/settings.json`.
///
/// ```json
/// {
///   "llm": {
///     "provider": "ollama",
///     "model": "codellama",
///     "options": { "timeoutSecs": 300 }
///   }
/// }
/// ```
///
/// The `mock` provider reads `response` (string) and `responses` (array of
/// strings) from `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// One of "claude", "ollama", "mock". Default: "claude".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name for the provider; provider default when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// Provider-specific options.
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

/// Providers `create_llm_client` can build.
pub const VALID_PROVIDERS: &[&str] = &["claude", "ollama", "mock"];

fn default_provider() -> String {
    "claude".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            options: HashMap::new(),
        }
    }
}

impl LlmConfig {
    /// Validate the provider and its options.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !VALID_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(format!(
                "Invalid provider '{}'. Valid options: {}",
                self.provider,
                VALID_PROVIDERS.join(", ")
            ));
        }

        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err("llm.model must not be empty".to_string());
            }
        }

        match self.provider.as_str() {
            "ollama" => self.validate_ollama_options(),
            "mock" => self.validate_mock_options(),
            _ => Ok(()),
        }
    }

    fn validate_ollama_options(&self) -> std::result::Result<(), String> {
        if let Some(timeout) = self.options.get("timeoutSecs") {
            if timeout.as_u64().is_none_or(|t| t == 0) {
                return Err("Ollama timeoutSecs must be a positive integer".to_string());
            }
        }
        Ok(())
    }

    fn validate_mock_options(&self) -> std::result::Result<(), String> {
        if let Some(responses) = self.options.get("responses") {
            let all_strings = responses
                .as_array()
                .is_some_and(|items| items.iter().all(serde_json::Value::is_string));
            if !all_strings {
                return Err("Mock responses must be an array of strings".to_string());
            }
        }
        Ok(())
    }

    fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }
}

/// Build a client from configuration.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn create_llm_client(config: &LlmConfig, project_dir: &Path) -> Result<Box<dyn LlmClient>> {
    config.validate().map_err(|e| anyhow!("{}", e))?;

    match config.provider.as_str() {
        "claude" => {
            let model = config.model.as_deref().unwrap_or(ClaudeClient::DEFAULT_MODEL);
            Ok(Box::new(ClaudeClient::new(project_dir).with_model(model)))
        }
        "ollama" => {
            let mut provider = match config.model.as_deref() {
                Some(model) => OllamaProvider::from_model_name(model),
                None => OllamaProvider::new(OllamaModel::default()),
            };
            if let Some(timeout) = config.options.get("timeoutSecs").and_then(|v| v.as_u64()) {
                provider = provider.with_timeout(timeout);
            }
            Ok(Box::new(provider))
        }
        "mock" => {
            let mut client = MockLlmClient::new()
                .with_response(config.option_str("response").unwrap_or_default());
            if let Some(model) = &config.model {
                client = client.with_model_name(model);
            }
            if let Some(responses) = config.options.get("responses").and_then(|v| v.as_array()) {
                client = client.with_responses(
                    responses.iter().filter_map(|r| r.as_str()).map(String::from),
                );
            }
            Ok(Box::new(client))
        }
        other => anyhow::bail!(
            "Unknown provider '{}'. Valid options: {}",
            other,
            VALID_PROVIDERS.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(client: &dyn LlmClient, prompt: &str) -> Result<String> {
        let mut out = String::new();
        let mut chunks = client.stream_complete(prompt);
        while let Some(chunk) = chunks.next().await {
            out.push_str(&chunk?);
        }
        Ok(out)
    }

    #[test]
    fn test_llm_config_default_is_claude() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, "claude");
        assert!(config.model.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_llm_config_rejects_unknown_provider() {
        let config = LlmConfig {
            provider: "gpt-cloud".to_string(),
            ..LlmConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("Invalid provider"));
    }

    #[test]
    fn test_llm_config_rejects_empty_model() {
        let config = LlmConfig {
            model: Some("  ".to_string()),
            ..LlmConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_llm_config_ollama_timeout() {
        let mut config = LlmConfig {
            provider: "ollama".to_string(),
            ..LlmConfig::default()
        };
        config
            .options
            .insert("timeoutSecs".to_string(), serde_json::json!(0));
        assert!(config.validate().is_err());

        config
            .options
            .insert("timeoutSecs".to_string(), serde_json::json!(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_llm_config_deserialize() {
        let json = r#"{"provider": "mock", "options": {"responses": ["a", "b"]}}"#;
        let config: LlmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.provider, "mock");
        assert!(config.validate().is_ok());

        let bad = r#"{"provider": "mock", "options": {"responses": [1]}}"#;
        let config: LlmConfig = serde_json::from_str(bad).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_create_claude_client() {
        let config = LlmConfig {
            model: Some("opus".to_string()),
            ..LlmConfig::default()
        };
        let client = create_llm_client(&config, Path::new(".")).unwrap();
        assert_eq!(client.model_name(), "claude-opus-4");
        assert!(client.capabilities().is_cloud);
    }

    #[test]
    fn test_create_ollama_client_is_local() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            model: Some("codellama".to_string()),
            options: HashMap::new(),
        };
        let client = create_llm_client(&config, Path::new(".")).unwrap();
        assert_eq!(client.model_name(), "codellama");
        assert!(client.capabilities().is_local);
    }

    #[tokio::test]
    async fn test_create_mock_client_from_options() {
        let config: LlmConfig = serde_json::from_str(
            r#"{"provider": "mock", "options": {"responses": ["first"], "response": "rest"}}"#,
        )
        .unwrap();
        let client = create_llm_client(&config, Path::new(".")).unwrap();
        assert_eq!(client.run_prompt("a").await.unwrap(), "first");
        assert_eq!(client.run_prompt("b").await.unwrap(), "rest");
    }

    #[tokio::test]
    async fn test_mock_queue_then_fallback() {
        let client = MockLlmClient::new()
            .with_responses(["one", "two"])
            .with_response("fallback");

        assert_eq!(client.run_prompt("p1").await.unwrap(), "one");
        assert_eq!(client.run_prompt("p2").await.unwrap(), "two");
        assert_eq!(client.run_prompt("p3").await.unwrap(), "fallback");
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_mock_fail_count() {
        let client = MockLlmClient::new()
            .with_response("ok")
            .with_fail_count(1, "busy");

        assert_eq!(client.run_prompt("a").await.unwrap_err().to_string(), "busy");
        assert_eq!(client.run_prompt("b").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_mock_stream_concatenates_to_response() {
        let client = MockLlmClient::new().with_response("fn add(a: i32) -> i32 { a }");
        let text = collect(&client, "write add").await.unwrap();
        assert_eq!(text, "fn add(a: i32) -> i32 { a }");
    }

    #[tokio::test]
    async fn test_mock_stream_error() {
        let client = MockLlmClient::new().with_error("model offline");
        let err = collect(&client, "x").await.unwrap_err();
        assert!(err.to_string().contains("model offline"));
    }

    #[tokio::test]
    async fn test_default_stream_uses_run_prompt() {
        struct Echo;

        #[async_trait]
        impl LlmClient for Echo {
            async fn run_prompt(&self, prompt: &str) -> Result<String> {
                Ok(prompt.to_uppercase())
            }
            fn model_name(&self) -> &str {
                "echo"
            }
            fn provider_name(&self) -> &str {
                "lmstudio"
            }
        }

        assert_eq!(collect(&Echo, "hi").await.unwrap(), "HI");
        assert!(Echo.capabilities().is_local);
    }

    #[test]
    fn test_mock_clone_preserves_queue() {
        let client = MockLlmClient::new().with_responses(["a"]);
        let cloned = client.clone();
        assert_eq!(cloned.next_response("x").unwrap(), "a");
        assert_eq!(client.next_response("x").unwrap(), "a");
    }
}
