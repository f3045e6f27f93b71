//! Ollama provider for local inference.
//!
//! Drives the `ollama` CLI: `ollama list` for availability and `ollama run`
//! with the prompt on stdin. Streaming yields stdout line by line.

use crate::llm::{stream_command, LlmClient};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

// =============================================================================
// Ollama Model Variants
// =============================================================================

/// Common Ollama models. Availability depends on what has been pulled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OllamaModel {
    #[default]
    Llama3,
    Llama3_1,
    CodeLlama,
    Mistral,
    DeepSeekCoder,
    Qwen25Coder,
    Custom(String),
}

impl OllamaModel {
    /// Name as used on the ollama command line.
    ///
    /// ```rust
    /// use redgreen::llm::OllamaModel;
    ///
    /// assert_eq!(OllamaModel::Llama3.model_name(), "llama3");
    /// assert_eq!(OllamaModel::CodeLlama.model_name(), "codellama");
    /// ```
    #[must_use]
    pub fn model_name(&self) -> &str {
        match self {
            Self::Llama3 => "llama3",
            Self::Llama3_1 => "llama3.1",
            Self::CodeLlama => "codellama",
            Self::Mistral => "mistral",
            Self::DeepSeekCoder => "deepseek-coder",
            Self::Qwen25Coder => "qwen2.5-coder",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Parse a model name, falling back to [`OllamaModel::Custom`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "llama3" | "llama-3" | "llama 3" => Self::Llama3,
            "llama3.1" | "llama-3.1" | "llama 3.1" => Self::Llama3_1,
            "codellama" | "code-llama" | "code_llama" => Self::CodeLlama,
            "mistral" => Self::Mistral,
            "deepseek-coder" | "deepseek_coder" | "deepseekcoder" => Self::DeepSeekCoder,
            "qwen2.5-coder" | "qwen-coder" => Self::Qwen25Coder,
            _ => Self::Custom(s.to_string()),
        }
    }
}

// =============================================================================
// Ollama Errors
// =============================================================================

/// Errors from driving the ollama CLI.
#[derive(Debug, Error)]
pub enum OllamaApiError {
    /// The `ollama` binary is not on `PATH`.
    #[error("ollama CLI not found. Install it from https://ollama.com")]
    CliMissing,

    /// Ollama server is not running or unreachable.
    #[error("Ollama server not available: {message}")]
    ServerUnavailable { message: String },

    /// The requested model is not installed.
    #[error("Model '{model}' is not installed. Run: ollama pull {model}")]
    ModelNotFound { model: String },

    #[error("Request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Invalid response from Ollama: {message}")]
    InvalidResponse { message: String },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },
}

impl OllamaApiError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerUnavailable { .. } | Self::Timeout { .. })
    }

    /// Classify stderr from a failed `ollama run`.
    fn from_stderr(model: &str, stderr: String) -> Self {
        if stderr.contains("model") && stderr.contains("not found") {
            Self::ModelNotFound {
                model: model.to_string(),
            }
        } else if stderr.contains("connection refused") || stderr.contains("connect:") {
            Self::ServerUnavailable { message: stderr }
        } else {
            Self::InvalidResponse { message: stderr }
        }
    }
}

/// Whether an `ollama list` table contains `model`.
fn list_contains(listing: &str, model: &str) -> bool {
    // NAME            ID              SIZE    MODIFIED
    // llama3:latest   abc123...       4.7GB   2 days ago
    listing.lines().skip(1).any(|line| {
        line.split_whitespace().next().is_some_and(|name| {
            name.starts_with(model) || name.split(':').next() == Some(model)
        })
    })
}

// =============================================================================
// Ollama Provider
// =============================================================================

/// Local model client backed by the ollama CLI.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    model: OllamaModel,
    timeout_secs: u64,
}

impl OllamaProvider {
    /// Default request timeout (local inference can be slow).
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    #[must_use]
    pub fn new(model: OllamaModel) -> Self {
        Self {
            model,
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }

    #[must_use]
    pub fn from_model_name(model_name: &str) -> Self {
        Self::new(OllamaModel::parse(model_name))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    #[must_use]
    pub fn model(&self) -> &OllamaModel {
        &self.model
    }

    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Check that the CLI exists, the server answers and the model is pulled.
    ///
    /// # Errors
    ///
    /// Returns [`OllamaApiError::CliMissing`] when the binary is absent.
    pub async fn check_availability(&self) -> Result<bool, OllamaApiError> {
        which::which("ollama").map_err(|_| OllamaApiError::CliMissing)?;

        let output = match tokio::time::timeout(
            Duration::from_secs(5),
            AsyncCommand::new("ollama").arg("list").output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("Failed to run 'ollama list': {}", e);
                return Ok(false);
            }
            Err(_) => {
                debug!("'ollama list' timed out - server may be unresponsive");
                return Ok(false);
            }
        };

        if !output.status.success() {
            debug!(
                "'ollama list' failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(false);
        }

        Ok(list_contains(
            &String::from_utf8_lossy(&output.stdout),
            self.model.model_name(),
        ))
    }

    fn command(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new("ollama");
        cmd.args(["run", self.model.model_name()]);
        cmd
    }

    async fn execute_prompt(&self, prompt: &str) -> Result<String, OllamaApiError> {
        if !self.check_availability().await? {
            return Err(OllamaApiError::ModelNotFound {
                model: self.model.model_name().to_string(),
            });
        }

        let model_name = self.model.model_name();
        debug!("Running Ollama {} ({} chars prompt)", model_name, prompt.len());

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OllamaApiError::ConnectionError {
                message: format!("Failed to spawn ollama process: {}", e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| OllamaApiError::ConnectionError {
                    message: format!("Failed to write prompt: {}", e),
                })?;
        }

        let output = match tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(OllamaApiError::ConnectionError {
                    message: format!("Failed to read output: {}", e),
                })
            }
            Err(_) => {
                return Err(OllamaApiError::Timeout {
                    timeout_secs: self.timeout_secs,
                })
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(OllamaApiError::from_stderr(
                model_name,
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }
}

#[async_trait]
impl LlmClient for OllamaProvider {
    async fn run_prompt(&self, prompt: &str) -> Result<String> {
        self.execute_prompt(prompt)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }

    fn stream_complete<'a>(&'a self, prompt: &'a str) -> BoxStream<'a, Result<String>> {
        debug!(
            "Streaming Ollama {} ({} chars prompt)",
            self.model.model_name(),
            prompt.len()
        );
        stream_command(self.command(), "ollama", prompt.to_string())
    }

    fn model_name(&self) -> &str {
        self.model.model_name()
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_parse() {
        assert_eq!(OllamaModel::parse("Llama-3"), OllamaModel::Llama3);
        assert_eq!(OllamaModel::parse("code_llama"), OllamaModel::CodeLlama);
        assert_eq!(OllamaModel::parse("qwen-coder"), OllamaModel::Qwen25Coder);
        assert_eq!(
            OllamaModel::parse("phi3"),
            OllamaModel::Custom("phi3".to_string())
        );
    }

    #[test]
    fn test_custom_model_name_round_trips() {
        assert_eq!(OllamaModel::parse("starcoder2:7b").model_name(), "starcoder2:7b");
    }

    #[test]
    fn test_provider_defaults() {
        let provider = OllamaProvider::new(OllamaModel::default());
        assert_eq!(provider.model_name(), "llama3");
        assert_eq!(provider.timeout_secs(), OllamaProvider::DEFAULT_TIMEOUT_SECS);
        assert!(provider.capabilities().is_local);
        assert_eq!(provider.with_timeout(10).timeout_secs(), 10);
    }

    #[test]
    fn test_list_contains() {
        let listing = "NAME ID SIZE MODIFIED\nllama3:latest abc 4.7GB now\ncodellama:7b def 3GB now\n";
        assert!(list_contains(listing, "llama3"));
        assert!(list_contains(listing, "codellama"));
        assert!(!list_contains(listing, "mistral"));
        assert!(!list_contains("NAME ID SIZE MODIFIED\n", "llama3"));
    }

    #[test]
    fn test_error_classification() {
        let err = OllamaApiError::from_stderr("phi3", "Error: model 'phi3' not found".into());
        assert!(matches!(err, OllamaApiError::ModelNotFound { .. }));
        assert!(err.to_string().contains("ollama pull phi3"));

        let err = OllamaApiError::from_stderr("phi3", "dial tcp: connection refused".into());
        assert!(err.is_retryable());

        let err = OllamaApiError::from_stderr("phi3", "weird".into());
        assert!(!err.is_retryable());
    }
}
