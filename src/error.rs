//! Custom error types for redgreen.
//!
//! The orchestration loops never surface these to the caller directly: every
//! collaborator failure is turned into a progress line. These variants are
//! raised by the configuration layer, [`LocalHost`](crate::host::LocalHost),
//! the model clients and the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for redgreen operations
#[derive(Error, Debug)]
pub enum RedGreenError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Host Errors
    // =========================================================================
    /// A file could not be read through the host
    #[error("Failed to read file: {path}")]
    ReadFailed { path: PathBuf },

    /// A file could not be written through the host
    #[error("Failed to write {path}: {message}")]
    WriteFailed { path: PathBuf, message: String },

    /// Subprocess could not be spawned
    #[error("Command '{command}' failed to start: {message}")]
    Subprocess { command: String, message: String },

    // =========================================================================
    // Model Errors
    // =========================================================================
    /// Model invocation failed
    #[error("Model '{model}' failed: {message}")]
    Model { model: String, message: String },

    /// Missing required tool (model CLI)
    #[error("Missing required tool: {tool}")]
    MissingTool { tool: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RedGreenError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a write failure
    pub fn write_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a model error
    pub fn model(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Model {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Whether the loops may keep going after this error.
    ///
    /// Host write, spawn and model failures cost one iteration or attempt;
    /// configuration problems end the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::WriteFailed { .. }
                | Self::Subprocess { .. }
                | Self::Model { .. }
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingTool { .. } => 6,
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for redgreen results
pub type Result<T> = std::result::Result<T, RedGreenError>;
