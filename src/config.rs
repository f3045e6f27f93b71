//! Project configuration loaded from `.redgreen/settings.json`.
//!
//! Lookup order: the project's own settings file, then the user-level file
//! under the platform config directory, then built-in defaults. Every section
//! and every field is optional in the file.
//!
//! ```json
//! {
//!   "llm": { "provider": "ollama", "model": "codellama" },
//!   "tdd": { "maxIterations": 15, "localModelWarningThreshold": 10 },
//!   "verification": { "minConfidence": 0.7, "useLlm": true },
//!   "cache": { "ttlSecs": 30 }
//! }
//! ```

pub mod validation;

pub use validation::{ConfigValidator, ValidationReport};

use crate::error::RedGreenError;
use crate::llm::LlmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Directory holding project-level settings.
pub const SETTINGS_DIR: &str = ".redgreen";

/// Settings file name, both for the project and the user level.
pub const SETTINGS_FILE: &str = "settings.json";

/// Settings for the red/green/refactor loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TddConfig {
    /// GREEN phase iteration budget.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Iteration after which local models get a one-time advisory.
    #[serde(default = "default_local_warning_threshold")]
    pub local_model_warning_threshold: u32,

    /// Characters of test output shown in progress previews.
    #[serde(default = "default_output_preview_chars")]
    pub output_preview_chars: usize,

    /// Characters of failing output fed back into the next GREEN prompt.
    #[serde(default = "default_failure_output_chars")]
    pub failure_output_chars: usize,

    /// Create missing build files (Cargo.toml, go.mod, ...) before RED.
    #[serde(default = "default_true")]
    pub setup_project: bool,
}

fn default_max_iterations() -> u32 {
    15
}

fn default_local_warning_threshold() -> u32 {
    10
}

fn default_output_preview_chars() -> usize {
    6000
}

fn default_failure_output_chars() -> usize {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for TddConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            local_model_warning_threshold: default_local_warning_threshold(),
            output_preview_chars: default_output_preview_chars(),
            failure_output_chars: default_failure_output_chars(),
            setup_project: true,
        }
    }
}

/// Settings for the verification engine and autonomous mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationConfig {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_true")]
    pub use_llm: bool,

    #[serde(default = "default_true")]
    pub check_diagnostics: bool,

    /// Edit attempts in autonomous mode.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_min_confidence() -> f64 {
    0.7
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            use_llm: true,
            check_diagnostics: true,
            max_attempts: default_max_attempts(),
        }
    }
}

/// Settings for the per-session file cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Project configuration loaded from `.redgreen/settings.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub tdd: TddConfig,

    #[serde(default)]
    pub verification: VerificationConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl ProjectConfig {
    /// Load configuration for a project.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or parsed.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        match Self::locate(project_dir) {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from an explicit file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RedGreenError::config_with_path(format!("cannot read settings: {}", e), path.into())
        })?;
        let config: ProjectConfig = serde_json::from_str(&content).map_err(|e| {
            RedGreenError::config_with_path(format!("failed to parse settings: {}", e), path.into())
        })?;
        debug!(path = %path.display(), "Loaded settings");
        Ok(config)
    }

    /// First settings file that exists: project level, then user level.
    #[must_use]
    pub fn locate(project_dir: &Path) -> Option<PathBuf> {
        let project = Self::settings_path(project_dir);
        if project.exists() {
            return Some(project);
        }
        Self::user_settings_path().filter(|p| p.exists())
    }

    /// Get the settings.json path for a project
    #[must_use]
    pub fn settings_path(project_dir: &Path) -> PathBuf {
        project_dir.join(SETTINGS_DIR).join(SETTINGS_FILE)
    }

    /// User-level settings path, if the platform has a config directory.
    #[must_use]
    pub fn user_settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("redgreen").join(SETTINGS_FILE))
    }

    /// Apply command-line overrides on top of loaded values.
    pub fn apply_overrides(
        &mut self,
        provider: Option<&str>,
        model: Option<&str>,
        max_iterations: Option<u32>,
    ) {
        if let Some(provider) = provider {
            if provider != self.llm.provider {
                // A model name from another provider makes no sense here.
                self.llm.model = None;
            }
            self.llm.provider = provider.to_string();
        }
        if let Some(model) = model {
            self.llm.model = Some(model.to_string());
        }
        if let Some(n) = max_iterations {
            self.tdd.max_iterations = n;
        }
    }

    /// Check field values, returning every problem found.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Err(e) = self.llm.validate() {
            problems.push(e);
        }

        if self.tdd.max_iterations == 0 {
            problems.push("tdd.maxIterations must be at least 1".to_string());
        }
        if self.tdd.local_model_warning_threshold > self.tdd.max_iterations {
            problems.push(format!(
                "tdd.localModelWarningThreshold ({}) exceeds tdd.maxIterations ({})",
                self.tdd.local_model_warning_threshold, self.tdd.max_iterations
            ));
        }
        if self.tdd.output_preview_chars == 0 {
            problems.push("tdd.outputPreviewChars must be positive".to_string());
        }

        let confidence = self.verification.min_confidence;
        if confidence.is_nan() || !(0.0..=1.0).contains(&confidence) {
            problems.push(format!(
                "verification.minConfidence must be between 0 and 1, got {}",
                confidence
            ));
        }
        if self.verification.max_attempts == 0 {
            problems.push("verification.maxAttempts must be at least 1".to_string());
        }

        problems
    }
}
