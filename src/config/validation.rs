//! Settings file validation for `redgreen config validate`.

use std::path::{Path, PathBuf};

use super::ProjectConfig;

/// Result of configuration validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Errors that prevent the configuration from being valid.
    pub errors: Vec<String>,
    /// Warnings that don't prevent validity but indicate potential issues.
    pub warnings: Vec<String>,
    /// Files that were validated.
    pub files_checked: Vec<PathBuf>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no errors. Warnings do not affect validity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns 0 if valid, 1 if invalid.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.is_valid() {
            0
        } else {
            1
        }
    }

    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_valid() {
            if self.warnings.is_empty() {
                "Configuration is valid.".to_string()
            } else {
                format!(
                    "Configuration is valid with {} warning(s).",
                    self.warnings.len()
                )
            }
        } else {
            format!(
                "Configuration is invalid with {} error(s).",
                self.errors.len()
            )
        }
    }

    /// Multi-line report listing files, errors and warnings.
    #[must_use]
    pub fn verbose_report(&self) -> String {
        let mut lines = vec![
            "Configuration Validation Report".to_string(),
            "\u{2500}".repeat(50),
        ];

        if self.files_checked.is_empty() {
            lines.push("  (no settings file found, defaults apply)".to_string());
        } else {
            lines.push(format!("Files checked ({}):", self.files_checked.len()));
            for file in &self.files_checked {
                lines.push(format!("  - {}", file.display()));
            }
        }

        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push(format!("Errors ({}):", self.errors.len()));
            for error in &self.errors {
                lines.push(format!("  \u{2717} {}", error));
            }
        }

        if !self.warnings.is_empty() {
            lines.push(String::new());
            lines.push(format!("Warnings ({}):", self.warnings.len()));
            for warning in &self.warnings {
                lines.push(format!("  \u{26a0} {}", warning));
            }
        }

        lines.push(String::new());
        lines.push(format!("Status: {}", self.summary()));
        lines.join("\n")
    }
}

/// Validates the settings file that applies to a project.
#[derive(Debug, Clone)]
pub struct ConfigValidator {
    project_dir: PathBuf,
    settings_override: Option<PathBuf>,
}

impl ConfigValidator {
    #[must_use]
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            settings_override: None,
        }
    }

    /// Validate a specific file instead of the located one.
    #[must_use]
    pub fn with_settings_path(mut self, path: PathBuf) -> Self {
        self.settings_override = Some(path);
        self
    }

    /// Validate and return a report. Problems never surface as `Err`.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();

        let path = match self
            .settings_override
            .clone()
            .or_else(|| ProjectConfig::locate(&self.project_dir))
        {
            Some(path) => path,
            None => {
                report
                    .warnings
                    .push("No settings.json found; built-in defaults apply".to_string());
                Self::check_fields(&ProjectConfig::default(), &mut report);
                return report;
            }
        };
        report.files_checked.push(path.clone());

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                report
                    .errors
                    .push(format!("Cannot read settings.json: {}", e));
                return report;
            }
        };

        if let Err(e) = serde_json::from_str::<serde_json::Value>(&content) {
            report.errors.push(format!(
                "settings.json syntax error: {} (parse failed at line {}, column {})",
                e,
                e.line(),
                e.column()
            ));
            return report;
        }

        match serde_json::from_str::<ProjectConfig>(&content) {
            Ok(config) => Self::check_fields(&config, &mut report),
            Err(e) => report
                .errors
                .push(format!("settings.json has wrong field types: {}", e)),
        }

        report
    }

    fn check_fields(config: &ProjectConfig, report: &mut ValidationReport) {
        report.errors.extend(config.validate());

        if config.llm.provider == "mock" {
            report
                .warnings
                .push("llm.provider is 'mock'; no real model will be called".to_string());
        }
    }
}
