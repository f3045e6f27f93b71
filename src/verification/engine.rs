//! Before/after verification of a code change.
//!
//! The engine scores a [`VerificationContext`] against its
//! [`SuccessCriteria`]. For every file snapshot it checks:
//!
//! 1. anti-patterns were removed (or reduced by at least 70%)
//! 2. positive patterns now appear
//! 3. the diagnostics provider reports no errors (optional)
//! 4. the file actually changed
//! 5. an LLM judge agrees the task is done (optional)
//!
//! Collaborator failures are logged and skip their check; they never abort
//! verification.

use crate::config::VerificationConfig;
use crate::llm::{LlmClient, ModelCapabilities};
use crate::verification::analyzer::{generate_verification_prompt, SuccessCriteria};
use crate::verification::patterns::PatternCriteria;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Longest line fragment quoted as evidence.
const EVIDENCE_CHARS: usize = 60;
/// Evidence lines kept for an introduced pattern.
const INTRODUCE_EVIDENCE_LIMIT: usize = 3;
/// Diagnostics quoted in the criterion evidence.
const DIAGNOSTIC_EVIDENCE_LIMIT: usize = 5;
/// Completion percentage the judge must report.
const JUDGE_COMPLETION_THRESHOLD: u32 = 80;

const LLM_CRITERION: &str = "LLM semantic verification";
const DIAGNOSTICS_CRITERION: &str = "No diagnostic errors";

// =============================================================================
// Collaborators
// =============================================================================

/// Source of current compiler/lint errors for a file.
#[async_trait]
pub trait DiagnosticsProvider: Send + Sync {
    async fn errors(&self, path: &Path) -> Result<Vec<String>>;
}

/// Answers a rubric prompt with free text in the rubric's format.
#[async_trait]
pub trait LlmJudge: Send + Sync {
    async fn judge(&self, prompt: &str) -> Result<String>;
}

/// Uses a model client as the judge.
pub struct ModelJudge<'a>(pub &'a dyn LlmClient);

#[async_trait]
impl LlmJudge for ModelJudge<'_> {
    async fn judge(&self, prompt: &str) -> Result<String> {
        self.0.run_prompt(prompt).await
    }
}

// =============================================================================
// Snapshots and context
// =============================================================================

/// 32-bit rolling checksum over UTF-16 code units, rendered in hex.
///
/// Only used to spot unchanged files quickly; not collision resistant.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let hash = content.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    });
    if hash < 0 {
        format!("-{:x}", hash.unsigned_abs())
    } else {
        format!("{:x}", hash)
    }
}

/// A file captured before an edit, waiting for its new content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub path: PathBuf,
    pub before_content: String,
    pub before_hash: String,
}

impl PendingSnapshot {
    /// Record the content after the edit.
    #[must_use]
    pub fn complete(self, after: impl Into<String>) -> FileSnapshot {
        let after_content = after.into();
        FileSnapshot {
            after_hash: content_hash(&after_content),
            path: self.path,
            before_content: self.before_content,
            before_hash: self.before_hash,
            after_content,
        }
    }
}

/// A file before and after an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSnapshot {
    pub path: PathBuf,
    pub before_content: String,
    pub after_content: String,
    pub before_hash: String,
    pub after_hash: String,
}

impl FileSnapshot {
    /// Start a snapshot from the content before the edit.
    #[must_use]
    pub fn capture(path: impl Into<PathBuf>, before: impl Into<String>) -> PendingSnapshot {
        let before_content = before.into();
        PendingSnapshot {
            path: path.into(),
            before_hash: content_hash(&before_content),
            before_content,
        }
    }
}

/// Everything one verification pass looks at.
#[derive(Debug, Clone)]
pub struct VerificationContext {
    pub instruction: String,
    pub criteria: SuccessCriteria,
    pub snapshots: Vec<FileSnapshot>,
    pub start_time: DateTime<Utc>,
    pub attempt: u32,
    pub max_attempts: u32,
    pub previous_results: Vec<VerificationResult>,
}

impl VerificationContext {
    #[must_use]
    pub fn new(instruction: impl Into<String>, criteria: SuccessCriteria) -> Self {
        Self {
            instruction: instruction.into(),
            criteria,
            snapshots: Vec::new(),
            start_time: Utc::now(),
            attempt: 1,
            max_attempts: 3,
            previous_results: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Add a snapshot, replacing any earlier one for the same path.
    pub fn add_snapshot(&mut self, snapshot: FileSnapshot) {
        match self.snapshots.iter_mut().find(|s| s.path == snapshot.path) {
            Some(existing) => *existing = snapshot,
            None => self.snapshots.push(snapshot),
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Which check produced a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Eliminate,
    Introduce,
    Diagnostics,
    FileChanged,
    LlmJudge,
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriterionResult {
    pub name: String,
    pub kind: CriterionKind,
    pub passed: bool,
    pub critical: bool,
    pub explanation: String,
    pub evidence: Vec<String>,
}

/// Outcome of a verification pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub passed: bool,
    pub confidence: f64,
    pub criteria_results: Vec<CriterionResult>,
    pub summary: String,
    pub suggestions: Vec<String>,
    pub diagnostic_errors: Vec<String>,
}

impl VerificationResult {
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.criteria_results.iter().filter(|r| r.passed).count()
    }
}

/// Knobs for one engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationOptions {
    pub use_llm: bool,
    pub min_confidence: f64,
    pub check_diagnostics: bool,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            use_llm: true,
            min_confidence: 0.7,
            check_diagnostics: true,
        }
    }
}

impl From<&VerificationConfig> for VerificationOptions {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            use_llm: config.use_llm,
            min_confidence: config.min_confidence,
            check_diagnostics: config.check_diagnostics,
        }
    }
}

/// Parsed judge verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeVerdict {
    pub accomplished: bool,
    pub completion: u32,
    pub remaining_issues: Vec<String>,
}

// =============================================================================
// Engine
// =============================================================================

/// Scores code changes against [`SuccessCriteria`].
#[derive(Debug, Clone, Default)]
pub struct VerificationEngine {
    options: VerificationOptions,
    capabilities: Option<ModelCapabilities>,
}

impl VerificationEngine {
    #[must_use]
    pub fn new(options: VerificationOptions) -> Self {
        Self {
            options,
            capabilities: None,
        }
    }

    /// Size judge prompts for this model.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    #[must_use]
    pub fn options(&self) -> &VerificationOptions {
        &self.options
    }

    /// Run every check over every snapshot.
    pub async fn verify(
        &self,
        context: &VerificationContext,
        diagnostics: Option<&dyn DiagnosticsProvider>,
        judge: Option<&dyn LlmJudge>,
    ) -> VerificationResult {
        let criteria = &context.criteria;
        let mut results = Vec::new();

        for snapshot in &context.snapshots {
            for pattern in &criteria.patterns_to_eliminate {
                results.push(check_elimination(pattern, snapshot));
            }
        }

        for snapshot in &context.snapshots {
            for pattern in &criteria.patterns_to_introduce {
                results.push(check_introduction(pattern, snapshot));
            }
        }

        let mut diagnostic_errors = Vec::new();
        if let (true, Some(provider)) = (self.options.check_diagnostics, diagnostics) {
            match collect_diagnostics(provider, &context.snapshots).await {
                Ok(errors) => {
                    results.push(diagnostics_result(&errors));
                    diagnostic_errors = errors;
                }
                Err(e) => warn!("Diagnostics unavailable, skipping check: {}", e),
            }
        }

        for snapshot in &context.snapshots {
            results.push(check_file_changed(snapshot));
        }

        if let (true, Some(judge)) = (self.options.use_llm, judge) {
            for snapshot in &context.snapshots {
                let prompt = generate_verification_prompt(
                    criteria,
                    &snapshot.before_content,
                    &snapshot.after_content,
                    self.capabilities.as_ref(),
                );
                match judge.judge(&prompt).await {
                    Ok(response) => results.push(judge_result(&parse_llm_response(&response))),
                    Err(e) => warn!(
                        path = %snapshot.path.display(),
                        "LLM judge failed, skipping check: {}", e
                    ),
                }
            }
        }

        let passed_count = results.iter().filter(|r| r.passed).count();
        let confidence = if results.is_empty() {
            0.0
        } else {
            passed_count as f64 / results.len() as f64
        };
        let critical_passed = results.iter().filter(|r| r.critical).all(|r| r.passed);
        let passed = critical_passed && confidence >= self.options.min_confidence;

        info!(
            passed,
            confidence,
            criteria = results.len(),
            attempt = context.attempt,
            "Verification complete"
        );

        VerificationResult {
            passed,
            confidence,
            summary: summarize(passed, confidence, &results),
            suggestions: suggestions(&results),
            criteria_results: results,
            diagnostic_errors,
        }
    }
}

async fn collect_diagnostics(
    provider: &dyn DiagnosticsProvider,
    snapshots: &[FileSnapshot],
) -> Result<Vec<String>> {
    let mut errors = Vec::new();
    for snapshot in snapshots {
        errors.extend(provider.errors(&snapshot.path).await?);
    }
    Ok(errors)
}

fn evidence_line(index: usize, line: &str) -> String {
    let fragment: String = line.trim().chars().take(EVIDENCE_CHARS).collect();
    format!("Line {}: {}", index + 1, fragment)
}

/// Lines of `content` matched by any of `matchers`, one entry per match.
fn matching_lines(matchers: &[Regex], content: &str, limit: usize) -> Vec<String> {
    let mut evidence = Vec::new();
    for re in matchers {
        for (index, line) in content.lines().enumerate() {
            if evidence.len() >= limit {
                return evidence;
            }
            if re.is_match(line) {
                evidence.push(evidence_line(index, line));
            }
        }
    }
    evidence
}

/// Eliminated when nothing remains or at least 70% of occurrences are gone.
fn is_eliminated(before: usize, after: usize) -> bool {
    after == 0 || after * 10 <= before * 3
}

fn check_elimination(pattern: &PatternCriteria, snapshot: &FileSnapshot) -> CriterionResult {
    let before = pattern.count_matches(&snapshot.before_content);
    let after = pattern.count_matches(&snapshot.after_content);
    let eliminated = is_eliminated(before, after);
    let improvement = if before > 0 {
        ((1.0 - after as f64 / before as f64) * 100.0).round() as i64
    } else {
        100
    };

    debug!(
        pattern = pattern.description,
        before, after, eliminated, "Elimination check"
    );

    CriterionResult {
        name: format!("Eliminate: {}", pattern.description),
        kind: CriterionKind::Eliminate,
        passed: eliminated,
        critical: pattern.critical,
        explanation: if eliminated {
            format!("Successfully eliminated ({} → {})", before, after)
        } else {
            format!(
                "Still present: {} occurrences remain ({}% reduction)",
                after, improvement
            )
        },
        evidence: matching_lines(&pattern.matchers(), &snapshot.after_content, usize::MAX),
    }
}

fn check_introduction(pattern: &PatternCriteria, snapshot: &FileSnapshot) -> CriterionResult {
    let count = pattern.count_matches(&snapshot.after_content);
    let found = count > 0;

    CriterionResult {
        name: format!("Introduce: {}", pattern.description),
        kind: CriterionKind::Introduce,
        passed: found,
        critical: pattern.critical,
        explanation: if found {
            format!("Found {}+ occurrences", count)
        } else {
            "Not found in modified code".to_string()
        },
        evidence: matching_lines(
            &pattern.matchers(),
            &snapshot.after_content,
            INTRODUCE_EVIDENCE_LIMIT,
        ),
    }
}

fn diagnostics_result(errors: &[String]) -> CriterionResult {
    CriterionResult {
        name: DIAGNOSTICS_CRITERION.to_string(),
        kind: CriterionKind::Diagnostics,
        passed: errors.is_empty(),
        critical: false,
        explanation: if errors.is_empty() {
            "No compile/lint errors detected".to_string()
        } else {
            format!("{} errors found", errors.len())
        },
        evidence: errors.iter().take(DIAGNOSTIC_EVIDENCE_LIMIT).cloned().collect(),
    }
}

/// Passes only when the content really differs, whatever the hashes say.
#[must_use]
pub fn check_file_changed(snapshot: &FileSnapshot) -> CriterionResult {
    let hash_changed = snapshot.before_hash != snapshot.after_hash;
    let content_changed = snapshot.before_content != snapshot.after_content;

    CriterionResult {
        name: format!("File modified: {}", snapshot.path.display()),
        kind: CriterionKind::FileChanged,
        passed: hash_changed && content_changed,
        critical: false,
        explanation: if hash_changed {
            "File was modified".to_string()
        } else {
            "File was NOT modified - no changes applied".to_string()
        },
        evidence: Vec::new(),
    }
}

/// Parse the judge's structured answer. Missing fields count as failure.
#[must_use]
pub fn parse_llm_response(response: &str) -> JudgeVerdict {
    let accomplished = Regex::new(r"(?i)ACCOMPLISHED:\s*(YES|NO)")
        .ok()
        .and_then(|re| re.captures(response))
        .and_then(|caps| caps.get(1))
        .is_some_and(|m| m.as_str().eq_ignore_ascii_case("yes"));

    let completion = Regex::new(r"(?i)COMPLETION:\s*(\d+)%")
        .ok()
        .and_then(|re| re.captures(response))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    let remaining_issues = Regex::new(r"(?is)REMAINING_ISSUES:\s*\n(.*?)(?:IMPROVEMENTS_MADE:|$)")
        .ok()
        .and_then(|re| re.captures(response))
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .lines()
                .map(str::trim)
                .filter(|line| line.starts_with('-'))
                .map(|line| line.trim_start_matches('-').trim().to_string())
                .filter(|line| !line.is_empty())
                .collect()
        })
        .unwrap_or_default();

    JudgeVerdict {
        accomplished,
        completion,
        remaining_issues,
    }
}

fn judge_result(verdict: &JudgeVerdict) -> CriterionResult {
    let passed = verdict.accomplished && verdict.completion >= JUDGE_COMPLETION_THRESHOLD;
    CriterionResult {
        name: LLM_CRITERION.to_string(),
        kind: CriterionKind::LlmJudge,
        passed,
        critical: false,
        explanation: if verdict.accomplished {
            format!("{}% complete. Task accomplished.", verdict.completion)
        } else {
            "Task NOT accomplished.".to_string()
        },
        evidence: verdict.remaining_issues.clone(),
    }
}

fn summarize(passed: bool, confidence: f64, results: &[CriterionResult]) -> String {
    let passed_count = results.iter().filter(|r| r.passed).count();
    let percent = (confidence * 100.0).round() as i64;

    if passed {
        return format!(
            "✅ Verification PASSED ({}% confidence)\n{}/{} criteria met",
            percent,
            passed_count,
            results.len()
        );
    }

    let failed = results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| format!("- {}: {}", r.name, r.explanation))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "❌ Verification FAILED ({}% confidence)\n{}/{} criteria met\n\nFailed criteria:\n{}",
        percent,
        passed_count,
        results.len(),
        failed
    )
}

fn suggestions(results: &[CriterionResult]) -> Vec<String> {
    let mut out = Vec::new();
    for result in results.iter().filter(|r| !r.passed) {
        match result.kind {
            CriterionKind::Eliminate => {
                let description = result.name.trim_start_matches("Eliminate: ");
                out.push(format!(
                    "Continue removing: {}. {} instances remain.",
                    description,
                    result.evidence.len()
                ));
            }
            CriterionKind::Introduce => {
                let description = result.name.trim_start_matches("Introduce: ");
                out.push(format!("Add missing pattern: {}", description));
            }
            CriterionKind::Diagnostics => {
                let first: Vec<&str> = result.evidence.iter().take(2).map(String::as_str).collect();
                out.push(format!("Fix compile errors: {}", first.join(", ")));
            }
            CriterionKind::FileChanged => {
                out.push("File was not modified - ensure the edit was actually applied".to_string());
            }
            CriterionKind::LlmJudge => {
                out.extend(result.evidence.iter().map(|e| format!("Address: {}", e)));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDiagnostics, MockJudge};
    use crate::verification::analyzer::TaskAnalyzer;
    use crate::verification::patterns::AntiPatternCategory;

    fn var_lines(n: usize) -> String {
        (0..n).map(|i| format!("var v{} = {};\n", i, i)).collect()
    }

    fn context(instruction: &str, path: &str, before: &str, after: &str) -> VerificationContext {
        let criteria = TaskAnalyzer::new().analyze(instruction, None);
        let mut ctx = VerificationContext::new(instruction, criteria);
        ctx.add_snapshot(FileSnapshot::capture(path, before).complete(after));
        ctx
    }

    fn no_llm() -> VerificationEngine {
        VerificationEngine::new(VerificationOptions {
            use_llm: false,
            ..VerificationOptions::default()
        })
    }

    #[test]
    fn test_content_hash_matches_rolling_checksum() {
        assert_eq!(content_hash(""), "0");
        assert_eq!(content_hash("a"), "61");
        assert_eq!(content_hash("ab"), "c21");
        // Overflows into the sign bit.
        assert_eq!(content_hash("hello"), "5e918d2");
        assert_eq!(content_hash("abcdefg"), "-47e68b9c");
    }

    #[test]
    fn test_elimination_threshold() {
        let var = &AntiPatternCategory::VarUsage.criteria()[0];
        let mostly_gone = FileSnapshot::capture("a.js", var_lines(10)).complete(var_lines(2));
        assert!(check_elimination(var, &mostly_gone).passed);

        let partly_gone = FileSnapshot::capture("a.js", var_lines(10)).complete(var_lines(4));
        let result = check_elimination(var, &partly_gone);
        assert!(!result.passed);
        assert_eq!(
            result.explanation,
            "Still present: 4 occurrences remain (60% reduction)"
        );
        assert_eq!(result.evidence.len(), 4);
        assert_eq!(result.evidence[0], "Line 1: var v0 = 0;");
    }

    #[test]
    fn test_elimination_boundary_is_inclusive() {
        assert!(is_eliminated(10, 3));
        assert!(!is_eliminated(10, 4));
        assert!(is_eliminated(0, 0));
        assert!(!is_eliminated(0, 1));
    }

    #[test]
    fn test_file_changed_requires_different_content() {
        let same = FileSnapshot::capture("a.ts", "const a = 1;").complete("const a = 1;");
        let result = check_file_changed(&same);
        assert!(!result.passed);
        assert_eq!(result.explanation, "File was NOT modified - no changes applied");

        // Equal hashes with different content still fail.
        let mut forged = FileSnapshot::capture("a.ts", "x").complete("y");
        forged.after_hash = forged.before_hash.clone();
        assert!(!check_file_changed(&forged).passed);

        let changed = FileSnapshot::capture("a.ts", "x").complete("y");
        assert!(check_file_changed(&changed).passed);
    }

    #[test]
    fn test_parse_llm_response() {
        let verdict = parse_llm_response(
            "ACCOMPLISHED: YES\nCOMPLETION: 85%\nREMAINING_ISSUES:\n- one callback left\n- \nIMPROVEMENTS_MADE:\n- async added\n",
        );
        assert!(verdict.accomplished);
        assert_eq!(verdict.completion, 85);
        assert_eq!(verdict.remaining_issues, vec!["one callback left".to_string()]);
        assert!(judge_result(&verdict).passed);

        let low = parse_llm_response("accomplished: yes\ncompletion: 50%");
        assert!(!judge_result(&low).passed);
        assert_eq!(judge_result(&low).explanation, "50% complete. Task accomplished.");

        let garbage = parse_llm_response("no idea");
        assert!(!garbage.accomplished);
        assert_eq!(garbage.completion, 0);
    }

    #[tokio::test]
    async fn test_verify_passes_clean_refactor() {
        let ctx = context(
            "replace var with const",
            "a.js",
            &var_lines(3),
            "const a = 1;\nconst b = 2;\n",
        );
        let result = no_llm().verify(&ctx, None, None).await;
        assert!(result.passed);
        assert_eq!(result.confidence, 1.0);
        assert!(result.summary.starts_with("✅ Verification PASSED (100% confidence)"));
        assert!(result.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_verify_fails_on_critical_pattern() {
        let ctx = context("replace var with const", "a.js", &var_lines(3), &var_lines(3));
        let result = no_llm().verify(&ctx, None, None).await;
        assert!(!result.passed);
        assert_eq!(result.passed_count(), 0);
        assert!(result.summary.contains("Failed criteria:\n- Eliminate: var keyword"));
        assert_eq!(
            result.suggestions,
            vec![
                "Continue removing: var keyword (should use let/const). 3 instances remain."
                    .to_string(),
                "File was not modified - ensure the edit was actually applied".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_verify_with_diagnostics() {
        let ctx = context("hello", "a.ts", "a", "b");
        let diagnostics = MockDiagnostics::new().with_errors(["TS2304: x", "TS2345: y", "TS1005: z"]);
        let result = no_llm().verify(&ctx, Some(&diagnostics), None).await;

        assert_eq!(result.diagnostic_errors.len(), 3);
        assert!(!result.passed);
        assert!(result
            .suggestions
            .contains(&"Fix compile errors: TS2304: x, TS2345: y".to_string()));
    }

    #[tokio::test]
    async fn test_verify_skips_failing_collaborators() {
        let ctx = context("hello", "a.ts", "a", "b");
        let diagnostics = MockDiagnostics::new().with_failure("server down");
        let judge = MockJudge::failing("offline");
        let result = VerificationEngine::default()
            .verify(&ctx, Some(&diagnostics), Some(&judge))
            .await;

        assert_eq!(result.criteria_results.len(), 1);
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_verify_with_judge() {
        let ctx = context("hello", "a.ts", "a", "b");
        let judge = MockJudge::new(
            "ACCOMPLISHED: NO\nCOMPLETION: 40%\nREMAINING_ISSUES:\n- handle errors\nIMPROVEMENTS_MADE:\n",
        );
        let result = VerificationEngine::default().verify(&ctx, None, Some(&judge)).await;

        assert_eq!(judge.prompts().len(), 1);
        assert!(judge.prompts()[0].contains("## Code AFTER:\n```\nb\n```"));
        assert!(!result.passed);
        assert_eq!(result.confidence, 0.5);
        assert!(result.suggestions.contains(&"Address: handle errors".to_string()));
    }

    #[tokio::test]
    async fn test_verify_without_snapshots() {
        let criteria = TaskAnalyzer::new().analyze("hello", None);
        let ctx = VerificationContext::new("hello", criteria);
        let result = no_llm().verify(&ctx, None, None).await;
        assert!(!result.passed);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_add_snapshot_replaces_same_path() {
        let criteria = TaskAnalyzer::new().analyze("hello", None);
        let mut ctx = VerificationContext::new("hello", criteria);
        ctx.add_snapshot(FileSnapshot::capture("a.ts", "1").complete("2"));
        ctx.add_snapshot(FileSnapshot::capture("a.ts", "1").complete("3"));
        assert_eq!(ctx.snapshots.len(), 1);
        assert_eq!(ctx.snapshots[0].after_content, "3");
    }
}
