//! Instruction analysis: what a successful change has to look like.

use crate::llm::{smart_truncate, ContentKind, ModelCapabilities};
use crate::verification::patterns::{
    detect_anti_patterns, AntiPatternCategory, PatternCriteria, PositivePatternCategory,
};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Code budget used in the judge prompt when no capabilities are known.
const DEFAULT_PROMPT_CODE_CHARS: usize = 3000;

/// Broad kind of change an instruction asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Refactor,
    BugFix,
    FeatureAdd,
    Optimization,
    Cleanup,
    Unknown,
}

impl TaskType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Refactor => "refactor",
            Self::BugFix => "bug_fix",
            Self::FeatureAdd => "feature_add",
            Self::Optimization => "optimization",
            Self::Cleanup => "cleanup",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered: the first task type with a keyword hit wins.
const TASK_TYPE_KEYWORDS: &[(TaskType, &[&str])] = &[
    (
        TaskType::Refactor,
        &[
            "refactor",
            "rewrite",
            "convert",
            "modernize",
            "clean up",
            "restructure",
            "callback hell",
            "async/await",
            "promise",
        ],
    ),
    (
        TaskType::BugFix,
        &[
            "fix",
            "bug",
            "error",
            "issue",
            "broken",
            "doesn't work",
            "not working",
            "crash",
            "exception",
            "undefined",
            "null",
        ],
    ),
    (
        TaskType::FeatureAdd,
        &[
            "add",
            "create",
            "implement",
            "new feature",
            "build",
            "develop",
            "introduce",
        ],
    ),
    (
        TaskType::Optimization,
        &[
            "optimize",
            "performance",
            "speed up",
            "faster",
            "efficient",
            "memory",
            "reduce",
        ],
    ),
    (
        TaskType::Cleanup,
        &[
            "remove",
            "delete",
            "clean",
            "unused",
            "dead code",
            "lint",
            "format",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralChangeKind {
    FunctionSignature,
    ImportAdded,
    ExportAdded,
    ClassModified,
}

/// A shape-level change expected in the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralChange {
    pub kind: StructuralChangeKind,
    pub description: String,
    pub indicator: String,
}

/// Everything verification checks for one instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessCriteria {
    pub task_type: TaskType,
    pub patterns_to_eliminate: Vec<PatternCriteria>,
    pub patterns_to_introduce: Vec<PatternCriteria>,
    pub structural_changes: Vec<StructuralChange>,
    pub errors_to_fix: Vec<String>,
    pub success_description: String,
}

impl SuccessCriteria {
    /// Whether a criterion with this description must pass.
    #[must_use]
    pub fn is_critical(&self, description: &str) -> bool {
        self.patterns_to_eliminate
            .iter()
            .chain(&self.patterns_to_introduce)
            .any(|p| p.critical && p.description == description)
    }
}

/// Derives [`SuccessCriteria`] from a natural-language instruction.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskAnalyzer;

impl TaskAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Analyze `instruction`, optionally against the file it targets.
    #[must_use]
    pub fn analyze(&self, instruction: &str, file_content: Option<&str>) -> SuccessCriteria {
        let lower = instruction.to_lowercase();

        let task_type = detect_task_type(&lower);
        let patterns_to_eliminate = patterns_to_eliminate(&lower, file_content);
        let patterns_to_introduce = patterns_to_introduce(&lower);
        let structural_changes = structural_changes(&lower);
        let errors_to_fix = extract_errors(instruction);

        debug!(
            task_type = %task_type,
            eliminate = patterns_to_eliminate.len(),
            introduce = patterns_to_introduce.len(),
            "Analyzed instruction"
        );

        let success_description = describe(
            instruction,
            task_type,
            &patterns_to_eliminate,
            &patterns_to_introduce,
        );

        SuccessCriteria {
            task_type,
            patterns_to_eliminate,
            patterns_to_introduce,
            structural_changes,
            errors_to_fix,
            success_description,
        }
    }
}

fn detect_task_type(lower: &str) -> TaskType {
    TASK_TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map_or(TaskType::Unknown, |(task_type, _)| *task_type)
}

fn patterns_to_eliminate(lower: &str, file_content: Option<&str>) -> Vec<PatternCriteria> {
    let has = |word: &str| lower.contains(word);
    let mut selected: Vec<PatternCriteria> = Vec::new();

    let mut take = |category: AntiPatternCategory| {
        selected.extend(category.criteria().iter().cloned());
    };
    if has("callback") || has("pyramid") || has("nested") {
        take(AntiPatternCategory::CallbackHell);
    }
    if has("promise") && has("chain") {
        take(AntiPatternCategory::PromiseChain);
    }
    if has("var") || has("let") || has("const") {
        take(AntiPatternCategory::VarUsage);
    }
    if has("any") || has("type") {
        take(AntiPatternCategory::AnyType);
    }

    if let Some(content) = file_content {
        for found in detect_anti_patterns(content) {
            if !selected.iter().any(|p| p.description == found.description) {
                selected.push(found);
            }
        }
    }
    selected
}

fn patterns_to_introduce(lower: &str) -> Vec<PatternCriteria> {
    let has = |word: &str| lower.contains(word);
    let mut selected = Vec::new();

    if has("async") || has("await") || has("callback") {
        selected.extend(PositivePatternCategory::AsyncAwait.criteria().iter().cloned());
    }
    if has("parallel") || has("concurrent") {
        selected.extend(PositivePatternCategory::PromiseAll.criteria().iter().cloned());
    }
    if has("error handling") || has("try") || has("catch") {
        selected.extend(PositivePatternCategory::TryCatch.criteria().iter().cloned());
    }
    if has("type") && !has("remove") {
        selected.extend(
            PositivePatternCategory::TypeAnnotations
                .criteria()
                .iter()
                .cloned(),
        );
    }
    selected
}

fn structural_changes(lower: &str) -> Vec<StructuralChange> {
    let mut changes = Vec::new();
    if lower.contains("async") || lower.contains("callback") {
        changes.push(StructuralChange {
            kind: StructuralChangeKind::FunctionSignature,
            description: "Convert callback-based functions to async functions".to_string(),
            indicator: "async function".to_string(),
        });
    }
    if lower.contains("fs") || lower.contains("promise") {
        changes.push(StructuralChange {
            kind: StructuralChangeKind::ImportAdded,
            description: "Add promise-based imports".to_string(),
            indicator: "fs/promises".to_string(),
        });
    }
    changes
}

/// Quoted error messages and TypeScript error codes named in the instruction.
fn extract_errors(instruction: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if let Ok(quoted) = Regex::new(r#"(?i)"([^"]+error[^"]+)""#) {
        errors.extend(
            quoted
                .captures_iter(instruction)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        );
    }
    if let Ok(codes) = Regex::new(r"TS\d{4}") {
        errors.extend(codes.find_iter(instruction).map(|m| m.as_str().to_string()));
    }
    errors
}

fn describe(
    instruction: &str,
    task_type: TaskType,
    eliminate: &[PatternCriteria],
    introduce: &[PatternCriteria],
) -> String {
    let mut parts = vec![format!("Task type: {}", task_type)];
    if !eliminate.is_empty() {
        parts.push(format!("Should eliminate: {}", join_descriptions(eliminate)));
    }
    if !introduce.is_empty() {
        parts.push(format!("Should introduce: {}", join_descriptions(introduce)));
    }
    parts.push(format!("Original instruction: \"{}\"", instruction));
    parts.join("\n")
}

fn join_descriptions(patterns: &[PatternCriteria]) -> String {
    patterns
        .iter()
        .map(|p| p.description)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rubric prompt for an LLM judge comparing the two versions of a file.
#[must_use]
pub fn generate_verification_prompt(
    criteria: &SuccessCriteria,
    before: &str,
    after: &str,
    capabilities: Option<&ModelCapabilities>,
) -> String {
    let limit = capabilities.map_or(DEFAULT_PROMPT_CODE_CHARS, |caps| caps.content_limit(ContentKind::Context));

    let eliminated = criteria
        .patterns_to_eliminate
        .iter()
        .map(|p| format!("- [ ] ELIMINATED: {}", p.description))
        .collect::<Vec<_>>()
        .join("\n");
    let introduced = criteria
        .patterns_to_introduce
        .iter()
        .map(|p| format!("- [ ] INTRODUCED: {}", p.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are verifying if a code change successfully accomplished its goal.

## Original Task
{description}

## Code BEFORE:
```
{before}
```

## Code AFTER:
```
{after}
```

## Verification Checklist
{eliminated}
{introduced}

## Your Analysis
1. Did the change accomplish the goal? (YES/NO)
2. What percentage complete is the fix? (0-100%)
3. What specific issues remain unfixed?
4. What specific improvements were made?

Respond in this exact format:
ACCOMPLISHED: [YES/NO]
COMPLETION: [0-100]%
REMAINING_ISSUES:
- [issue 1]
- [issue 2]
IMPROVEMENTS_MADE:
- [improvement 1]
- [improvement 2]
SUGGESTIONS:
- [suggestion for completing the task]"#,
        description = criteria.success_description,
        before = smart_truncate(before, limit, 0.3),
        after = smart_truncate(after, limit, 0.3),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::patterns::PatternCategory;

    fn categories(patterns: &[PatternCriteria]) -> Vec<PatternCategory> {
        patterns.iter().map(|p| p.category).collect()
    }

    #[test]
    fn test_callback_and_nested_selects_callback_hell() {
        let criteria =
            TaskAnalyzer::new().analyze("Flatten the nested callback pyramid in loader", None);
        assert!(categories(&criteria.patterns_to_eliminate)
            .contains(&PatternCategory::Anti(AntiPatternCategory::CallbackHell)));
        assert!(categories(&criteria.patterns_to_introduce)
            .contains(&PatternCategory::Positive(PositivePatternCategory::AsyncAwait)));
    }

    #[test]
    fn test_task_type_first_match_wins() {
        let analyzer = TaskAnalyzer::new();
        // "refactor" outranks "fix"
        assert_eq!(
            analyzer.analyze("refactor and fix the parser", None).task_type,
            TaskType::Refactor
        );
        assert_eq!(analyzer.analyze("fix the crash", None).task_type, TaskType::BugFix);
        assert_eq!(
            analyzer.analyze("implement login", None).task_type,
            TaskType::FeatureAdd
        );
        assert_eq!(
            analyzer.analyze("make it faster", None).task_type,
            TaskType::Optimization
        );
        assert_eq!(analyzer.analyze("hello", None).task_type, TaskType::Unknown);
    }

    #[test]
    fn test_file_content_adds_detected_patterns_once() {
        let code = "var a = 1;\nconsole.log(a);\n";
        let criteria = TaskAnalyzer::new().analyze("replace var with const", Some(code));
        let cats = categories(&criteria.patterns_to_eliminate);
        assert_eq!(
            cats,
            vec![
                PatternCategory::Anti(AntiPatternCategory::VarUsage),
                PatternCategory::Anti(AntiPatternCategory::ConsoleLog),
            ]
        );
    }

    #[test]
    fn test_type_request_without_remove() {
        let analyzer = TaskAnalyzer::new();
        let add = analyzer.analyze("add type annotations", None);
        assert!(categories(&add.patterns_to_introduce).contains(&PatternCategory::Positive(
            PositivePatternCategory::TypeAnnotations
        )));

        let remove = analyzer.analyze("remove type casts", None);
        assert!(remove.patterns_to_introduce.is_empty());
    }

    #[test]
    fn test_structural_changes() {
        let criteria = TaskAnalyzer::new().analyze("convert fs callbacks to async", None);
        let kinds: Vec<_> = criteria.structural_changes.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StructuralChangeKind::FunctionSignature,
                StructuralChangeKind::ImportAdded
            ]
        );
        assert_eq!(criteria.structural_changes[0].indicator, "async function");
    }

    #[test]
    fn test_extract_errors() {
        let criteria = TaskAnalyzer::new().analyze(
            r#"fix "TypeError: x is undefined" and TS2304 in app"#,
            None,
        );
        assert_eq!(
            criteria.errors_to_fix,
            vec!["TypeError: x is undefined".to_string(), "TS2304".to_string()]
        );
    }

    #[test]
    fn test_success_description() {
        let criteria = TaskAnalyzer::new().analyze("hello", None);
        assert_eq!(
            criteria.success_description,
            "Task type: unknown\nOriginal instruction: \"hello\""
        );
    }

    #[test]
    fn test_is_critical() {
        let criteria = TaskAnalyzer::new().analyze("untangle callback code", None);
        assert!(criteria.is_critical("Deeply nested callbacks (3+ levels)"));
        assert!(!criteria.is_critical("Callback-style error handling"));
    }

    #[test]
    fn test_verification_prompt_layout() {
        let criteria = TaskAnalyzer::new().analyze("remove var declarations", None);
        let prompt = generate_verification_prompt(&criteria, "var a = 1;", "const a = 1;", None);
        assert!(prompt.contains("## Code BEFORE:\n```\nvar a = 1;\n```"));
        assert!(prompt.contains("## Code AFTER:\n```\nconst a = 1;\n```"));
        assert!(prompt.contains("- [ ] ELIMINATED: var keyword (should use let/const)"));
        assert!(prompt.ends_with("- [suggestion for completing the task]"));
    }
}
