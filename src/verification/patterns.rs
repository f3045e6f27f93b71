//! Catalogue of code shapes a refactor should remove or introduce.
//!
//! Categories are closed enumerations. Each one owns its criteria: a
//! description, the regexes that recognise it and whether failing to
//! remove (or add) it fails verification outright.

use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Undesirable code shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiPatternCategory {
    CallbackHell,
    PromiseChain,
    VarUsage,
    AnyType,
    ConsoleLog,
}

/// Desirable code shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositivePatternCategory {
    AsyncAwait,
    PromiseAll,
    TryCatch,
    TypeAnnotations,
}

/// Either side of the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PatternCategory {
    Anti(AntiPatternCategory),
    Positive(PositivePatternCategory),
}

/// One checkable pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternCriteria {
    pub category: PatternCategory,
    pub description: &'static str,
    pub patterns: &'static [&'static str],
    pub critical: bool,
}

impl PatternCriteria {
    const fn anti(
        category: AntiPatternCategory,
        description: &'static str,
        patterns: &'static [&'static str],
        critical: bool,
    ) -> Self {
        Self {
            category: PatternCategory::Anti(category),
            description,
            patterns,
            critical,
        }
    }

    const fn positive(
        category: PositivePatternCategory,
        description: &'static str,
        patterns: &'static [&'static str],
        critical: bool,
    ) -> Self {
        Self {
            category: PatternCategory::Positive(category),
            description,
            patterns,
            critical,
        }
    }

    /// Compiled matchers. Patterns that fail to compile are skipped.
    #[must_use]
    pub fn matchers(&self) -> Vec<Regex> {
        self.patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    }

    /// Total non-overlapping matches across all matchers.
    #[must_use]
    pub fn count_matches(&self, content: &str) -> usize {
        self.matchers()
            .iter()
            .map(|re| re.find_iter(content).count())
            .sum()
    }

    /// Whether any matcher hits `content`.
    #[must_use]
    pub fn is_present(&self, content: &str) -> bool {
        self.matchers().iter().any(|re| re.is_match(content))
    }
}

const CALLBACK_HELL: &[PatternCriteria] = &[
    PatternCriteria::anti(
        AntiPatternCategory::CallbackHell,
        "Deeply nested callbacks (3+ levels)",
        &[
            r"\)\s*=>\s*\{[^}]*\)\s*=>\s*\{[^}]*\)\s*=>\s*\{",
            r"function\s*\([^)]*\)\s*\{[^}]*function\s*\([^)]*\)\s*\{[^}]*function",
            r",\s*\(err,?\s*\w*\)\s*=>",
            r",\s*function\s*\(err",
        ],
        true,
    ),
    PatternCriteria::anti(
        AntiPatternCategory::CallbackHell,
        "Callback-style error handling",
        &[r"if\s*\(err\)\s*return\s*callback", r"callback\(err"],
        false,
    ),
];

const PROMISE_CHAIN: &[PatternCriteria] = &[PatternCriteria::anti(
    AntiPatternCategory::PromiseChain,
    "Long .then() chains (3+ levels)",
    &[r"\.then\([^)]+\)\.then\([^)]+\)\.then"],
    true,
)];

const VAR_USAGE: &[PatternCriteria] = &[PatternCriteria::anti(
    AntiPatternCategory::VarUsage,
    "var keyword (should use let/const)",
    &[r"\bvar\s+\w+"],
    true,
)];

const ANY_TYPE: &[PatternCriteria] = &[PatternCriteria::anti(
    AntiPatternCategory::AnyType,
    "TypeScript any type",
    &[r":\s*any\b", r"<any>", r"as\s+any"],
    true,
)];

const CONSOLE_LOG: &[PatternCriteria] = &[PatternCriteria::anti(
    AntiPatternCategory::ConsoleLog,
    "console.log statements",
    &[r"console\.log\("],
    false,
)];

const ASYNC_AWAIT: &[PatternCriteria] = &[
    PatternCriteria::positive(
        PositivePatternCategory::AsyncAwait,
        "async function declarations",
        &[r"async\s+function", r"async\s*\(", r"async\s+\w+\s*\("],
        true,
    ),
    PatternCriteria::positive(
        PositivePatternCategory::AsyncAwait,
        "await expressions",
        &[r"await\s+\w+"],
        true,
    ),
];

const PROMISE_ALL: &[PatternCriteria] = &[PatternCriteria::positive(
    PositivePatternCategory::PromiseAll,
    "Promise.all for parallel operations",
    &[r"Promise\.all\(", r"Promise\.allSettled\("],
    false,
)];

const TRY_CATCH: &[PatternCriteria] = &[PatternCriteria::positive(
    PositivePatternCategory::TryCatch,
    "try-catch error handling",
    &[r"try\s*\{[\s\S]*\}\s*catch"],
    false,
)];

// A type name that does not start with `any`, spelled out without lookahead.
const TYPE_ANNOTATIONS: &[PatternCriteria] = &[PatternCriteria::positive(
    PositivePatternCategory::TypeAnnotations,
    "TypeScript type annotations",
    &[r":\s*(?:[^a\W]\w*|a(?:[^n\W]\w*|n(?:[^y\W]\w*)?)?\b)(?:<[^>]+>)?(?:\s*\|\s*\w+)*"],
    false,
)];

impl AntiPatternCategory {
    pub const ALL: [Self; 5] = [
        Self::CallbackHell,
        Self::PromiseChain,
        Self::VarUsage,
        Self::AnyType,
        Self::ConsoleLog,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallbackHell => "callback_hell",
            Self::PromiseChain => "promise_chain",
            Self::VarUsage => "var_usage",
            Self::AnyType => "any_type",
            Self::ConsoleLog => "console_log",
        }
    }

    #[must_use]
    pub fn criteria(self) -> &'static [PatternCriteria] {
        match self {
            Self::CallbackHell => CALLBACK_HELL,
            Self::PromiseChain => PROMISE_CHAIN,
            Self::VarUsage => VAR_USAGE,
            Self::AnyType => ANY_TYPE,
            Self::ConsoleLog => CONSOLE_LOG,
        }
    }
}

impl PositivePatternCategory {
    pub const ALL: [Self; 4] = [
        Self::AsyncAwait,
        Self::PromiseAll,
        Self::TryCatch,
        Self::TypeAnnotations,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AsyncAwait => "async_await",
            Self::PromiseAll => "promise_all",
            Self::TryCatch => "try_catch",
            Self::TypeAnnotations => "type_annotations",
        }
    }

    #[must_use]
    pub fn criteria(self) -> &'static [PatternCriteria] {
        match self {
            Self::AsyncAwait => ASYNC_AWAIT,
            Self::PromiseAll => PROMISE_ALL,
            Self::TryCatch => TRY_CATCH,
            Self::TypeAnnotations => TYPE_ANNOTATIONS,
        }
    }
}

impl fmt::Display for AntiPatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PositivePatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every anti-pattern present in `content`, in catalogue order.
#[must_use]
pub fn detect_anti_patterns(content: &str) -> Vec<PatternCriteria> {
    AntiPatternCategory::ALL
        .iter()
        .flat_map(|category| category.criteria())
        .filter(|criteria| criteria.is_present(content))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pattern_compiles() {
        let anti = AntiPatternCategory::ALL.iter().flat_map(|c| c.criteria());
        let positive = PositivePatternCategory::ALL.iter().flat_map(|c| c.criteria());
        for criteria in anti.chain(positive) {
            assert_eq!(
                criteria.matchers().len(),
                criteria.patterns.len(),
                "{}",
                criteria.description
            );
        }
    }

    #[test]
    fn test_count_matches_sums_patterns() {
        let any = &AntiPatternCategory::AnyType.criteria()[0];
        assert_eq!(any.count_matches("let a: any = b as any;"), 2);
        assert_eq!(any.count_matches("let a: number = 1;"), 0);
    }

    #[test]
    fn test_var_usage() {
        let var = &AntiPatternCategory::VarUsage.criteria()[0];
        assert!(var.is_present("var x = 1;"));
        assert!(!var.is_present("const variable = 1;"));
    }

    #[test]
    fn test_type_annotations_skip_any() {
        let types = &PositivePatternCategory::TypeAnnotations.criteria()[0];
        assert!(types.is_present("function f(x: string) {}"));
        assert!(types.is_present("let xs: Array<number> = [];"));
        assert!(types.is_present("let a: and = 1;"));
        assert!(types.is_present("function f(x: a) {}"));
        assert!(!types.is_present("let a: any = 1;"));
        assert!(!types.is_present("let a: anything = 1;"));
        assert!(!types.is_present("let a: anyFoo = 1;"));
    }

    #[test]
    fn test_try_catch_spans_lines() {
        let try_catch = &PositivePatternCategory::TryCatch.criteria()[0];
        assert!(try_catch.is_present("try {\n  await f();\n} catch (e) {}"));
    }

    #[test]
    fn test_detect_anti_patterns_in_order() {
        let code = "var a = 1;\nconsole.log(a);\n";
        let found: Vec<_> = detect_anti_patterns(code)
            .into_iter()
            .map(|c| c.category)
            .collect();
        assert_eq!(
            found,
            vec![
                PatternCategory::Anti(AntiPatternCategory::VarUsage),
                PatternCategory::Anti(AntiPatternCategory::ConsoleLog),
            ]
        );
    }

    #[test]
    fn test_category_names() {
        assert_eq!(AntiPatternCategory::CallbackHell.to_string(), "callback_hell");
        assert_eq!(PositivePatternCategory::TryCatch.as_str(), "try_catch");
    }
}
