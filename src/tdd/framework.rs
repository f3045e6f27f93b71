//! Test framework detection and per-framework file conventions.
//!
//! Detection order, first match wins:
//!
//! 1. config files in the project root
//! 2. a `test` script in `package.json`
//! 3. language keywords in the user's request
//! 4. extension, then content, of the file the user has open
//! 5. Jest
//!
//! Detection reads everything through the [`Host`]; read failures count as "absent".

use crate::host::{FileCache, Host};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source language a framework tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Python,
    Rust,
    Go,
}

impl Language {
    /// Lowercase name, also used as the markdown fence tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where tests live relative to the code under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestLayout {
    /// Implementation and test module share one file, which is registered
    /// with the crate root.
    Colocated,
    /// Tests sit in their own file next to a separate implementation file.
    SeparateFile,
}

/// Supported test frameworks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestFramework {
    Jest,
    /// Jest chosen because nothing else matched.
    JestDefault,
    /// A `package.json` test script of unknown flavour.
    NpmScript,
    Vitest,
    Pytest,
    CargoTest,
    GoTest,
}

/// Serializable view of a [`TestFramework`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkDescriptor {
    pub name: &'static str,
    pub command: &'static str,
    pub language: Language,
    pub test_pattern: &'static str,
    pub layout: TestLayout,
}

/// Config files that identify a framework, checked in this order.
const CONFIG_FILES: &[(&[&str], TestFramework)] = &[
    (
        &["jest.config.js", "jest.config.ts", "jest.config.json"],
        TestFramework::Jest,
    ),
    (&["vitest.config.ts", "vitest.config.js"], TestFramework::Vitest),
    (
        &["pytest.ini", "pyproject.toml", "setup.py"],
        TestFramework::Pytest,
    ),
    (&["Cargo.toml"], TestFramework::CargoTest),
    (&["go.mod"], TestFramework::GoTest),
];

/// Words never used for suggested file names.
const FILENAME_STOP_WORDS: &[&str] = &["test", "write", "create", "make", "function", "that"];

impl TestFramework {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Jest => "Jest",
            Self::JestDefault => "Jest (default)",
            Self::NpmScript => "npm test",
            Self::Vitest => "Vitest",
            Self::Pytest => "pytest",
            Self::CargoTest => "cargo test",
            Self::GoTest => "go test",
        }
    }

    /// Project-wide test command.
    #[must_use]
    pub fn command(&self) -> &'static str {
        match self {
            Self::Jest | Self::JestDefault | Self::NpmScript => "npm test",
            Self::Vitest => "npx vitest",
            Self::Pytest => "pytest",
            Self::CargoTest => "cargo test",
            Self::GoTest => "go test ./...",
        }
    }

    #[must_use]
    pub fn language(&self) -> Language {
        match self {
            Self::Jest | Self::JestDefault | Self::NpmScript | Self::Vitest => Language::TypeScript,
            Self::Pytest => Language::Python,
            Self::CargoTest => Language::Rust,
            Self::GoTest => Language::Go,
        }
    }

    #[must_use]
    pub fn test_pattern(&self) -> &'static str {
        match self.language() {
            Language::TypeScript => "*.test.ts",
            Language::Python => "test_*.py",
            Language::Rust => "*_test.rs",
            Language::Go => "*_test.go",
        }
    }

    #[must_use]
    pub fn layout(&self) -> TestLayout {
        match self {
            Self::CargoTest => TestLayout::Colocated,
            _ => TestLayout::SeparateFile,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> FrameworkDescriptor {
        FrameworkDescriptor {
            name: self.name(),
            command: self.command(),
            language: self.language(),
            test_pattern: self.test_pattern(),
            layout: self.layout(),
        }
    }

    /// Infer a framework from a name printed in an earlier progress stream.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("cargo") || lower.contains("rust") {
            Self::CargoTest
        } else if lower.contains("pytest") || lower.contains("python") {
            Self::Pytest
        } else if lower.contains("go test") || lower.contains("golang") {
            Self::GoTest
        } else if lower.contains("vitest") {
            Self::Vitest
        } else {
            Self::Jest
        }
    }

    /// Framework implied by language keywords in a request.
    fn from_request(request: &str) -> Option<Self> {
        let lower = request.to_lowercase();
        if lower.contains("rust") || lower.contains(".rs") {
            Some(Self::CargoTest)
        } else if lower.contains("python") || lower.contains(".py") {
            Some(Self::Pytest)
        } else if lower.contains("golang") || lower.contains(".go") || lower.contains("go test") {
            Some(Self::GoTest)
        } else {
            None
        }
    }

    /// Framework implied by the open file's extension, then its content.
    fn from_current_file(path: &Path, contents: &str) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => return Some(Self::CargoTest),
            Some("py") => return Some(Self::Pytest),
            Some("go") => return Some(Self::GoTest),
            _ => {}
        }

        let content = contents.to_lowercase();
        if content.contains("fn main") || content.contains("use std::") {
            Some(Self::CargoTest)
        } else if content.contains("def ") || content.contains("import ") {
            Some(Self::Pytest)
        } else if content.contains("package main") || content.contains("func main") {
            Some(Self::GoTest)
        } else {
            None
        }
    }
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `package.json` content declares a non-empty `scripts.test`.
fn has_test_script(package_json: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(package_json)
        .ok()
        .and_then(|pkg| {
            pkg.get("scripts")
                .and_then(|s| s.get("test"))
                .map(|t| match t {
                    serde_json::Value::Null | serde_json::Value::Bool(false) => false,
                    serde_json::Value::String(s) => !s.is_empty(),
                    _ => true,
                })
        })
        .unwrap_or(false)
}

/// Pick the test framework for a project.
pub async fn detect_test_framework(
    host: &dyn Host,
    root: &Path,
    cache: &mut FileCache,
    request: Option<&str>,
) -> TestFramework {
    for (files, framework) in CONFIG_FILES {
        for file in *files {
            if host.file_exists(&root.join(file)).await {
                debug!(file, framework = %framework, "Framework from config file");
                return *framework;
            }
        }
    }

    if let Ok(pkg) = cache.read_file(host, &root.join("package.json")).await {
        if has_test_script(&pkg) {
            debug!("Framework from package.json test script");
            return TestFramework::NpmScript;
        }
    }

    if let Some(framework) = request.and_then(TestFramework::from_request) {
        debug!(framework = %framework, "Framework from request keywords");
        return framework;
    }

    if let Some(current) = host.current_file().await {
        if let Some(framework) = TestFramework::from_current_file(&current.path, &current.contents)
        {
            debug!(framework = %framework, "Framework from current file");
            return framework;
        }
    }

    TestFramework::JestDefault
}

/// Two key words from the request, joined with `_`, or `feature`.
#[must_use]
pub fn suggest_base_name(requirement: &str) -> String {
    let without_code = Regex::new(r"(?s)```.*?```")
        .map(|re| re.replace_all(requirement, "").into_owned())
        .unwrap_or_else(|_| requirement.to_string());

    let cleaned: String = without_code
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();

    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| w.len() > 3 && !FILENAME_STOP_WORDS.contains(w))
        .take(2)
        .collect();

    if words.is_empty() {
        "feature".to_string()
    } else {
        words.join("_")
    }
}

/// Suggested path of the test file, relative to the project root.
#[must_use]
pub fn suggest_test_filename(requirement: &str, framework: TestFramework) -> String {
    let base = suggest_base_name(requirement);
    match framework.language() {
        Language::Python => format!("tests/test_{}.py", base),
        Language::Rust => format!("src/tdd_{}.rs", base),
        Language::Go => format!("{}_test.go", base),
        Language::TypeScript => format!("__tests__/{}.test.ts", base.replace('_', "-")),
    }
}

/// Suggested path of the implementation file, relative to the project root.
#[must_use]
pub fn suggest_impl_filename(requirement: &str, framework: TestFramework) -> String {
    let base = suggest_base_name(requirement);
    match framework.language() {
        Language::Python => format!("src/{}.py", base),
        Language::Rust => format!("src/tdd_{}.rs", base),
        Language::Go => format!("{}.go", base),
        Language::TypeScript => format!("src/{}.ts", base.replace('_', "-")),
    }
}

/// Rust file named in the request, normalised under `src/`.
#[must_use]
pub fn detect_target_file(request: &str) -> Option<String> {
    const PATTERNS: &[&str] = &[
        r"```(\S+\.rs)\b",
        r"@(\S+\.rs)\b",
        r"(?i)(?:fix|edit|update|modify)\s+(\S+\.rs)\b",
        r"(\S+\.rs)\s*\n",
        r"(src/\S+\.rs)\b",
    ];

    let found = PATTERNS.iter().find_map(|p| {
        Regex::new(p)
            .ok()?
            .captures(request)?
            .get(1)
            .map(|m| m.as_str().to_string())
    })?;

    if found.starts_with("src/") {
        Some(found)
    } else {
        Some(format!("src/{}", found))
    }
}

/// Test command scoped to the file under test where the tool allows it.
#[must_use]
pub fn build_test_command(framework: TestFramework, test_file: &str) -> String {
    let path = Path::new(test_file);
    match framework.language() {
        Language::Rust => {
            let module = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(test_file);
            format!("cargo test --lib \"{}::tests::\" -- --nocapture", module)
        }
        Language::Python => format!("pytest {} -v", test_file),
        Language::Go => {
            let dir = path
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| ".".to_string());
            format!("go test -v ./{}/...", dir)
        }
        Language::TypeScript => framework.command().to_string(),
    }
}

/// Module name a colocated test file registers under.
#[must_use]
pub fn module_name(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
        .to_string()
}

/// Append `pub mod <module>;` to `src/lib.rs` unless already declared.
///
/// Returns `true` when the file was changed.
///
/// # Errors
///
/// Returns an error if an existing `src/lib.rs` cannot be read, or if it
/// cannot be written.
pub async fn register_rust_module(
    host: &dyn Host,
    root: &Path,
    module: &str,
) -> anyhow::Result<bool> {
    let lib_path = root.join("src").join("lib.rs");
    let content = if host.file_exists(&lib_path).await {
        host.read_file(&lib_path).await?
    } else {
        String::new()
    };

    let declaration = format!("pub mod {};", module);
    if content.contains(&declaration) || content.contains(&format!("mod {};", module)) {
        return Ok(false);
    }

    let updated = if content.trim().is_empty() {
        format!("{}\n", declaration)
    } else {
        format!("{}\n{}\n", content.trim_end(), declaration)
    };
    host.write_file(&lib_path, &updated).await?;
    debug!(module, "Registered module in src/lib.rs");
    Ok(true)
}

/// Files created (and problems hit) while preparing a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub created: Vec<String>,
    pub errors: Vec<String>,
}

fn sanitize_project_name(name: &str, replacement: char) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                replacement
            }
        })
        .collect::<String>()
        .to_lowercase()
}

/// Files a framework needs before its test command can run.
fn scaffold_files(framework: TestFramework, project_name: &str) -> Vec<(&'static str, String)> {
    match framework.language() {
        Language::Rust => vec![
            (
                "Cargo.toml",
                format!(
                    "[package]\nname = \"{}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[dependencies]\n",
                    sanitize_project_name(project_name, '_')
                ),
            ),
            ("src/lib.rs", "// Library modules\n\n".to_string()),
        ],
        Language::Go => vec![(
            "go.mod",
            format!(
                "module {}\n\ngo 1.21\n",
                sanitize_project_name(project_name, '_')
            ),
        )],
        Language::Python => vec![(
            "pytest.ini",
            "[pytest]\ntestpaths = tests\npython_files = test_*.py\n".to_string(),
        )],
        Language::TypeScript => {
            let vitest = framework == TestFramework::Vitest;
            let dev_dependencies = if vitest {
                serde_json::json!({ "vitest": "^1.0.0" })
            } else {
                serde_json::json!({ "jest": "^29.0.0", "@types/jest": "^29.0.0" })
            };
            let pkg = serde_json::json!({
                "name": sanitize_project_name(project_name, '-'),
                "version": "1.0.0",
                "scripts": { "test": if vitest { "vitest" } else { "jest" } },
                "devDependencies": dev_dependencies,
            });
            let content = serde_json::to_string_pretty(&pkg).unwrap_or_default();
            vec![("package.json", content)]
        }
    }
}

/// Create the build files a framework needs, leaving existing ones alone.
pub async fn setup_project_structure(
    host: &dyn Host,
    root: &Path,
    framework: TestFramework,
    project_name: &str,
) -> SetupReport {
    let mut report = SetupReport::default();

    for (file, content) in scaffold_files(framework, project_name) {
        let path: PathBuf = root.join(file);
        if host.file_exists(&path).await {
            continue;
        }
        match host.write_file(&path, &content).await {
            Ok(()) => report.created.push(file.to_string()),
            Err(e) => report
                .errors
                .push(format!("Failed to setup project: {}", e)),
        }
    }

    report
}
