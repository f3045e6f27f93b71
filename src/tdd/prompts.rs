//! Prompt builders for the three TDD phases.
//!
//! Each builder dispatches on the framework's [`TestLayout`]: colocated
//! frameworks ask for a single file holding implementation and test module,
//! the rest ask for standalone test and implementation files.

use crate::llm::truncate_content;
use crate::tdd::framework::{TestFramework, TestLayout};

/// What the GREEN prompt knows about earlier attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreenAttempt<'a> {
    First,
    Retry {
        previous_impl: &'a str,
        failure_output: &'a str,
    },
}

/// Character budgets applied to prompt content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
    /// Budget for code pasted into a prompt.
    pub context: usize,
    /// Budget for failing test output.
    pub failure_output: usize,
}

fn fit(content: &str, max: usize) -> String {
    truncate_content(content, max, true)
}

/// Ask for a failing test.
#[must_use]
pub fn red_prompt(framework: TestFramework, requirement: &str) -> String {
    match framework.layout() {
        TestLayout::Colocated => format!(
            r#"You are a TDD expert. Write a failing unit test for the following Rust requirement.

Requirement: {requirement}

Guidelines:
1. Write a unit test inside a #[cfg(test)] mod tests block
2. The test should call a function that doesn't exist yet
3. Include the use super::*; import
4. Use descriptive test names with #[test] attribute
5. Write properly formatted code with correct indentation

Example structure:
#[cfg(test)]
mod tests {{
    use super::*;

    #[test]
    fn test_something() {{
        let result = function_to_implement();
        assert_eq!(result, expected_value);
    }}
}}

IMPORTANT: Respond with ONLY the test module code. Do NOT include the implementation. Do NOT wrap in markdown code blocks."#
        ),
        TestLayout::SeparateFile => format!(
            r#"You are a TDD expert. Write a failing test case for the following requirement.

Framework: {name}
Language: {language}
Requirement: {requirement}

Guidelines:
1. Start with the simplest test case
2. Use descriptive test names
3. Follow {name} conventions
4. Include assertions that will initially fail (because the implementation doesn't exist yet)
5. Write properly formatted code with correct indentation and newlines

IMPORTANT: Respond with ONLY the raw test code. Do NOT wrap it in markdown code blocks. Do NOT include any explanation or commentary."#,
            name = framework.name(),
            language = framework.language(),
        ),
    }
}

/// Ask for the minimal implementation, or a fix of the previous one.
#[must_use]
pub fn green_prompt(
    framework: TestFramework,
    test_code: &str,
    attempt: GreenAttempt<'_>,
    limits: PromptLimits,
) -> String {
    let lang = framework.language();
    let test_code = fit(test_code, limits.context);

    match (framework.layout(), attempt) {
        (TestLayout::Colocated, GreenAttempt::First) => format!(
            r#"Write the MINIMAL Rust implementation to make this test pass, then include the test at the bottom.

Test code:
```rust
{test_code}
```

Requirements:
1. Write a public function that the test calls
2. Keep it simple - minimal code only
3. Include the test module at the bottom with #[cfg(test)]

IMPORTANT: Respond with ONLY the complete Rust file (implementation + test). Do NOT wrap in markdown code blocks."#
        ),
        (
            TestLayout::Colocated,
            GreenAttempt::Retry {
                previous_impl,
                failure_output,
            },
        ) => format!(
            r#"The previous implementation failed. Fix the code to make the test pass.

Previous code:
```rust
{previous}
```

Test output (failure):
```
{failure}
```

Fix the implementation. The file should contain:
1. The implementation function(s) at the top
2. The test module at the bottom with #[cfg(test)]

IMPORTANT: Respond with ONLY the complete fixed Rust file. Do NOT wrap in markdown code blocks."#,
            previous = fit(previous_impl, limits.context),
            failure = fit(failure_output, limits.failure_output),
        ),
        (TestLayout::SeparateFile, GreenAttempt::First) => format!(
            r#"Write the MINIMAL implementation code to make this test pass. No extra features, just enough to pass the test.

Test code:
```{lang}
{test_code}
```

Guidelines:
1. Keep it simple - minimal code only
2. Don't anticipate future requirements
3. Focus on making the test green
4. Write properly formatted code with correct indentation and newlines

IMPORTANT: Respond with ONLY the raw implementation code. Do NOT wrap it in markdown code blocks. Do NOT include any explanation."#
        ),
        (
            TestLayout::SeparateFile,
            GreenAttempt::Retry {
                previous_impl,
                failure_output,
            },
        ) => format!(
            r#"The previous implementation failed. Fix the code to make this test pass.

Test code:
```{lang}
{test_code}
```

Previous implementation:
```{lang}
{previous}
```

Test output (failure):
```
{failure}
```

Fix the implementation to make the test pass.
IMPORTANT: Respond with ONLY the complete fixed implementation code. Do NOT wrap it in markdown code blocks. Do NOT include any explanation."#,
            previous = fit(previous_impl, limits.context),
            failure = fit(failure_output, limits.failure_output),
        ),
    }
}

/// Ask for refactoring suggestions over the final test and implementation.
#[must_use]
pub fn refactor_prompt(
    framework: TestFramework,
    test_code: &str,
    impl_code: &str,
    context_limit: usize,
) -> String {
    format!(
        r#"Review this implementation and suggest refactoring improvements while keeping tests passing.

Test:
```{lang}
{test}
```

Implementation:
```{lang}
{implementation}
```

Suggest improvements for:
1. Code clarity
2. Naming
3. Duplication removal
4. Design patterns (if applicable)

Be concise."#,
        lang = framework.language(),
        test = fit(test_code, context_limit),
        implementation = fit(impl_code, context_limit),
    )
}
