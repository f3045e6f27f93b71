//! Markdown fragments of the TDD progress stream.
//!
//! Phase headings come from [`crate::tdd::state`] so the text written here is
//! exactly what the state extractor looks for in later turns.

use crate::llm::{truncate_content, ModelCapabilities};
use crate::tdd::framework::TestLayout;
use crate::tdd::state::{
    TddPhase, TddState, COMPLETE_BANNER, GREEN_HEADING, REFACTOR_HEADING, RED_HEADING, TDD_MARKER,
};

/// Longest requirement echoed in the banner before it is cut.
const REQUIREMENT_BANNER_CHARS: usize = 100;

pub fn cycle_header() -> String {
    format!("{} - Automated Red-Green-Refactor Cycle**\n\n", TDD_MARKER)
}

pub fn model_banner(model_name: &str, caps: &ModelCapabilities) -> String {
    let name = if model_name.is_empty() {
        "unknown"
    } else {
        model_name
    };
    format!("_Model: {} | {}_\n\n", name, caps.badge())
}

pub fn requirement_banner(request: &str) -> String {
    let shown = if request.chars().count() > REQUIREMENT_BANNER_CHARS {
        format!("{}...", truncate_content(request, REQUIREMENT_BANNER_CHARS, false))
    } else {
        request.to_string()
    };
    format!("_Requirement: \"{}\"_\n\n", shown)
}

pub fn red_heading() -> String {
    format!("## {} - Writing failing test\n\n", RED_HEADING)
}

pub fn green_heading() -> String {
    format!("## {} - Implementing minimal code\n\n", GREEN_HEADING)
}

pub fn refactor_heading() -> String {
    format!("## {} - Suggesting improvements\n\n", REFACTOR_HEADING)
}

/// Collapsible block with the first `preview_chars` of test output.
pub fn output_block(output: &str, preview_chars: usize) -> String {
    format!(
        "<details>\n<summary>Test Output (click to expand)</summary>\n\n```\n{}\n```\n</details>\n\n",
        truncate_content(output, preview_chars, false)
    )
}

/// One-time advice shown when a local model keeps failing.
pub fn struggling_advisory(threshold: u32, max_iterations: u32) -> String {
    format!(
        "\n---\n\
         ⚠️ **Local Model Struggling**\n\n\
         After {threshold} iterations, tests are still failing. \
         This may indicate the local model lacks the capability to solve this problem.\n\n\
         **Suggestions:**\n\
         - Try a more capable local model (e.g., `qwen2.5-coder:32b`, `deepseek-coder:33b`, `codellama:70b`)\n\
         - Use a cloud model (OpenAI GPT-4, Claude, etc.) for complex tasks\n\
         - Simplify the requirement into smaller steps\n\
         \n_Continuing to try... (will stop at iteration {max_iterations})_\n\n\
         ---\n\n"
    )
}

pub fn repetition_warning(iteration: u32) -> String {
    let mut text = String::from(
        "⚠️ **Repetition Detected:** Model is generating similar code to previous attempts.\n\
         This suggests the model may not understand how to fix the issue.\n\n",
    );
    if iteration >= 3 {
        text.push_str(
            "🛑 **Recommendation:** Try a more capable model or simplify the requirement.\n\n",
        );
    }
    text
}

pub fn exhaustion_report(max_iterations: u32, is_cloud: bool) -> String {
    let mut text = format!(
        "\n---\n⛔ **Max iterations ({}) reached.** Tests still failing.\n\n",
        max_iterations
    );
    if is_cloud {
        text.push_str(
            "You may need to manually fix the implementation based on the test output.\n\
             Consider breaking down the requirement into smaller, simpler steps.\n",
        );
    } else {
        text.push_str(
            "**The local model was unable to solve this problem.**\n\n\
             **Recommended actions:**\n\
             1. **Try a more capable model:**\n   \
             - `qwen2.5-coder:32b` - Better reasoning\n   \
             - `deepseek-coder:33b` - Strong at code\n   \
             - `codellama:70b` - Large context\n   \
             - Cloud models (GPT-4, Claude) for complex tasks\n\n\
             2. **Simplify the requirement** - Break into smaller steps\n\n\
             3. **Check the test** - Ensure it's correct and achievable\n",
        );
    }
    text.push('\n');
    text
}

/// Closing block of a cycle.
pub fn summary(
    passed: bool,
    test_file: &str,
    impl_file: &str,
    iterations: u32,
    layout: TestLayout,
) -> String {
    let mut text = String::from("---\n\n");
    if passed {
        text.push_str(&format!("## {}\n\n**Files created:**\n", COMPLETE_BANNER));
        match layout {
            TestLayout::Colocated => {
                text.push_str(&format!("- `{}` (implementation + test)\n\n", impl_file));
            }
            TestLayout::SeparateFile => {
                text.push_str(&format!("- `{}` (test)\n", test_file));
                text.push_str(&format!("- `{}` (implementation)\n\n", impl_file));
            }
        }
        text.push_str(&format!("**Iterations:** {}\n\n", iterations));
    } else {
        text.push_str(
            "## ⚠️ TDD Cycle Incomplete\n\n\
             Tests are still failing after max iterations. Manual intervention needed.\n\n",
        );
    }
    text.push_str("_Say \"continue\" to start a new TDD cycle._\n");
    text
}

/// Shown for a continuation command when no earlier cycle exists.
pub fn no_previous_cycle() -> String {
    format!(
        "{}**\n\n\
         ⚠️ **No previous TDD cycle found to continue.**\n\n\
         To start a TDD cycle, describe what you want to implement. For example:\n\
         - \"Implement a function that validates email addresses\"\n\
         - \"Create a user authentication module\"\n\
         - \"Build a shopping cart with add/remove functionality\"\n",
        TDD_MARKER
    )
}

/// Guidance for a continuation command after an earlier cycle.
pub fn continuation(state: &TddState, model_banner: &str) -> String {
    let mut text = format!(
        "{} - Previous Cycle Found**\n\n{}**Previous requirement:** \"{}\"\n**Phase reached:** {}\n\n",
        TDD_MARKER, model_banner, state.requirement, state.phase
    );

    if state.phase == TddPhase::Complete {
        text.push_str(
            "✅ The previous TDD cycle is already complete!\n\n\
             **Ready for a new cycle.** Describe your next requirement to start.\n\
             \nExamples:\n\
             - \"Implement a function that validates phone numbers\"\n\
             - \"Add error handling to the existing function\"\n\
             - \"Create a new utility for date formatting\"\n",
        );
    } else {
        text.push_str(
            "The previous cycle was interrupted.\n\n\
             **Options:**\n\
             1. Describe the same requirement again to restart the full TDD cycle\n\
             2. Describe a new requirement to start a fresh cycle\n\
             \n_TDD mode will automatically: write tests → run them → implement → run again → iterate until passing._\n",
        );
    }
    text
}
