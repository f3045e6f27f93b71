//! Turn raw model output into source code that can be written to disk.

use regex::Regex;

const FENCED_BLOCK: &str = r"(?s)```[\w-]*\s*\n(.*?)\n```";
const INLINE_BLOCK: &str = r"(?s)```[\w-]*\s*(.*?)```";
/// An item keyword at the start of a line, with any comment or attribute
/// lines directly above it. `const`/`static` need a `NAME:` type annotation
/// so JavaScript bindings do not qualify.
const RUST_START: &str = r"(?m)^(?:(?://[^\n]*|#!?\[[^\n]*\])[ \t]*\n)*(?:pub(?:\([\w:\s]+\))?\s+)?(?:(?:fn|struct|impl|mod|use|type|trait|enum|async\s+fn)\s|(?:const|static)\s+(?:mut\s+)?\w+\s*:)";
/// Decorators stay attached to the definition below them.
const PYTHON_START: &str = r"(?m)^(?:@[^\n]*\n)*(?:def|class|import|from|async\s+def)\s";
/// ES module syntax never appears in the systems-language output.
const JS_MODULE_LINE: &str = r"(?m)^(?:import|export)\b";
const LANGUAGE_NAMES: &str = "rust|python|go|typescript|javascript|ts|js|py|java|cpp|csharp";
const GLUED_KEYWORD: &str = r"(?i)^(?:fn|pub|struct|impl|mod|use|const|let|type)[a-z_]";
const SPLIT_KEYWORDS: &[&str] = &["fn", "pub", "struct", "impl", "mod", "use", "let", "mut"];

fn first_capture(pattern: &str, text: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// Body of the first code fence, or the text with stray fences removed.
fn unfence(code: &str) -> String {
    if let Some(body) = first_capture(FENCED_BLOCK, code) {
        return body;
    }
    if let Some(body) = first_capture(INLINE_BLOCK, code) {
        return body;
    }

    let mut result = code.to_string();
    if let Ok(open) = Regex::new(r"^\s*```[\w-]*\s*\n?") {
        result = open.replace(&result, "").into_owned();
    }
    if let Ok(close) = Regex::new(r"\n?```\s*$") {
        result = close.replace(&result, "").into_owned();
    }
    result
}

fn first_match(pattern: &str, text: &str) -> Option<usize> {
    Regex::new(pattern).ok()?.find(text).map(|m| m.start())
}

/// Start of the first systems-language item. Text with ES module lines is
/// JavaScript or TypeScript and never qualifies.
fn rust_start(text: &str) -> Option<usize> {
    if first_match(JS_MODULE_LINE, text).is_some() {
        return None;
    }
    first_match(RUST_START, text)
}

/// Remove a language name the model echoed before the code, either on its
/// own or glued to the first keyword (`rustfn main`).
fn strip_language_tag(text: String) -> String {
    let standalone = format!(r"(?i)^(?:{})[ \t]*(?:\n|$)", LANGUAGE_NAMES);
    let glued = format!(
        r"(?i)^(?:{})((?:fn|pub|use|mod|struct|impl|def|class|import|from|func|package|const|let|export)\b)",
        LANGUAGE_NAMES
    );
    if let Ok(re) = Regex::new(&standalone) {
        if re.is_match(&text) {
            return re.replace(&text, "").into_owned();
        }
    }
    match Regex::new(&glued) {
        Ok(re) => re.replace(&text, "${1}").into_owned(),
        Err(_) => text,
    }
}

fn matches(pattern: &str, text: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(text))
}

/// Re-insert the space models sometimes drop after a keyword (`fnmain`).
fn split_glued_keywords(text: String) -> String {
    if !matches(GLUED_KEYWORD, &text) {
        return text;
    }
    SPLIT_KEYWORDS.iter().fold(text, |acc, kw| {
        match Regex::new(&format!(r"(?i)\b({})([a-z_])", kw)) {
            Ok(re) => re.replace_all(&acc, "${1} ${2}").into_owned(),
            Err(_) => acc,
        }
    })
}

/// Extract writable source code from a model response.
///
/// Handles fenced and unfenced responses, leading explanations, a bare
/// language tag glued to the code, and keywords missing their trailing
/// space. Interior whitespace is preserved; only leading and trailing
/// newlines are removed.
#[must_use]
pub fn strip_code_block(code: &str) -> String {
    let mut result = unfence(code);

    if let Some(start) = rust_start(&result).or_else(|| first_match(PYTHON_START, &result)) {
        result = result[start..].to_string();
    }

    result = strip_language_tag(result);

    result = split_glued_keywords(result);

    result.trim_matches('\n').to_string()
}
