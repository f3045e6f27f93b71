//! Model capability tables and prompt-size helpers.
//!
//! Cloud models get generous prompt budgets; anything not recognised as a
//! cloud provider is treated as a local model with conservative limits.

use serde::{Deserialize, Serialize};

/// Providers served from the cloud with large context windows.
pub const CLOUD_PROVIDERS: &[&str] = &[
    "anthropic",
    "openai",
    "azure",
    "gemini",
    "deepseek",
    "groq",
    "mistral",
    "together",
    "openrouter",
    "bedrock",
    "vertex",
];

/// Providers running on local hardware.
pub const LOCAL_PROVIDERS: &[&str] = &["ollama", "lmstudio", "llamacpp", "vllm", "jan"];

/// Providers that support prompt caching.
pub const CACHING_PROVIDERS: &[&str] = &["anthropic", "openrouter", "bedrock", "vertex"];

/// Resolved limits for one provider/model pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub is_cloud: bool,
    pub is_local: bool,
    pub supports_caching: bool,
    pub max_context_tokens: u32,
    pub max_output_tokens: u32,
    pub safe_context_buffer: u32,
}

impl ModelCapabilities {
    /// Resolve capabilities from a provider and model name (case-insensitive).
    #[must_use]
    pub fn resolve(provider: &str, model: &str) -> Self {
        let provider = provider.to_lowercase();
        let model = model.to_lowercase();

        let is_cloud = CLOUD_PROVIDERS.contains(&provider.as_str());
        if !is_cloud {
            return Self::local();
        }

        if provider == "anthropic" || model.contains("claude") {
            return Self::cloud(true, 190_000, 8192, 10_000);
        }
        if model.contains("gpt-4") && (model.contains("turbo") || model.contains("4o")) {
            return Self::cloud(false, 120_000, 4096, 8000);
        }
        if provider == "deepseek" || model.contains("deepseek") {
            return Self::cloud(false, 60_000, 8192, 4000);
        }

        let caching = CACHING_PROVIDERS.contains(&provider.as_str());
        Self::cloud(caching, 30_000, 4096, 2000)
    }

    /// Conservative limits for local inference.
    #[must_use]
    pub fn local() -> Self {
        Self {
            is_cloud: false,
            is_local: true,
            supports_caching: false,
            max_context_tokens: 8192,
            max_output_tokens: 2048,
            safe_context_buffer: 1024,
        }
    }

    fn cloud(supports_caching: bool, context: u32, output: u32, buffer: u32) -> Self {
        Self {
            is_cloud: true,
            is_local: false,
            supports_caching,
            max_context_tokens: context,
            max_output_tokens: output,
            safe_context_buffer: buffer,
        }
    }

    /// Character budget for a kind of prompt content.
    #[must_use]
    pub fn content_limit(&self, kind: ContentKind) -> usize {
        match (kind, self.is_cloud) {
            (ContentKind::File, true) => 10_000,
            (ContentKind::Context, true) => 20_000,
            (ContentKind::File, false) => 4000,
            (ContentKind::Context, false) => 6000,
            (ContentKind::Output, _) => self.max_output_tokens as usize * 4,
        }
    }

    /// Short label used in progress banners.
    #[must_use]
    pub fn badge(&self) -> String {
        let mut badge = if self.is_cloud {
            "☁️ Cloud".to_string()
        } else {
            "🖥️ Local".to_string()
        };
        if self.supports_caching {
            badge.push_str(" | 💾 Caching");
        }
        badge
    }
}

/// What a character budget is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    File,
    Context,
    Output,
}

/// Byte offset of the `n`th char, or the string length when shorter.
fn char_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Cut `content` to `max_chars` characters.
#[must_use]
pub fn truncate_content(content: &str, max_chars: usize, add_ellipsis: bool) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated = &content[..char_offset(content, max_chars)];
    if add_ellipsis {
        format!("{}\n... (truncated)", truncated)
    } else {
        truncated.to_string()
    }
}

/// Keep the head and tail of `content`, replacing the middle with a marker.
///
/// `preserve_ratio` of `max_chars` is kept from each end.
#[must_use]
pub fn smart_truncate(content: &str, max_chars: usize, preserve_ratio: f64) -> String {
    let total = content.chars().count();
    if total <= max_chars {
        return content.to_string();
    }

    let keep = (max_chars as f64 * preserve_ratio).floor() as usize;
    let head_end = char_offset(content, keep);
    let tail_start = char_offset(content, total - keep);

    let (start, middle, end) = if head_end <= tail_start {
        (
            &content[..head_end],
            &content[head_end..tail_start],
            &content[tail_start..],
        )
    } else {
        (&content[..head_end], "", &content[head_end..])
    };
    let omitted = middle.split('\n').count();

    format!("{}\n\n... ({} lines omitted) ...\n\n{}", start, omitted, end)
}
