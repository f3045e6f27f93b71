//! Detect a model producing the same implementation over and over.

/// Shortest shared prefix, in characters, that counts as a repeat.
const MIN_PREFIX_CHARS: usize = 50;

/// Share of the shorter attempt that must match to count as a repeat.
const PREFIX_RATIO: f64 = 0.8;

fn normalize(code: &str) -> String {
    code.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remembers earlier implementation attempts within one GREEN phase.
#[derive(Debug, Default, Clone)]
pub struct RepetitionGuard {
    previous: Vec<String>,
}

impl RepetitionGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `code` repeats an earlier attempt.
    ///
    /// Whitespace runs are collapsed before comparing. A repeat is either an
    /// exact match or a shared prefix covering 80% of the shorter attempt,
    /// provided that prefix is longer than 50 characters.
    #[must_use]
    pub fn is_repeat(&self, code: &str) -> bool {
        let current: Vec<char> = normalize(code).chars().collect();
        self.previous.iter().any(|prev| {
            let prev: Vec<char> = prev.chars().collect();
            if prev == current {
                return true;
            }
            let check_len =
                (prev.len().min(current.len()) as f64 * PREFIX_RATIO).floor() as usize;
            check_len > MIN_PREFIX_CHARS && prev[..check_len] == current[..check_len]
        })
    }

    /// Record an attempt for later comparisons.
    pub fn record(&mut self, code: &str) {
        self.previous.push(normalize(code));
    }

    #[must_use]
    pub fn attempts(&self) -> usize {
        self.previous.len()
    }
}
