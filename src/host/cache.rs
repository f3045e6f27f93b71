//! Short-lived file content cache.
//!
//! One cache belongs to one session; it is created by the session and dropped
//! with it. Entries expire after a fixed TTL and there is no other eviction.

use super::Host;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default time-to-live for cached file contents.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CacheEntry {
    content: String,
    stored_at: Instant,
}

/// TTL cache of file contents keyed by path.
#[derive(Debug, Clone)]
pub struct FileCache {
    entries: HashMap<PathBuf, CacheEntry>,
    ttl: Duration,
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl FileCache {
    /// Create an empty cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Cached content for `path`, if present and fresh.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&str> {
        self.entries
            .get(path)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.content.as_str())
    }

    /// Store content for `path`, replacing any previous entry.
    pub fn set(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.entries.insert(
            path.into(),
            CacheEntry {
                content: content.into(),
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for `path`.
    pub fn invalidate(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// Drop every entry.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Read through the cache, populating it on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot read the file.
    pub async fn read_file(&mut self, host: &dyn Host, path: &Path) -> Result<String> {
        if let Some(content) = self.get(path) {
            return Ok(content.to_string());
        }

        let content = host
            .read_file(path)
            .await
            .map_err(|_| anyhow!("Failed to read file: {}", path.display()))?;
        self.set(path, content.clone());
        Ok(content)
    }
}
