//! In-memory test doubles for the host and verification collaborators.
//!
//! These mocks provide controllable stand-ins for the editor, the test runner
//! and the optional verification callbacks, enabling deterministic tests of
//! the orchestration loops.

use crate::host::{CommandOutput, CurrentFile, Host};
use crate::verification::{DiagnosticsProvider, LlmJudge};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted result of one subprocess call.
type CommandScript = std::result::Result<CommandOutput, String>;

/// Mock implementation of the host.
///
/// Files live in memory. Commands return scripted output: each call consumes
/// the next queued result for that command, and the last one repeats. Unknown
/// commands succeed with empty output.
///
/// # Example
///
/// ```rust,ignore
/// let host = MockHost::new()
///     .with_file("/proj/package.json", "{}")
///     .with_command_output("npm test", CommandOutput::new("1 failed", "", 1));
///
/// assert_eq!(host.commands(), Vec::<String>::new());
/// ```
#[derive(Debug)]
pub struct MockHost {
    files: Mutex<HashMap<PathBuf, String>>,
    workspace: Vec<PathBuf>,
    current_file: Option<CurrentFile>,
    scripts: Mutex<HashMap<String, VecDeque<CommandScript>>>,
    write_failures: HashSet<PathBuf>,
    read_failures: HashSet<PathBuf>,
    commands: Mutex<Vec<String>>,
    opened: Mutex<Vec<PathBuf>>,
    writes: Mutex<Vec<PathBuf>>,
    read_count: AtomicU32,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            workspace: vec![PathBuf::from("/proj")],
            current_file: None,
            scripts: Mutex::new(HashMap::new()),
            write_failures: HashSet::new(),
            read_failures: HashSet::new(),
            commands: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            read_count: AtomicU32::new(0),
        }
    }
}

impl MockHost {
    /// Create a mock rooted at `/proj` with no files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        lock(&self.files).insert(path.into(), content.to_string());
        self
    }

    /// Replace the workspace roots.
    #[must_use]
    pub fn with_workspace(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace = vec![root.into()];
        self
    }

    /// Report no workspace roots at all.
    #[must_use]
    pub fn without_workspace(mut self) -> Self {
        self.workspace.clear();
        self
    }

    /// Set the file the user has open.
    #[must_use]
    pub fn with_current_file(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.current_file = Some(CurrentFile {
            path: path.into(),
            contents: contents.to_string(),
        });
        self
    }

    /// Queue the output of the next call to `command`.
    #[must_use]
    pub fn with_command_output(self, command: &str, output: CommandOutput) -> Self {
        lock(&self.scripts)
            .entry(command.to_string())
            .or_default()
            .push_back(Ok(output));
        self
    }

    /// Make the next call to `command` fail to start.
    #[must_use]
    pub fn with_command_error(self, command: &str, error: &str) -> Self {
        lock(&self.scripts)
            .entry(command.to_string())
            .or_default()
            .push_back(Err(error.to_string()));
        self
    }

    /// Make every write to `path` fail.
    #[must_use]
    pub fn with_write_failure(mut self, path: impl Into<PathBuf>) -> Self {
        self.write_failures.insert(path.into());
        self
    }

    /// Make reads of `path` fail while the file still reports as existing.
    #[must_use]
    pub fn with_read_failure(mut self, path: impl Into<PathBuf>, content: &str) -> Self {
        let path = path.into();
        lock(&self.files).insert(path.clone(), content.to_string());
        self.read_failures.insert(path);
        self
    }

    /// Current content of a file.
    #[must_use]
    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        lock(&self.files).get(path.as_ref()).cloned()
    }

    /// Commands run so far, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }

    /// Paths written so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<PathBuf> {
        lock(&self.writes).clone()
    }

    /// Paths opened so far, in order.
    #[must_use]
    pub fn opened(&self) -> Vec<PathBuf> {
        lock(&self.opened).clone()
    }

    /// Number of `read_file` calls.
    #[must_use]
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Host for MockHost {
    async fn read_file(&self, path: &Path) -> Result<String> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        if self.read_failures.contains(path) {
            bail!("Input/output error: {}", path.display());
        }
        self.file(path)
            .ok_or_else(|| anyhow!("No such file: {}", path.display()))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if self.write_failures.contains(path) {
            bail!("Permission denied: {}", path.display());
        }
        lock(&self.writes).push(path.to_path_buf());
        lock(&self.files).insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn file_exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }

    async fn open_file(&self, path: &Path) -> Result<()> {
        lock(&self.opened).push(path.to_path_buf());
        Ok(())
    }

    async fn subprocess(&self, command: &str, _cwd: &Path) -> Result<CommandOutput> {
        lock(&self.commands).push(command.to_string());

        let mut scripts = lock(&self.scripts);
        let script = match scripts.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match script {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(CommandOutput::new("", "", 0)),
        }
    }

    async fn workspace_dirs(&self) -> Vec<PathBuf> {
        self.workspace.clone()
    }

    async fn current_file(&self) -> Option<CurrentFile> {
        self.current_file.clone()
    }
}

/// Mock diagnostics provider returning a fixed list of errors.
#[derive(Debug, Default, Clone)]
pub struct MockDiagnostics {
    errors: Vec<String>,
    failure: Option<String>,
}

impl MockDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors = errors.into_iter().map(Into::into).collect();
        self
    }

    /// Make the provider itself fail.
    #[must_use]
    pub fn with_failure(mut self, error: &str) -> Self {
        self.failure = Some(error.to_string());
        self
    }
}

#[async_trait]
impl DiagnosticsProvider for MockDiagnostics {
    async fn errors(&self, _path: &Path) -> Result<Vec<String>> {
        match &self.failure {
            Some(error) => bail!("{}", error),
            None => Ok(self.errors.clone()),
        }
    }
}

/// Mock LLM judge returning a fixed verdict and recording its prompts.
#[derive(Debug, Default)]
pub struct MockJudge {
    verdict: String,
    failure: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockJudge {
    /// Judge answering with `verdict`.
    #[must_use]
    pub fn new(verdict: &str) -> Self {
        Self {
            verdict: verdict.to_string(),
            ..Self::default()
        }
    }

    /// Judge whose call fails.
    #[must_use]
    pub fn failing(error: &str) -> Self {
        Self {
            failure: Some(error.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl LlmJudge for MockJudge {
    async fn judge(&self, prompt: &str) -> Result<String> {
        lock(&self.prompts).push(prompt.to_string());
        match &self.failure {
            Some(error) => bail!("{}", error),
            None => Ok(self.verdict.clone()),
        }
    }
}
