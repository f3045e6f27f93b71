//! Host capability abstraction.
//!
//! Everything the loops do to the outside world (reading and writing files,
//! running test commands, asking which file is open) goes through the [`Host`]
//! trait, so the same orchestration runs against an editor integration, the
//! local filesystem ([`LocalHost`]) or an in-memory mock in tests.

pub mod cache;

pub use cache::FileCache;

use crate::error::RedGreenError;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Captured output of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Real exit code, `None` when the process was killed by a signal or the
    /// host cannot report one.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Build output for a process that exited with `code`.
    #[must_use]
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(code),
        }
    }

    /// Build output for a host that does not report exit codes.
    #[must_use]
    pub fn without_exit_code(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: None,
        }
    }

    /// stdout followed by stderr on its own line when present.
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// The file currently focused in the host, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Abstraction over the editor / environment the loops run in.
///
/// Implementations must be `Send + Sync` so sessions can hold them behind a
/// shared reference across await points.
#[async_trait]
pub trait Host: Send + Sync {
    /// Read a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable.
    async fn read_file(&self, path: &Path) -> Result<String>;

    /// Write a file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Check whether a file exists. Probe failures count as absent.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Reveal a file to the user (refreshes the editor buffer).
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot open the file.
    async fn open_file(&self, path: &Path) -> Result<()>;

    /// Run a shell command in `cwd` and capture its output.
    ///
    /// A non-zero exit is not an error; it is reported through
    /// [`CommandOutput::exit_code`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the command could not be run at all.
    async fn subprocess(&self, command: &str, cwd: &Path) -> Result<CommandOutput>;

    /// Workspace roots, first one is the project root.
    async fn workspace_dirs(&self) -> Vec<PathBuf>;

    /// The file the user currently has open.
    async fn current_file(&self) -> Option<CurrentFile>;
}

/// Host backed by the local filesystem and `sh -c`.
#[derive(Debug, Clone)]
pub struct LocalHost {
    root: PathBuf,
    current_file: Option<PathBuf>,
}

impl LocalHost {
    /// Create a host rooted at `root`.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            current_file: None,
        }
    }

    /// Treat `path` as the file the user has open.
    #[must_use]
    pub fn with_current_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.current_file = Some(path.into());
        self
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn shell(command: &str) -> AsyncCommand {
        if cfg!(windows) {
            let mut cmd = AsyncCommand::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = AsyncCommand::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

#[async_trait]
impl Host for LocalHost {
    async fn read_file(&self, path: &Path) -> Result<String> {
        let full = self.resolve(path);
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|_| RedGreenError::ReadFailed { path: full }.into())
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RedGreenError::write_failed(parent, e.to_string()))?;
        }
        debug!(path = %full.display(), bytes = content.len(), "writing file");
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| RedGreenError::write_failed(full, e.to_string()).into())
    }

    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(self.resolve(path))
            .await
            .unwrap_or(false)
    }

    async fn open_file(&self, path: &Path) -> Result<()> {
        debug!(path = %self.resolve(path).display(), "open requested (no editor attached)");
        Ok(())
    }

    async fn subprocess(&self, command: &str, cwd: &Path) -> Result<CommandOutput> {
        debug!(command, cwd = %cwd.display(), "running subprocess");
        let output = Self::shell(command)
            .current_dir(self.resolve(cwd))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RedGreenError::Subprocess {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }

    async fn workspace_dirs(&self) -> Vec<PathBuf> {
        vec![self.root.clone()]
    }

    async fn current_file(&self) -> Option<CurrentFile> {
        let path = self.current_file.as_ref()?;
        let contents = self.read_file(path).await.ok()?;
        Some(CurrentFile {
            path: path.clone(),
            contents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_combined_output() {
        let out = CommandOutput::new("ok", "", 0);
        assert_eq!(out.combined(), "ok");

        let out = CommandOutput::new("stdout", "stderr", 1);
        assert_eq!(out.combined(), "stdout\nstderr");
    }

    #[tokio::test]
    async fn test_local_host_write_creates_parents() {
        let temp = TempDir::new().unwrap();
        let host = LocalHost::new(temp.path());

        host.write_file(Path::new("__tests__/email.test.ts"), "test")
            .await
            .unwrap();

        assert!(host.file_exists(Path::new("__tests__/email.test.ts")).await);
        let content = host
            .read_file(Path::new("__tests__/email.test.ts"))
            .await
            .unwrap();
        assert_eq!(content, "test");
    }

    #[tokio::test]
    async fn test_local_host_missing_file() {
        let temp = TempDir::new().unwrap();
        let host = LocalHost::new(temp.path());

        assert!(!host.file_exists(Path::new("nope.txt")).await);
        let err = host.read_file(Path::new("nope.txt")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RedGreenError>(),
            Some(RedGreenError::ReadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_local_host_write_under_a_file_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("blocker"), "x").unwrap();
        let host = LocalHost::new(temp.path());

        let err = host
            .write_file(Path::new("blocker/inner.ts"), "y")
            .await
            .unwrap_err();
        let typed = err.downcast_ref::<RedGreenError>().unwrap();
        assert!(typed.is_recoverable());
        assert!(typed.to_string().contains("blocker"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_host_subprocess_reports_exit_code() {
        let temp = TempDir::new().unwrap();
        let host = LocalHost::new(temp.path());

        let ok = host.subprocess("echo hello", temp.path()).await.unwrap();
        assert_eq!(ok.exit_code, Some(0));
        assert!(ok.stdout.contains("hello"));

        let failed = host
            .subprocess("echo boom 1>&2; exit 3", temp.path())
            .await
            .unwrap();
        assert_eq!(failed.exit_code, Some(3));
        assert!(failed.stderr.contains("boom"));
    }

    #[tokio::test]
    async fn test_local_host_current_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("main.go"), "package main").unwrap();

        let host = LocalHost::new(temp.path()).with_current_file("main.go");
        let current = host.current_file().await.unwrap();
        assert_eq!(current.contents, "package main");

        let bare = LocalHost::new(temp.path());
        assert!(bare.current_file().await.is_none());
    }
}
