//! redgreen - model-driven TDD and verified edits
//!
//! A Rust toolkit that drives a language model through a red-green-refactor
//! cycle against a real project, and checks model-made edits against the
//! instruction that asked for them.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`tdd`] - Framework detection, transcript state, the TDD control loop
//! - [`verification`] - Task analysis and before/after verification
//! - [`autonomous`] - Edit-and-verify loop over a single file
//! - [`host`] - Editor/host capability (files, processes, workspace)
//! - [`llm`] - Model clients, capabilities and prompt budgets
//! - [`config`] - Settings loading and validation
//! - [`chat`] - Transcript types
//! - [`error`] - Custom error types and handling
//! - [`testing`] - Mock host and verification collaborators
//!
//! # Example
//!
//! ```rust,ignore
//! use redgreen::{ChatMessage, LocalHost, TddSession};
//! use redgreen::llm::OllamaProvider;
//! use futures::StreamExt;
//!
//! let host = LocalHost::new(".");
//! let model = OllamaProvider::from_model_name("qwen2.5-coder:7b");
//! let session = TddSession::new(&host, &model);
//!
//! let mut progress = session.run(vec![ChatMessage::user("Implement a slugify function")]);
//! while let Some(text) = progress.next().await {
//!     print!("{}", text);
//! }
//! ```

pub mod autonomous;
pub mod chat;
pub mod config;
pub mod error;
pub mod host;
pub mod llm;
pub mod tdd;
pub mod testing;
pub mod verification;

// Re-export commonly used types
pub use error::{RedGreenError, Result};

pub use chat::{load_transcript, ChatMessage, Role};
pub use config::{CacheConfig, ProjectConfig, TddConfig, VerificationConfig};
pub use host::{CommandOutput, CurrentFile, FileCache, Host, LocalHost};
pub use llm::{create_llm_client, LlmClient, LlmConfig, ModelCapabilities};

pub use autonomous::AutonomousSession;
pub use tdd::{
    detect_test_framework, extract_tdd_state, strip_code_block, TddPhase, TddSession, TddState,
    TestFramework, TestLayout,
};
pub use verification::{
    SuccessCriteria, TaskAnalyzer, VerificationContext, VerificationEngine, VerificationResult,
};
