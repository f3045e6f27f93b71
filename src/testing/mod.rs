//! Testing infrastructure for redgreen.
//!
//! Mock collaborators for exercising the TDD and autonomous loops without an
//! editor, a real test runner or a model.
//!
//! # Example
//!
//! ```rust,ignore
//! use redgreen::testing::{MockHost, MockJudge};
//! use redgreen::host::CommandOutput;
//!
//! let host = MockHost::new()
//!     .with_command_output("npm test", CommandOutput::new("1 failed", "", 1))
//!     .with_command_output("npm test", CommandOutput::new("1 passed", "", 0));
//!
//! let judge = MockJudge::new("ACCOMPLISHED: YES\nCOMPLETION: 90%");
//! ```

pub mod mocks;

pub use mocks::*;
