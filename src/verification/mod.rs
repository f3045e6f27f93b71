//! Did a code change do what it was asked to do?
//!
//! [`TaskAnalyzer`] turns an instruction into [`SuccessCriteria`] and
//! [`VerificationEngine`] scores before/after snapshots against them.
//!
//! ```rust,ignore
//! use redgreen::verification::{FileSnapshot, TaskAnalyzer, VerificationContext, VerificationEngine};
//!
//! let criteria = TaskAnalyzer::new().analyze("replace var with const", Some(&before));
//! let mut ctx = VerificationContext::new("replace var with const", criteria);
//! ctx.add_snapshot(FileSnapshot::capture("app.js", before).complete(after));
//!
//! let result = VerificationEngine::default().verify(&ctx, None, None).await;
//! println!("{}", result.summary);
//! ```

pub mod analyzer;
pub mod engine;
pub mod patterns;

pub use analyzer::{
    generate_verification_prompt, StructuralChange, StructuralChangeKind, SuccessCriteria,
    TaskAnalyzer, TaskType,
};
pub use engine::{
    check_file_changed, content_hash, parse_llm_response, CriterionKind, CriterionResult,
    DiagnosticsProvider, FileSnapshot, JudgeVerdict, LlmJudge, ModelJudge, PendingSnapshot,
    VerificationContext, VerificationEngine, VerificationOptions, VerificationResult,
};
pub use patterns::{
    detect_anti_patterns, AntiPatternCategory, PatternCategory, PatternCriteria,
    PositivePatternCategory,
};
