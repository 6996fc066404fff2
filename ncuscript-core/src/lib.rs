//! NcuScript Core - Data Types
//!
//! Request/result records exchanged with the script orchestrator, the error
//! taxonomy, and configuration. This crate contains no network code; the
//! orchestration lives in ncuscript-llm.

pub mod automation;
pub mod config;
pub mod error;

pub use automation::{
    ConversationRole, ConversationTurn, ImprovementRequest, ImprovementResult,
    PostTestImprovementRequest, PostTestImprovementResult, PromptRefinementRequest,
    PromptRefinementResult, RoleParseError, TestGenerationRequest, TestGenerationResult,
    TestOutcome, TestStatus, TestStatusParseError,
};
pub use config::{AttributionConfig, AutomatorConfig};
pub use error::{ConfigError, ErrorKind, LlmError, NcuError, NcuResult};
