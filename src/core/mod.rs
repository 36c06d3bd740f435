//! 核心编排层：错误类型与编排器

pub mod error;
pub mod orchestrator;

pub use error::{ErrorKind, OrchestratorError, ToolError, CRITICAL_ERROR_KINDS};
pub use orchestrator::{
    ExecutionMode, OrchestrateRequest, OrchestrateResponse, Orchestrator,
};
