//! 执行层：计划步骤、MCP 执行器、执行时间线

pub mod mcp;
pub mod step;
pub mod timeline;

pub use mcp::{DryRunReport, McpExecutor, StepValidation};
pub use step::{ExecutionResult, Plan, Step};
pub use timeline::{Timeline, TimelineEvent};
