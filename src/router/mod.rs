//! 多智能体路由：Agent 注册表、关键词意图识别、三阶段流水线

pub mod intent;
pub mod pipeline;
pub mod registry;

pub use intent::{classify, Classification, Intent};
pub use pipeline::{
    AgentBackend, MultiAgentRouter, PostProcessResult, PreProcessResult, RouteDecision,
    RouterOutcome, RouterStage,
};
pub use registry::{AgentConfig, AgentRegistry};
