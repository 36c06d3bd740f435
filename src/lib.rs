//! Copilot - 桌面助手编排核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与编排器（/orchestrate/ 的完整流程）
//! - **tools**: MCP 服务客户端（files / memory / rag / vision / search / system / control / audio / documents / llm）与注册表
//! - **context**: SuperContext 并发构建
//! - **router**: Agent 注册表、意图识别、多智能体路由流水线
//! - **executor**: 计划执行（顺序 / 重试 / 并行 / dry-run）与执行时间线
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / 本地模型 / Mock）与模型池
//! - **memory**: 消息类型与文件型会话存储
//! - **planner**: 规划 prompt 与计划解析
//! - **server**: axum HTTP 接口

pub mod config;
pub mod context;
pub mod core;
pub mod executor;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planner;
pub mod router;
#[cfg(feature = "server")]
pub mod server;
pub mod tools;

pub use crate::core::{OrchestrateRequest, OrchestrateResponse, Orchestrator};
