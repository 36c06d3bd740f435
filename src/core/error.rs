//! 错误类型与关键错误分类
//!
//! 工具客户端的所有失败都归一为 ToolError（带 ErrorKind），执行器只依据 kind 判断是否为关键错误；
//! 编排层的失败用 OrchestratorError 表达，由 HTTP 层映射为状态码。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 工具调用失败的类别（由传输层 / 客户端显式给出）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// 无法建立连接（服务未启动、拒绝连接）
    Connection,
    /// 单次 HTTP 调用超时
    Timeout,
    /// 服务端拒绝访问（401 / 403）
    Permission,
    /// 需要用户显式授权（缺少 allow 标志），不会发出请求
    Unauthorized,
    /// 其它非 2xx 状态
    Http,
    /// 响应体无法解析
    InvalidResponse,
    /// 参数不符合动作签名
    InvalidArgs,
    /// 服务返回 {"status": "error"}
    Remote,
    UnknownTool,
    UnknownAction,
    /// 执行器兜底（如步骤 panic）
    Internal,
}

/// 中止计划执行的错误类别：精确匹配，不做层级判断
pub const CRITICAL_ERROR_KINDS: [ErrorKind; 3] =
    [ErrorKind::Connection, ErrorKind::Timeout, ErrorKind::Permission];

impl ErrorKind {
    /// 对外名称（日志 / 审计）
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Permission => "PermissionError",
            ErrorKind::Unauthorized => "AuthorizationRequired",
            ErrorKind::Http => "HttpError",
            ErrorKind::InvalidResponse => "InvalidResponse",
            ErrorKind::InvalidArgs => "InvalidArguments",
            ErrorKind::Remote => "RemoteError",
            ErrorKind::UnknownTool => "UnknownTool",
            ErrorKind::UnknownAction => "UnknownAction",
            ErrorKind::Internal => "InternalError",
        }
    }

    pub fn is_critical(&self) -> bool {
        CRITICAL_ERROR_KINDS.contains(self)
    }
}

/// 工具调用错误：Display 只输出 message，与执行结果中的 error 字段一致
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgs, message)
    }

    /// 缺少 allow 标志时的用户侧授权失败
    pub fn unauthorized(tool: &str, action: &str) -> Self {
        Self::new(
            ErrorKind::Unauthorized,
            format!("Action '{action}' on tool '{tool}' requires explicit permission (allow=true)"),
        )
    }

    pub fn unknown_action(tool: &str, action: &str) -> Self {
        Self::new(
            ErrorKind::UnknownAction,
            format!("Action '{action}' not found on tool '{tool}'"),
        )
    }

    pub fn is_critical(&self) -> bool {
        self.kind.is_critical()
    }
}

/// 编排层错误
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Plan parse error: {0}")]
    PlanParse(String),

    #[error("Session store error: {0}")]
    Session(#[from] crate::memory::SessionError),
}
