//! 工具客户端注册表
//!
//! 每个 MCP 服务对应一个 ToolClient（kind / actions / call），动作表在编译期固定；
//! ToolRegistry 按 ToolKind 存放 Arc<dyn ToolClient>，由编排器独占构建，
//! ContextBuilder 与 McpExecutor 只持有同一个 Arc 的引用。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::core::{ErrorKind, ToolError};
use crate::tools::{
    AudioClient, ControlClient, DocumentsClient, FilesClient, LocalLlmToolClient, MemoryClient,
    RagClient, SearchClient, SystemClient, VisionClient,
};

/// 已知工具（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Files,
    Memory,
    Rag,
    Vision,
    Search,
    System,
    Control,
    Audio,
    Documents,
    Llm,
}

impl ToolKind {
    pub const ALL: [ToolKind; 10] = [
        ToolKind::Files,
        ToolKind::Memory,
        ToolKind::Rag,
        ToolKind::Vision,
        ToolKind::Search,
        ToolKind::System,
        ToolKind::Control,
        ToolKind::Audio,
        ToolKind::Documents,
        ToolKind::Llm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Files => "files",
            ToolKind::Memory => "memory",
            ToolKind::Rag => "rag",
            ToolKind::Vision => "vision",
            ToolKind::Search => "search",
            ToolKind::System => "system",
            ToolKind::Control => "control",
            ToolKind::Audio => "audio",
            ToolKind::Documents => "documents",
            ToolKind::Llm => "llm",
        }
    }

    /// 会改变本机状态的工具（safe 模式下需要用户确认）
    pub fn is_sensitive(&self) -> bool {
        matches!(self, ToolKind::System | ToolKind::Control)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ToolError::new(ErrorKind::UnknownTool, format!("Unknown tool: {s}")))
    }
}

/// 工具客户端 trait：动作表 + 按动作名分派到强类型方法
#[async_trait]
pub trait ToolClient: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// 该工具支持的全部动作名
    fn actions(&self) -> &'static [&'static str];

    fn has_action(&self, action: &str) -> bool {
        self.actions().contains(&action)
    }

    /// 调用动作；args 已保证为 JSON 对象
    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError>;
}

/// 将 JSON 对象参数解码为动作的参数结构体；失败为 InvalidArgs（非关键错误）
pub fn parse_args<T: DeserializeOwned>(
    tool: ToolKind,
    action: &str,
    args: Map<String, Value>,
) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| ToolError::invalid_args(format!("Invalid arguments for {tool}.{action}: {e}")))
}

/// 工具注册表：ToolKind -> Arc<dyn ToolClient>
#[derive(Default)]
pub struct ToolRegistry {
    clients: HashMap<ToolKind, Arc<dyn ToolClient>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置构建全部十个 HTTP 客户端
    pub fn from_config(cfg: &AppConfig) -> Self {
        let s = &cfg.services;
        let t = s.timeout_secs;
        let mut registry = Self::new();
        registry.register(FilesClient::new(&s.files_url, t));
        registry.register(MemoryClient::new(&s.memory_url, t));
        registry.register(RagClient::new(&s.rag_url, t));
        registry.register(VisionClient::new(&s.vision_url, t));
        registry.register(SearchClient::new(&s.search_url, t));
        registry.register(SystemClient::new(&s.system_url, t));
        registry.register(ControlClient::new(&s.control_url, t));
        registry.register(AudioClient::new(&s.audio_url, t));
        registry.register(DocumentsClient::new(&s.documents_url, t));
        registry.register(LocalLlmToolClient::new(&s.llm_url, t));
        registry
    }

    /// 注册（同 kind 覆盖旧客户端）
    pub fn register(&mut self, client: impl ToolClient + 'static) {
        self.register_arc(Arc::new(client));
    }

    pub fn register_arc(&mut self, client: Arc<dyn ToolClient>) {
        self.clients.insert(client.kind(), client);
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn ToolClient>> {
        self.clients.get(&kind).cloned()
    }

    /// 按线上名称查找；名称未知或未注册时返回 None
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ToolClient>> {
        name.parse::<ToolKind>().ok().and_then(|k| self.get(k))
    }

    /// 直接调用某个工具动作（ContextBuilder 使用）
    pub async fn call(
        &self,
        kind: ToolKind,
        action: &str,
        args: Value,
    ) -> Result<Value, ToolError> {
        let client = self
            .get(kind)
            .ok_or_else(|| ToolError::new(ErrorKind::UnknownTool, format!("Unknown tool: {kind}")))?;
        if !client.has_action(action) {
            return Err(ToolError::unknown_action(kind.as_str(), action));
        }
        let args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ToolError::invalid_args(format!(
                    "Arguments for {kind}.{action} must be an object, got {other}"
                )))
            }
        };
        client.call(action, args).await
    }

    /// 已注册工具名（按 ToolKind 顺序）
    pub fn tool_names(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self.clients.keys().copied().collect();
        kinds.sort();
        kinds.into_iter().map(|k| k.as_str().to_string()).collect()
    }

    /// 工具目录：(tool, actions)，用于生成规划 prompt
    pub fn catalog(&self) -> Vec<(ToolKind, &'static [&'static str])> {
        let mut entries: Vec<_> = self
            .clients
            .iter()
            .map(|(kind, client)| (*kind, client.actions()))
            .collect();
        entries.sort_by_key(|(kind, _)| *kind);
        entries
    }

    /// 目录 JSON（/health 与 prompt 共用）
    pub fn to_catalog_json(&self) -> String {
        let tools: Vec<Value> = self
            .catalog()
            .into_iter()
            .map(|(kind, actions)| {
                serde_json::json!({
                    "tool": kind.as_str(),
                    "actions": actions,
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub;

    #[async_trait]
    impl ToolClient for Stub {
        fn kind(&self) -> ToolKind {
            ToolKind::Search
        }

        fn actions(&self) -> &'static [&'static str] {
            &["web_search"]
        }

        async fn call(&self, _action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
            Ok(Value::Object(args))
        }
    }

    #[test]
    fn test_tool_kind_round_trip_names() {
        for kind in ToolKind::ALL {
            assert_eq!(kind.as_str().parse::<ToolKind>().unwrap(), kind);
        }
        let err = "unknown_tool".parse::<ToolKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: unknown_tool");
    }

    #[test]
    fn test_from_config_registers_all_tools() {
        let registry = ToolRegistry::from_config(&AppConfig::default());
        assert_eq!(registry.tool_names().len(), ToolKind::ALL.len());
        assert!(registry.resolve("vision").is_some());
        assert!(registry.resolve("nope").is_none());
    }

    #[tokio::test]
    async fn test_registry_call_checks_action_and_args() {
        let mut registry = ToolRegistry::new();
        registry.register(Stub);

        let ok = registry
            .call(ToolKind::Search, "web_search", serde_json::json!({"query": "rust"}))
            .await
            .unwrap();
        assert_eq!(ok["query"], "rust");

        let err = registry
            .call(ToolKind::Search, "delete_everything", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownAction);

        let err = registry
            .call(ToolKind::Search, "web_search", serde_json::json!([1, 2]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgs);

        let err = registry
            .call(ToolKind::Vision, "get_active_context", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownTool);
    }
}
