//! SuperContext 构建：并发拉取六个来源，单个来源失败只降级该来源
//!
//! 来源：memory（最近 + 相关）、rag（四个固定数据集）、vision、system_state、audio、documents。
//! 任一来源失败记为 {"status": "error", "error": ...} 加空载荷，构建本身永不失败。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::ContextSection;
use crate::core::ToolError;
use crate::tools::{ToolKind, ToolRegistry};

/// RAG 固定数据集及各自的 top_k
pub const RAG_DATASETS: [(&str, usize); 4] =
    [("agent_core", 2), ("projects", 2), ("scratchpad", 1), ("rules", 1)];

/// 来源名（sources_available 的固定顺序）
pub const SOURCE_NAMES: [&str; 6] = ["memory", "rag_docs", "vision", "system_state", "audio", "documents"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Success,
    Error,
}

/// 单个来源：状态 + 错误信息 + 载荷（失败时为空载荷）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSource<T> {
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Default> ContextSource<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            status: SourceStatus::Success,
            error: None,
            payload,
        }
    }

    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            status: SourceStatus::Error,
            error: Some(error.into()),
            payload: T::default(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SourceStatus::Success
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryContext {
    pub recent: Vec<Value>,
    pub relevant: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RagContext {
    pub documents: BTreeMap<String, Vec<Value>>,
}

/// 无固定结构的服务上下文（vision / system / audio / documents）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceContext {
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextMetadata {
    pub sources_available: Vec<String>,
    pub total_context_size: usize,
}

/// 单次请求的聚合上下文，用完即弃
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuperContext {
    pub memory: ContextSource<MemoryContext>,
    pub rag_docs: ContextSource<RagContext>,
    pub vision: ContextSource<ServiceContext>,
    pub system_state: ContextSource<ServiceContext>,
    pub audio: ContextSource<ServiceContext>,
    pub documents: ContextSource<ServiceContext>,
    pub metadata: ContextMetadata,
}

impl SuperContext {
    fn from_sources(
        memory: ContextSource<MemoryContext>,
        rag_docs: ContextSource<RagContext>,
        vision: ContextSource<ServiceContext>,
        system_state: ContextSource<ServiceContext>,
        audio: ContextSource<ServiceContext>,
        documents: ContextSource<ServiceContext>,
    ) -> Self {
        let flags = [
            memory.is_ok(),
            rag_docs.is_ok(),
            vision.is_ok(),
            system_state.is_ok(),
            audio.is_ok(),
            documents.is_ok(),
        ];
        let sources_available = SOURCE_NAMES
            .iter()
            .zip(flags)
            .filter(|(_, ok)| *ok)
            .map(|(name, _)| name.to_string())
            .collect();

        let total_context_size = payload_size(&[
            serde_json::to_string(&memory.payload),
            serde_json::to_string(&rag_docs.payload),
            serde_json::to_string(&vision.payload),
            serde_json::to_string(&system_state.payload),
            serde_json::to_string(&audio.payload),
            serde_json::to_string(&documents.payload),
        ]);

        Self {
            memory,
            rag_docs,
            vision,
            system_state,
            audio,
            documents,
            metadata: ContextMetadata {
                sources_available,
                total_context_size,
            },
        }
    }

    /// 渲染为紧凑 JSON 供规划 prompt 使用；超长时按字符截断
    pub fn summary_for_prompt(&self, max_chars: usize) -> String {
        let rendered = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        if rendered.chars().count() <= max_chars {
            return rendered;
        }
        let mut out: String = rendered.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

/// 任一载荷序列化失败时记为 0
fn payload_size(parts: &[serde_json::Result<String>]) -> usize {
    let mut total = 0;
    for part in parts {
        match part {
            Ok(s) => total += s.len(),
            Err(_) => return 0,
        }
    }
    total
}

/// 上下文构建器；与编排器共享同一个 ToolRegistry
pub struct ContextBuilder {
    tools: Arc<ToolRegistry>,
    recent_limit: usize,
    search_top_k: usize,
}

impl ContextBuilder {
    pub fn new(tools: Arc<ToolRegistry>, cfg: &ContextSection) -> Self {
        Self {
            tools,
            recent_limit: cfg.memory_recent_limit,
            search_top_k: cfg.memory_search_top_k,
        }
    }

    /// 六个来源并发拉取
    pub async fn build_super_context(&self, user_message: &str, session_id: &str) -> SuperContext {
        let (memory, rag_docs, vision, system_state, audio, documents) = tokio::join!(
            self.fetch_memory(user_message, session_id),
            self.fetch_rag(user_message),
            self.fetch_service(ToolKind::Vision, "get_active_context"),
            self.fetch_service(ToolKind::System, "snapshot"),
            self.fetch_service(ToolKind::Audio, "get_context"),
            self.fetch_service(ToolKind::Documents, "get_context"),
        );

        let ctx = SuperContext::from_sources(memory, rag_docs, vision, system_state, audio, documents);
        tracing::debug!(
            session_id = %session_id,
            sources = ?ctx.metadata.sources_available,
            size = ctx.metadata.total_context_size,
            "super context built"
        );
        ctx
    }

    async fn fetch_memory(&self, query: &str, session_id: &str) -> ContextSource<MemoryContext> {
        let (recent, relevant) = tokio::join!(
            self.tools.call(
                ToolKind::Memory,
                "get",
                json!({ "session_id": session_id, "limit": self.recent_limit }),
            ),
            self.tools.call(
                ToolKind::Memory,
                "search",
                json!({ "query": query, "session_id": session_id, "top_k": self.search_top_k }),
            ),
        );
        match (recent, relevant) {
            (Ok(recent), Ok(relevant)) => ContextSource::ok(MemoryContext {
                recent: as_list(recent, &["messages", "history", "items"]),
                relevant: as_list(relevant, &["results", "memories", "items"]),
            }),
            (Err(e), _) | (_, Err(e)) => degraded("memory", e),
        }
    }

    async fn fetch_rag(&self, query: &str) -> ContextSource<RagContext> {
        let searches = RAG_DATASETS.into_iter().map(|(dataset, top_k)| async move {
            let result = self
                .tools
                .call(
                    ToolKind::Rag,
                    "search",
                    json!({ "query": query, "dataset": dataset, "top_k": top_k }),
                )
                .await;
            (dataset, result)
        });

        let mut documents = BTreeMap::new();
        let mut last_error = None;
        for (dataset, result) in futures_util::future::join_all(searches).await {
            match result {
                Ok(value) => {
                    documents.insert(dataset.to_string(), as_list(value, &["results", "documents", "items"]));
                }
                Err(e) => {
                    tracing::warn!(dataset = %dataset, error = %e, "rag dataset unavailable");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if documents.is_empty() => degraded("rag_docs", e),
            _ => ContextSource::ok(RagContext { documents }),
        }
    }

    async fn fetch_service(&self, kind: ToolKind, action: &str) -> ContextSource<ServiceContext> {
        match self.tools.call(kind, action, Value::Null).await {
            Ok(Value::Object(data)) => ContextSource::ok(ServiceContext { data }),
            Ok(other) => {
                let mut data = Map::new();
                data.insert("value".to_string(), other);
                ContextSource::ok(ServiceContext { data })
            }
            Err(e) => degraded(kind.as_str(), e),
        }
    }
}

fn degraded<T: Default>(source: &str, e: ToolError) -> ContextSource<T> {
    tracing::warn!(source = %source, kind = e.kind.name(), error = %e, "context source degraded");
    ContextSource::degraded(e.message)
}

/// 服务返回数组或 {key: [...]}，统一为列表
fn as_list(value: Value, keys: &[&str]) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in keys {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return items;
                }
            }
            if map.is_empty() {
                Vec::new()
            } else {
                vec![Value::Object(map)]
            }
        }
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolClient;
    use async_trait::async_trait;

    /// 按 kind 回复固定结果的桩客户端
    struct Fixed {
        kind: ToolKind,
        actions: &'static [&'static str],
        reply: Result<Value, ToolError>,
    }

    #[async_trait]
    impl ToolClient for Fixed {
        fn kind(&self) -> ToolKind {
            self.kind
        }

        fn actions(&self) -> &'static [&'static str] {
            self.actions
        }

        async fn call(&self, _action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
            if self.kind == ToolKind::Rag && args.get("dataset").and_then(Value::as_str) == Some("rules") {
                return Err(ToolError::connection("rules index offline"));
            }
            self.reply.clone()
        }
    }

    fn builder(tools: ToolRegistry) -> ContextBuilder {
        ContextBuilder::new(Arc::new(tools), &ContextSection::default())
    }

    #[tokio::test]
    async fn test_all_sources_fail_still_has_every_key() {
        // 空注册表：每个来源都是 UnknownTool
        let ctx = builder(ToolRegistry::new()).build_super_context("hello", "s1").await;
        assert!(ctx.metadata.sources_available.is_empty());

        let value = serde_json::to_value(&ctx).unwrap();
        for key in SOURCE_NAMES {
            assert_eq!(value[key]["status"], "error", "source {key}");
            assert!(value[key]["error"].is_string());
        }
        assert!(value["metadata"]["total_context_size"].is_number());
    }

    #[tokio::test]
    async fn test_partial_failure_degrades_only_that_source() {
        let mut tools = ToolRegistry::new();
        tools.register(Fixed {
            kind: ToolKind::Memory,
            actions: &["get", "search"],
            reply: Ok(json!({ "messages": [{ "role": "user", "content": "earlier" }] })),
        });
        tools.register(Fixed {
            kind: ToolKind::Rag,
            actions: &["search"],
            reply: Ok(json!({ "results": [{ "text": "doc" }] })),
        });
        tools.register(Fixed {
            kind: ToolKind::Vision,
            actions: &["get_active_context"],
            reply: Ok(json!({ "window": "editor" })),
        });
        tools.register(Fixed {
            kind: ToolKind::System,
            actions: &["snapshot"],
            reply: Err(ToolError::timeout("snapshot timed out")),
        });

        let ctx = builder(tools).build_super_context("hello", "s1").await;

        assert_eq!(ctx.metadata.sources_available, vec!["memory", "rag_docs", "vision"]);
        assert_eq!(ctx.memory.payload.recent.len(), 1);
        assert_eq!(ctx.vision.payload.data["window"], "editor");
        assert_eq!(ctx.system_state.status, SourceStatus::Error);
        assert_eq!(ctx.system_state.error.as_deref(), Some("snapshot timed out"));
        assert!(ctx.metadata.total_context_size > 0);

        // rules 数据集失败被跳过，其余保留
        let docs = &ctx.rag_docs.payload.documents;
        assert_eq!(docs.len(), 3);
        assert!(!docs.contains_key("rules"));
    }

    #[test]
    fn test_as_list_shapes() {
        assert_eq!(as_list(json!([1, 2]), &["x"]).len(), 2);
        assert_eq!(as_list(json!({ "x": [1] }), &["x"]).len(), 1);
        assert!(as_list(json!({}), &["x"]).is_empty());
        assert!(as_list(Value::Null, &["x"]).is_empty());
    }

    #[test]
    fn test_summary_truncates() {
        let ctx = SuperContext::from_sources(
            ContextSource::degraded("x"),
            ContextSource::degraded("x"),
            ContextSource::degraded("x"),
            ContextSource::degraded("x"),
            ContextSource::degraded("x"),
            ContextSource::degraded("x"),
        );
        let summary = ctx.summary_for_prompt(10);
        assert_eq!(summary.chars().count(), 13);
        assert!(summary.ends_with("..."));
    }
}
