//! Memory 工具：会话消息的写入、最近 N 条、检索与清空（memory MCP 服务）

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct MemoryClient {
    http: ServiceClient,
}

#[derive(Deserialize)]
struct AddArgs {
    session_id: String,
    role: String,
    content: String,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Deserialize)]
struct GetArgs {
    session_id: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    3
}

#[derive(Deserialize)]
struct SessionArgs {
    session_id: String,
}

impl MemoryClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("memory", base_url, timeout_secs),
        }
    }

    pub async fn add(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<Value, ToolError> {
        self.http
            .post(
                "/memory/add",
                &json!({
                    "session_id": session_id,
                    "role": role,
                    "content": content,
                    "metadata": metadata,
                }),
            )
            .await
    }

    pub async fn get(&self, session_id: &str, limit: Option<usize>) -> Result<Value, ToolError> {
        let mut query = vec![("session_id", session_id.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.http.get_query("/memory/get", &query).await
    }

    pub async fn search(
        &self,
        query: &str,
        session_id: Option<&str>,
        top_k: usize,
    ) -> Result<Value, ToolError> {
        self.http
            .post(
                "/memory/search",
                &json!({ "query": query, "session_id": session_id, "top_k": top_k }),
            )
            .await
    }

    pub async fn clear(&self, session_id: &str) -> Result<Value, ToolError> {
        self.http
            .post("/memory/clear", &json!({ "session_id": session_id }))
            .await
    }
}

#[async_trait]
impl ToolClient for MemoryClient {
    fn kind(&self) -> ToolKind {
        ToolKind::Memory
    }

    fn actions(&self) -> &'static [&'static str] {
        &["add", "get", "search", "clear"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "add" => {
                let a: AddArgs = parse_args(kind, action, args)?;
                self.add(&a.session_id, &a.role, &a.content, a.metadata).await
            }
            "get" => {
                let a: GetArgs = parse_args(kind, action, args)?;
                self.get(&a.session_id, a.limit).await
            }
            "search" => {
                let a: SearchArgs = parse_args(kind, action, args)?;
                self.search(&a.query, a.session_id.as_deref(), a.top_k).await
            }
            "clear" => {
                let a: SessionArgs = parse_args(kind, action, args)?;
                self.clear(&a.session_id).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}
