//! RAG 工具：按数据集检索与写入（rag MCP 服务）

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct RagClient {
    http: ServiceClient,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    dataset: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    3
}

#[derive(Deserialize)]
struct IngestArgs {
    dataset: String,
    text: String,
    #[serde(default)]
    metadata: Option<Value>,
}

impl RagClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("rag", base_url, timeout_secs),
        }
    }

    pub async fn search(&self, query: &str, dataset: &str, top_k: usize) -> Result<Value, ToolError> {
        self.http
            .post(
                "/rag/search",
                &json!({ "query": query, "dataset": dataset, "top_k": top_k }),
            )
            .await
    }

    pub async fn ingest(
        &self,
        dataset: &str,
        text: &str,
        metadata: Option<Value>,
    ) -> Result<Value, ToolError> {
        self.http
            .post(
                "/rag/ingest",
                &json!({ "dataset": dataset, "text": text, "metadata": metadata }),
            )
            .await
    }
}

#[async_trait]
impl ToolClient for RagClient {
    fn kind(&self) -> ToolKind {
        ToolKind::Rag
    }

    fn actions(&self) -> &'static [&'static str] {
        &["search", "ingest"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "search" => {
                let a: SearchArgs = parse_args(kind, action, args)?;
                self.search(&a.query, &a.dataset, a.top_k).await
            }
            "ingest" => {
                let a: IngestArgs = parse_args(kind, action, args)?;
                self.ingest(&a.dataset, &a.text, a.metadata).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}
