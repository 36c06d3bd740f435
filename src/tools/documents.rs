//! Documents 工具：文档上下文、列表与生成（documents MCP 服务）

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct DocumentsClient {
    http: ServiceClient,
}

#[derive(Deserialize)]
struct CreateArgs {
    title: String,
    content: String,
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "markdown".to_string()
}

impl DocumentsClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("documents", base_url, timeout_secs),
        }
    }

    pub async fn get_context(&self) -> Result<Value, ToolError> {
        self.http.get("/documents/context").await
    }

    pub async fn list_documents(&self) -> Result<Value, ToolError> {
        self.http.get("/documents/list").await
    }

    pub async fn create_document(&self, title: &str, content: &str, format: &str) -> Result<Value, ToolError> {
        self.http
            .post(
                "/documents/create",
                &json!({ "title": title, "content": content, "format": format }),
            )
            .await
    }
}

#[async_trait]
impl ToolClient for DocumentsClient {
    fn kind(&self) -> ToolKind {
        ToolKind::Documents
    }

    fn actions(&self) -> &'static [&'static str] {
        &["get_context", "list_documents", "create_document"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "get_context" => self.get_context().await,
            "list_documents" => self.list_documents().await,
            "create_document" => {
                let a: CreateArgs = parse_args(kind, action, args)?;
                self.create_document(&a.title, &a.content, &a.format).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}
