//! Files 工具：读写、列目录、按模式搜索（files MCP 服务）

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct FilesClient {
    http: ServiceClient,
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct SearchArgs {
    pattern: String,
    #[serde(default)]
    root: Option<String>,
}

impl FilesClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("files", base_url, timeout_secs),
        }
    }

    pub async fn read_file(&self, path: &str) -> Result<Value, ToolError> {
        self.http.post("/files/read", &json!({ "path": path })).await
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<Value, ToolError> {
        self.http
            .post("/files/write", &json!({ "path": path, "content": content }))
            .await
    }

    pub async fn list_dir(&self, path: &str) -> Result<Value, ToolError> {
        self.http
            .get_query("/files/list", &[("path", path.to_string())])
            .await
    }

    pub async fn search_files(&self, pattern: &str, root: Option<&str>) -> Result<Value, ToolError> {
        self.http
            .post("/files/search", &json!({ "pattern": pattern, "root": root }))
            .await
    }
}

#[async_trait]
impl ToolClient for FilesClient {
    fn kind(&self) -> ToolKind {
        ToolKind::Files
    }

    fn actions(&self) -> &'static [&'static str] {
        &["read_file", "write_file", "list_dir", "search_files"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "read_file" => {
                let a: PathArgs = parse_args(kind, action, args)?;
                self.read_file(&a.path).await
            }
            "write_file" => {
                let a: WriteArgs = parse_args(kind, action, args)?;
                self.write_file(&a.path, &a.content).await
            }
            "list_dir" => {
                let a: PathArgs = parse_args(kind, action, args)?;
                self.list_dir(&a.path).await
            }
            "search_files" => {
                let a: SearchArgs = parse_args(kind, action, args)?;
                self.search_files(&a.pattern, a.root.as_deref()).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}
