//! Web 搜索工具（search MCP 服务）

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct SearchClient {
    http: ServiceClient,
}

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    5
}

impl SearchClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("search", base_url, timeout_secs),
        }
    }

    pub async fn web_search(&self, query: &str, max_results: usize) -> Result<Value, ToolError> {
        if query.trim().is_empty() {
            return Err(ToolError::invalid_args("Missing query"));
        }
        tracing::info!(query = %query, "web search");
        self.http
            .post(
                "/search",
                &json!({ "query": query, "max_results": max_results }),
            )
            .await
    }
}

#[async_trait]
impl ToolClient for SearchClient {
    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    fn actions(&self) -> &'static [&'static str] {
        &["web_search"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "web_search" => {
                let a: WebSearchArgs = parse_args(kind, action, args)?;
                self.web_search(&a.query, a.max_results).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[tokio::test]
    async fn test_empty_query_rejected_before_request() {
        let client = SearchClient::new("http://127.0.0.1:9", 1);
        let err = client.web_search("   ", 5).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgs);
    }
}
