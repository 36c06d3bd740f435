//! MCP 服务 HTTP 传输层
//!
//! 所有工具客户端共用：GET / POST JSON，带单次调用超时；
//! 失败一律转为 ToolError，ErrorKind 由传输层显式给出（连接 / 超时 / 401·403 / 其它状态 / 解析 / 远端 error）。

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::core::{ErrorKind, ToolError};

/// 单个 MCP 服务的 HTTP 客户端
#[derive(Debug, Clone)]
pub struct ServiceClient {
    service: &'static str,
    base_url: String,
    http: Client,
}

impl ServiceClient {
    pub fn new(service: &'static str, base_url: &str, timeout_secs: u64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("copilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str) -> Result<Value, ToolError> {
        self.get_query(path, &[]).await
    }

    pub async fn get_query(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ToolError> {
        let url = self.url(path);
        tracing::debug!(service = self.service, url = %url, "GET");
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.read_json(resp).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ToolError> {
        let url = self.url(path);
        tracing::debug!(service = self.service, url = %url, "POST");
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.read_json(resp).await
    }

    fn transport_error(&self, e: reqwest::Error) -> ToolError {
        let kind = if e.is_timeout() {
            ErrorKind::Timeout
        } else if e.is_connect() {
            ErrorKind::Connection
        } else if e.is_decode() {
            ErrorKind::InvalidResponse
        } else {
            ErrorKind::Http
        };
        ToolError::new(kind, format!("{} service: {}", self.service, e))
    }

    async fn read_json(&self, resp: Response) -> Result<Value, ToolError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(self.service, status, &body));
        }
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        let value: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).map_err(|e| {
                ToolError::new(
                    ErrorKind::InvalidResponse,
                    format!("{} service returned invalid JSON: {}", self.service, e),
                )
            })?
        };
        check_remote_status(self.service, value)
    }
}

/// 非 2xx 状态映射
fn status_error(service: &str, status: StatusCode, body: &str) -> ToolError {
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Permission,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Timeout,
        _ => ErrorKind::Http,
    };
    ToolError::new(
        kind,
        format!("{} service HTTP {}: {}", service, status, preview(body, 200)),
    )
}

/// 服务以 {"status": "error", "error": ...} 报告的失败转为 Remote
fn check_remote_status(service: &str, value: Value) -> Result<Value, ToolError> {
    if value.get("status").and_then(Value::as_str) == Some("error") {
        let message = value
            .get("error")
            .or_else(|| value.get("detail"))
            .or_else(|| value.get("message"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| format!("{service} service reported an error"));
        return Err(ToolError::new(ErrorKind::Remote, message));
    }
    Ok(value)
}

fn preview(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}
