//! System 工具：系统快照、进程列表、结束进程、启动应用（system MCP 服务）
//!
//! kill_process / launch_app 需要请求中显式 allow=true；缺失或为 false 时返回 Unauthorized，
//! 不发出任何请求（用户侧授权失败，不是服务端故障）。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct SystemClient {
    http: ServiceClient,
}

#[derive(Deserialize)]
struct KillArgs {
    name: String,
    #[serde(default)]
    allow: bool,
}

#[derive(Deserialize)]
struct LaunchArgs {
    name: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    allow: bool,
}

impl SystemClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("system", base_url, timeout_secs),
        }
    }

    pub async fn snapshot(&self) -> Result<Value, ToolError> {
        self.http.get("/system/snapshot").await
    }

    pub async fn list_processes(&self) -> Result<Value, ToolError> {
        self.http.get("/system/processes").await
    }

    pub async fn kill_process(&self, name: &str, allow: bool) -> Result<Value, ToolError> {
        if !allow {
            return Err(ToolError::unauthorized("system", "kill_process"));
        }
        tracing::warn!(process = %name, "kill_process authorised");
        self.http
            .post("/system/kill", &json!({ "name": name, "allow": true }))
            .await
    }

    pub async fn launch_app(&self, name: &str, args: &[String], allow: bool) -> Result<Value, ToolError> {
        if !allow {
            return Err(ToolError::unauthorized("system", "launch_app"));
        }
        tracing::info!(app = %name, "launch_app authorised");
        self.http
            .post(
                "/system/launch",
                &json!({ "name": name, "args": args, "allow": true }),
            )
            .await
    }
}

#[async_trait]
impl ToolClient for SystemClient {
    fn kind(&self) -> ToolKind {
        ToolKind::System
    }

    fn actions(&self) -> &'static [&'static str] {
        &["snapshot", "list_processes", "kill_process", "launch_app"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "snapshot" => self.snapshot().await,
            "list_processes" => self.list_processes().await,
            "kill_process" => {
                let a: KillArgs = parse_args(kind, action, args)?;
                self.kill_process(&a.name, a.allow).await
            }
            "launch_app" => {
                let a: LaunchArgs = parse_args(kind, action, args)?;
                self.launch_app(&a.name, &a.args, a.allow).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_kill_without_allow_is_unauthorized() {
        // 端口 9 无服务；若真的发出请求会得到 Connection 错误
        let client = SystemClient::new("http://127.0.0.1:9", 1);
        let args = json!({ "name": "notepad.exe" }).as_object().cloned().unwrap();
        let err = client.call("kill_process", args).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert!(!err.is_critical());
    }

    #[tokio::test]
    async fn test_launch_with_allow_false_is_unauthorized() {
        let client = SystemClient::new("http://127.0.0.1:9", 1);
        let args = json!({ "name": "calc", "allow": false }).as_object().cloned().unwrap();
        let err = client.call("launch_app", args).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }
}
