//! 编排全流程集成测试：桩工具 + 脚本化模型，经由 HTTP 路由驱动

#![cfg(feature = "server")]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use copilot::config::AppConfig;
use copilot::core::{ErrorKind, ToolError};
use copilot::llm::{ModelPool, ScriptedLlmClient};
use copilot::router::AgentRegistry;
use copilot::server;
use copilot::tools::{ToolClient, ToolKind, ToolRegistry};
use copilot::{OrchestrateRequest, Orchestrator};

struct FakeFiles;

#[async_trait]
impl ToolClient for FakeFiles {
    fn kind(&self) -> ToolKind {
        ToolKind::Files
    }

    fn actions(&self) -> &'static [&'static str] {
        &["read_file", "write_file", "list_dir", "search_files"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        match action {
            "list_dir" => Ok(json!({ "entries": ["notes.txt", "todo.md"] })),
            "read_file" => Ok(json!({ "content": format!("contents of {}", args["path"]) })),
            _ => Err(ToolError::new(ErrorKind::Remote, "read-only fake")),
        }
    }
}

/// 进程管理服务不可达
struct DownSystem;

#[async_trait]
impl ToolClient for DownSystem {
    fn kind(&self) -> ToolKind {
        ToolKind::System
    }

    fn actions(&self) -> &'static [&'static str] {
        &["snapshot", "list_processes", "kill_process", "launch_app"]
    }

    async fn call(&self, _action: &str, _args: Map<String, Value>) -> Result<Value, ToolError> {
        Err(ToolError::connection("Connection refused"))
    }
}

const PLAN: &str = r#"Here is the plan:
```json
{
  "response": "Listing your files, then closing notepad.",
  "steps": [
    {"tool": "files", "action": "list_dir", "args": {"path": "~"}},
    {"tool": "system", "action": "kill_process", "args": {"name": "notepad", "allow": true}},
    {"tool": "files", "action": "read_file", "args": {"path": "notes.txt"}}
  ]
}
```"#;

fn orchestrator(dir: &std::path::Path) -> Arc<Orchestrator> {
    let mut cfg = AppConfig::default();
    cfg.app.session_dir = dir.to_path_buf();

    let mut tools = ToolRegistry::new();
    tools.register(FakeFiles);
    tools.register(DownSystem);

    Arc::new(Orchestrator::new(
        &cfg,
        Arc::new(tools),
        Arc::new(AgentRegistry::defaults()),
        ModelPool::new(Arc::new(ScriptedLlmClient::new(PLAN))),
    ))
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_auto_mode_stops_after_critical_step() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path());

    let resp = orch
        .orchestrate(
            OrchestrateRequest::new("list my files and kill notepad")
                .session("flow-1")
                .mode("auto"),
        )
        .await
        .unwrap();

    assert_eq!(resp.steps.len(), 3);
    assert_eq!(resp.execution_results.len(), 2);
    assert!(resp.execution_results[0].is_success());
    assert!(resp.execution_results[1].is_critical());
    assert_eq!(
        resp.execution_results[1].error_message(),
        Some("Connection refused")
    );
    assert!(!resp.requires_confirmation);
    assert_eq!(resp.response, "Listing your files, then closing notepad.");

    let events = orch.timeline("flow-1").await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].total_steps, 3);
}

#[tokio::test]
async fn test_safe_mode_requires_confirmation_for_system_steps() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path());

    let resp = orch
        .orchestrate(OrchestrateRequest::new("kill notepad").session("flow-2"))
        .await
        .unwrap();
    assert!(resp.requires_confirmation);
    assert!(resp.execution_results.is_empty());
    assert_eq!(resp.agent_used, "local_operator");
    assert_eq!(resp.model_used, "local-llama");
    assert_eq!(resp.intention, "system");
}

#[tokio::test]
async fn test_parallel_mode_runs_every_step() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path());

    let resp = orch
        .orchestrate(OrchestrateRequest::new("do it all").mode("parallel"))
        .await
        .unwrap();
    assert_eq!(resp.execution_results.len(), 3);
    assert!(resp.execution_results[2].is_success());
}

#[tokio::test]
async fn test_http_orchestrate_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::router(orchestrator(dir.path()));

    let (status, body) = send(app.clone(), post_json("/orchestrate/", json!({ "prompt": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("empty"));

    let (status, body) = send(
        app.clone(),
        post_json(
            "/orchestrate/",
            json!({ "prompt": "list my files", "session_id": "web-1", "execution_mode": "auto" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "web-1");
    assert_eq!(body["execution_mode_used"], "auto");
    assert_eq!(body["execution_results"][1]["status"], "error");
    assert_eq!(body["execution_results"][1]["critical"], true);
    assert!(body["execution_results"][0].get("critical").is_none());
    assert!(body.get("dry_run").is_none());

    let (status, body) = send(app.clone(), get("/sessions/web-1?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "assistant");

    let (_, body) = send(app.clone(), get("/timeline/web-1")).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["type"], "execution");

    let (_, body) = send(app.clone(), get("/health")).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tools"], json!(["files", "system"]));

    let (_, body) = send(app, get("/sessions")).await;
    assert_eq!(body, json!(["web-1"]));
}

#[tokio::test]
async fn test_http_execute_unknown_tool() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::router(orchestrator(dir.path()));

    let (status, body) = send(
        app,
        post_json(
            "/execute",
            json!({ "step": { "tool": "unknown_tool", "action": "x", "args": {} }, "max_retries": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "error", "tool": "unknown_tool", "action": "x", "error": "Failed after 1 attempts: Unknown tool: unknown_tool" })
    );
}
