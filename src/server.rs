//! HTTP 接口（axum）
//!
//! - POST /orchestrate/（及 /orchestrate）：完整编排
//! - POST /execute：单步直接执行（带重试）
//! - GET  /health：存活与已注册工具
//! - GET  /sessions、GET/DELETE /sessions/:id?limit=N：会话记录
//! - GET  /timeline/:id：执行时间线

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::{OrchestrateRequest, OrchestrateResponse, Orchestrator, OrchestratorError};
use crate::executor::{ExecutionResult, Step, TimelineEvent};
use crate::memory::SessionMessage;

pub type AppState = Arc<Orchestrator>;

/// 错误响应：{"error": "..."}
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        let status = match e {
            OrchestratorError::EmptyPrompt => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %e, "request failed");
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orchestrate/", post(orchestrate))
        .route("/orchestrate", post(orchestrate))
        .route("/execute", post(execute))
        .route("/health", get(health))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(session_history).delete(clear_session))
        .route("/timeline/:id", get(timeline))
        .with_state(state)
}

async fn orchestrate(
    State(state): State<AppState>,
    Json(req): Json<OrchestrateRequest>,
) -> Result<Json<OrchestrateResponse>, ApiError> {
    Ok(Json(state.orchestrate(req).await?))
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    step: Step,
    #[serde(default)]
    max_retries: Option<usize>,
}

async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Json<ExecutionResult> {
    Json(state.execute_step(&req.step, req.max_retries).await)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "tools": state.tools().tool_names() }))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn session_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<SessionMessage>>, ApiError> {
    Ok(Json(state.session_history(&id, q.limit).await?))
}

async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let existed = state.clear_session(&id).await?;
    Ok(Json(json!({ "session_id": id, "cleared": existed })))
}

async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.list_sessions().await?))
}

async fn timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<TimelineEvent>> {
    Json(state.timeline(&id).await)
}

/// 绑定地址并运行到进程结束（Ctrl+C 优雅退出）
pub async fn serve(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("copilot orchestrator listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
}
