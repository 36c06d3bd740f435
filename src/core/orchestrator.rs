//! 编排器：一次 /orchestrate/ 请求的完整流程
//!
//! 构建 SuperContext → 路由流水线（选中 Agent 的模型负责规划）→ 按执行模式执行计划 → 写入会话。
//! Orchestrator 独占 ToolRegistry（Arc），ContextBuilder / McpExecutor / Planner 共享同一个 Arc。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::context::{ContextBuilder, SuperContext};
use crate::core::OrchestratorError;
use crate::executor::{DryRunReport, ExecutionResult, McpExecutor, Step, TimelineEvent};
use crate::llm::ModelPool;
use crate::memory::{Message, Role, SessionMessage, SessionStore};
use crate::planner::Planner;
use crate::router::{AgentBackend, AgentRegistry, MultiAgentRouter, PreProcessResult, RouteDecision};
use crate::tools::{ToolKind, ToolRegistry};

/// 执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// 顺序执行全部步骤
    Auto,
    /// 含 system / control 步骤时不执行，等待确认
    Safe,
    Parallel,
    /// 只校验不执行
    DryRun,
}

impl ExecutionMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(ExecutionMode::Auto),
            "safe" => Some(ExecutionMode::Safe),
            "parallel" => Some(ExecutionMode::Parallel),
            "dry_run" | "dry-run" | "dryrun" => Some(ExecutionMode::DryRun),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Auto => "auto",
            ExecutionMode::Safe => "safe",
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::DryRun => "dry_run",
        }
    }
}

/// POST /orchestrate/ 请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestrateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub execution_mode: Option<String>,
}

impl OrchestrateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.execution_mode = Some(mode.into());
        self
    }
}

/// POST /orchestrate/ 响应体
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrateResponse {
    pub intention: String,
    pub confidence: f64,
    pub response: String,
    pub execution_results: Vec<ExecutionResult>,
    pub steps: Vec<Step>,
    pub requires_confirmation: bool,
    pub execution_mode_used: ExecutionMode,
    pub session_id: String,
    pub agent_used: String,
    pub model_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<DryRunReport>,
}

pub struct Orchestrator {
    tools: Arc<ToolRegistry>,
    context: ContextBuilder,
    router: MultiAgentRouter,
    executor: McpExecutor,
    planner: Planner,
    models: ModelPool,
    sessions: SessionStore,
    default_mode: ExecutionMode,
    max_retries: usize,
    history_limit: usize,
}

impl Orchestrator {
    /// 按配置构建全部组件（工具客户端、Agent 注册表、模型池）
    pub fn from_config(cfg: &AppConfig) -> Self {
        let tools = Arc::new(ToolRegistry::from_config(cfg));
        let agents = Arc::new(AgentRegistry::from_config(&cfg.router.agents));
        let models = ModelPool::from_config(cfg, &agents, tools.clone());
        tracing::info!(
            tools = ?tools.tool_names(),
            agents = agents.len(),
            "orchestrator components ready"
        );
        Self::new(cfg, tools, agents, models)
    }

    /// 由已构建的组件组装（测试中注入桩工具与脚本化模型）
    pub fn new(
        cfg: &AppConfig,
        tools: Arc<ToolRegistry>,
        agents: Arc<AgentRegistry>,
        models: ModelPool,
    ) -> Self {
        let default_mode = ExecutionMode::parse(&cfg.executor.default_mode).unwrap_or_else(|| {
            tracing::warn!(mode = %cfg.executor.default_mode, "unknown default execution mode, using safe");
            ExecutionMode::Safe
        });
        Self {
            context: ContextBuilder::new(tools.clone(), &cfg.context),
            router: MultiAgentRouter::new(agents, cfg.router.max_output_chars),
            executor: McpExecutor::new(tools.clone(), cfg.executor.retry_delay_ms),
            planner: Planner::new(
                tools.clone(),
                cfg.context.prompt_context_chars,
                cfg.app.max_context_turns,
            ),
            tools,
            models,
            sessions: SessionStore::new(&cfg.app.session_dir),
            default_mode,
            max_retries: cfg.executor.max_retries,
            history_limit: cfg.app.max_context_turns * 2,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn session_dir(&self) -> &Path {
        self.sessions.dir()
    }

    pub async fn orchestrate(
        &self,
        req: OrchestrateRequest,
    ) -> Result<OrchestrateResponse, OrchestratorError> {
        let prompt = req.prompt.trim();
        if prompt.is_empty() {
            return Err(OrchestratorError::EmptyPrompt);
        }
        let session_id = req
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mode = req
            .execution_mode
            .as_deref()
            .and_then(ExecutionMode::parse)
            .unwrap_or(self.default_mode);

        tracing::info!(session_id = %session_id, mode = mode.as_str(), "orchestrate");

        let history = self.recent_history(&session_id).await;
        let context = self.context.build_super_context(prompt, &session_id).await;

        let backend = PlanningBackend {
            planner: &self.planner,
            models: &self.models,
            context: &context,
            history: &history,
        };
        let outcome = self.router.process_message(prompt, &backend).await;

        let result = &outcome.post_processing.result;
        let response = result
            .get("response")
            .and_then(Value::as_str)
            .or_else(|| result.get("error").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        let steps: Vec<Step> = result
            .get("steps")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let mut requires_confirmation = false;
        let mut dry_run = None;
        let execution_results = match mode {
            ExecutionMode::DryRun => {
                dry_run = Some(self.executor.dry_run(&steps));
                Vec::new()
            }
            _ if steps.is_empty() => Vec::new(),
            ExecutionMode::Auto => self.executor.execute_plan(&steps, &session_id).await,
            ExecutionMode::Parallel => self.executor.execute_parallel(&steps).await,
            ExecutionMode::Safe => {
                if steps.iter().any(is_sensitive_step) {
                    requires_confirmation = true;
                    tracing::info!(session_id = %session_id, steps = steps.len(), "plan awaits confirmation");
                    Vec::new()
                } else {
                    self.executor.execute_plan(&steps, &session_id).await
                }
            }
        };

        let intention = outcome
            .pre_processing
            .intention()
            .map(|i| i.as_str())
            .unwrap_or("general")
            .to_string();

        self.persist(
            &session_id,
            prompt,
            &response,
            json!({ "execution_mode": mode.as_str() }),
            json!({
                "intention": intention,
                "agent_used": outcome.agent_used,
                "model_used": outcome.model_used,
                "confidence": outcome.routing.confidence,
                "steps": steps.len(),
                "requires_confirmation": requires_confirmation,
            }),
        )
        .await;

        Ok(OrchestrateResponse {
            intention,
            confidence: outcome.routing.confidence,
            response,
            execution_results,
            steps,
            requires_confirmation,
            execution_mode_used: mode,
            session_id,
            agent_used: outcome.agent_used,
            model_used: outcome.model_used,
            dry_run,
        })
    }

    /// 单步直接执行（带重试），不经过规划
    ///
    /// 请求里的重试次数不超过 `[executor].max_retries`
    pub async fn execute_step(&self, step: &Step, max_retries: Option<usize>) -> ExecutionResult {
        let ceiling = self.max_retries.max(1);
        let attempts = max_retries.unwrap_or(ceiling).clamp(1, ceiling);
        self.executor.execute_with_retry(step, attempts).await
    }

    pub async fn session_history(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SessionMessage>, OrchestratorError> {
        Ok(self.sessions.get(session_id, limit).await?)
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<bool, OrchestratorError> {
        self.executor.timeline().clear(session_id).await;
        Ok(self.sessions.clear(session_id).await?)
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>, OrchestratorError> {
        Ok(self.sessions.list_sessions().await?)
    }

    pub async fn timeline(&self, session_id: &str) -> Vec<TimelineEvent> {
        self.executor.timeline().events(session_id).await
    }

    async fn recent_history(&self, session_id: &str) -> Vec<Message> {
        match self.sessions.get(session_id, Some(self.history_limit)).await {
            Ok(messages) => messages.iter().map(SessionMessage::to_message).collect(),
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "session history unavailable");
                Vec::new()
            }
        }
    }

    /// 写会话失败不影响本次响应
    async fn persist(&self, session_id: &str, prompt: &str, response: &str, user_meta: Value, assistant_meta: Value) {
        if let Err(e) = self
            .sessions
            .add_message(session_id, Role::User, prompt, Some(user_meta))
            .await
        {
            tracing::warn!(session_id = %session_id, error = %e, "failed to persist user message");
            return;
        }
        if let Err(e) = self
            .sessions
            .add_message(session_id, Role::Assistant, response, Some(assistant_meta))
            .await
        {
            tracing::warn!(session_id = %session_id, error = %e, "failed to persist assistant message");
        }
    }
}

fn is_sensitive_step(step: &Step) -> bool {
    step.tool
        .parse::<ToolKind>()
        .map(|k| k.is_sensitive())
        .unwrap_or(false)
}

/// 选中 Agent 的规划后端：用该 Agent 的模型生成 {response, steps}
struct PlanningBackend<'a> {
    planner: &'a Planner,
    models: &'a ModelPool,
    context: &'a SuperContext,
    history: &'a [Message],
}

#[async_trait]
impl<'a> AgentBackend for PlanningBackend<'a> {
    async fn invoke(&self, route: &RouteDecision, pre: &PreProcessResult, message: &str) -> Value {
        let llm = self.models.client_for(&route.model_config.model);
        let messages = self
            .planner
            .build_messages(message, self.context, self.history, pre);
        match self.planner.plan(llm.as_ref(), &messages).await {
            Ok(draft) => json!({ "response": draft.response, "steps": draft.steps }),
            Err(e) => {
                tracing::error!(agent = %route.selected_agent, error = %e, "planning failed");
                json!({ "status": "error", "error": e.to_string() })
            }
        }
    }
}
