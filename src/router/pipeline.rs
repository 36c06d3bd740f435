//! 多智能体路由流水线
//!
//! Idle → PreProcessing → Routing → PostProcessing → Done，严格按序执行，每一阶段消费上一阶段的输出：
//! - pre_process：关键词识别意图；无命中时返回 Skipped（正常的快捷路径，不是错误）
//! - route：按能力在 AgentRegistry 中选 Agent（优先级最高，平局取先注册者）
//! - 由 AgentBackend 调用选中的 Agent 得到原始结果
//! - post_process：补齐 status、裁剪空白、截断过长输出
//!
//! 各阶段对正常输入不返回错误；意外情况由调用方在 process_message 处理。

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::router::intent::{classify, Intent};
use crate::router::{AgentConfig, AgentRegistry};

/// 预处理不调用模型时报告的执行者
pub const KEYWORD_CLASSIFIER: &str = "keyword_classifier";
/// 后处理执行者
pub const FORMATTER: &str = "formatter";

const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterStage {
    Idle,
    PreProcessing,
    Routing,
    PostProcessing,
    Done,
}

/// 预处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreProcessResult {
    Success {
        intention: Intent,
        tasks: Vec<String>,
        agent_used: String,
        processed_message: String,
        keyword_hits: usize,
    },
    Skipped {
        processed_message: String,
    },
}

impl PreProcessResult {
    pub fn intention(&self) -> Option<Intent> {
        match self {
            PreProcessResult::Success { intention, .. } => Some(*intention),
            PreProcessResult::Skipped { .. } => None,
        }
    }

    pub fn processed_message(&self) -> &str {
        match self {
            PreProcessResult::Success {
                processed_message, ..
            }
            | PreProcessResult::Skipped { processed_message } => processed_message,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PreProcessResult::Skipped { .. })
    }
}

/// 路由决策
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub selected_agent: String,
    pub model_config: AgentConfig,
    pub routing_reason: String,
    /// 启发式分数 [0, 1]，仅用于相对比较
    pub confidence: f64,
}

/// 后处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostProcessResult {
    pub status: String,
    pub tasks: Vec<String>,
    pub agent_used: String,
    pub result: Value,
}

/// process_message 的完整输出
#[derive(Debug, Clone, Serialize)]
pub struct RouterOutcome {
    pub pre_processing: PreProcessResult,
    pub routing: RouteDecision,
    pub post_processing: PostProcessResult,
    pub agent_used: String,
    pub model_used: String,
}

/// 被选中 Agent 的执行后端：返回原始 JSON 结果（失败也以 {"status": "error"} 表达）
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn invoke(&self, route: &RouteDecision, pre: &PreProcessResult, message: &str) -> Value;
}

/// 多智能体路由器；注册表只读共享
pub struct MultiAgentRouter {
    registry: Arc<AgentRegistry>,
    max_output_chars: usize,
}

impl MultiAgentRouter {
    pub fn new(registry: Arc<AgentRegistry>, max_output_chars: usize) -> Self {
        Self {
            registry,
            max_output_chars,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    fn enter(&self, stage: RouterStage) {
        tracing::debug!(stage = ?stage, "router stage");
    }

    /// 三阶段流水线
    pub async fn process_message(&self, message: &str, backend: &dyn AgentBackend) -> RouterOutcome {
        self.enter(RouterStage::PreProcessing);
        let pre = self.pre_process(message);

        self.enter(RouterStage::Routing);
        let routing = self.route(message, &pre);
        tracing::info!(
            agent = %routing.selected_agent,
            model = %routing.model_config.model,
            reason = %routing.routing_reason,
            confidence = routing.confidence,
            "routed"
        );

        let raw = backend.invoke(&routing, &pre, pre.processed_message()).await;

        self.enter(RouterStage::PostProcessing);
        let post = self.post_process(raw, message);
        self.enter(RouterStage::Done);

        RouterOutcome {
            agent_used: routing.selected_agent.clone(),
            model_used: routing.model_config.model.clone(),
            pre_processing: pre,
            routing,
            post_processing: post,
        }
    }

    /// 预处理：归一空白、识别意图；无关键词命中时 Skipped
    pub fn pre_process(&self, message: &str) -> PreProcessResult {
        let processed = normalize_whitespace(message);
        let Some(classification) = classify(&processed) else {
            return PreProcessResult::Skipped {
                processed_message: processed,
            };
        };

        let mut tasks = vec!["classify_intent".to_string()];
        if processed != message {
            tasks.push("normalize_whitespace".to_string());
        }
        if message.contains("```") {
            tasks.push("extract_code_block".to_string());
        }
        match classification.intent {
            Intent::Vision => tasks.push("attach_screen_context".to_string()),
            Intent::ComplexAnalysis => tasks.push("decompose_request".to_string()),
            _ => {}
        }

        PreProcessResult::Success {
            intention: classification.intent,
            tasks,
            agent_used: KEYWORD_CLASSIFIER.to_string(),
            processed_message: processed,
            keyword_hits: classification.hits,
        }
    }

    /// 路由：按意图能力选 Agent；没有具备该能力的 Agent 时回退到全表优先级最高者
    pub fn route(&self, _message: &str, pre: &PreProcessResult) -> RouteDecision {
        let capability = pre.intention().unwrap_or(Intent::General).capability();

        if let Some((name, config)) = self.registry.best_for(capability) {
            let (confidence, reason) = match pre {
                PreProcessResult::Success {
                    intention,
                    keyword_hits,
                    ..
                } => (
                    0.6 + 0.1 * (*keyword_hits).min(3) as f64,
                    format!(
                        "intent '{}' matched capability '{}' (priority {})",
                        intention.as_str(),
                        capability,
                        config.priority
                    ),
                ),
                PreProcessResult::Skipped { .. } => (
                    0.5,
                    format!(
                        "no intent keywords; default capability '{}' (priority {})",
                        capability, config.priority
                    ),
                ),
            };
            return RouteDecision {
                selected_agent: name.to_string(),
                model_config: config.clone(),
                routing_reason: reason,
                confidence: confidence.min(1.0),
            };
        }

        match self.registry.highest_priority() {
            Some((name, config)) => RouteDecision {
                selected_agent: name.to_string(),
                model_config: config.clone(),
                routing_reason: format!("fallback: no agent with capability '{capability}'"),
                confidence: 0.3,
            },
            None => RouteDecision {
                selected_agent: "none".to_string(),
                model_config: AgentConfig::new("local", 0, &[]),
                routing_reason: "fallback: agent registry is empty".to_string(),
                confidence: 0.0,
            },
        }
    }

    /// 后处理：补齐缺失字段、裁剪空白、截断；已有的 status 不改写
    pub fn post_process(&self, result: Value, message: &str) -> PostProcessResult {
        let mut tasks = Vec::new();

        let mut result = match result {
            Value::Object(map) => map,
            other => {
                tasks.push("wrap_result".to_string());
                let mut map = serde_json::Map::new();
                map.insert("response".to_string(), other);
                map
            }
        };

        let status = match result.get("status").and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => {
                tasks.push("normalize_status".to_string());
                result.insert("status".to_string(), json!("success"));
                "success".to_string()
            }
        };

        let limit = if wants_brief(message) {
            tasks.push("brief_mode".to_string());
            (self.max_output_chars / 4).max(1)
        } else {
            self.max_output_chars
        };

        if let Some(Value::String(text)) = result.get_mut("response") {
            let trimmed = text.trim();
            if trimmed.len() != text.len() {
                *text = trimmed.to_string();
                tasks.push("trim_whitespace".to_string());
            }
            if text.chars().count() > limit {
                *text = text.chars().take(limit).collect::<String>() + TRUNCATION_MARKER;
                tasks.push("truncate".to_string());
            }
        }

        PostProcessResult {
            status,
            tasks,
            agent_used: FORMATTER.to_string(),
            result: Value::Object(result),
        }
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn wants_brief(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["briefly", "tl;dr", "tldr", "in one sentence", "简短", "一句话"]
        .iter()
        .any(|k| lower.contains(k))
}
