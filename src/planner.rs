//! Planner：拼装规划 prompt，并把模型输出解析为 {response, steps}
//!
//! 模型输出可以是 ```json 代码块、裸 JSON 对象或纯文本；纯文本视为不含步骤的直接回复。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::SuperContext;
use crate::core::OrchestratorError;
use crate::executor::Step;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::router::PreProcessResult;
use crate::tools::ToolRegistry;

/// 模型给出的回复与计划
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDraft {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// 解析模型输出；JSON 对象格式错误时返回 PlanParse
///
/// 以 `{` 开头的输出按 JSON 处理（被截断的对象同样报错）；
/// 夹在文本中的对象只有带 response 或 steps 时才采用，否则整段作为回复。
pub fn parse_plan(output: &str) -> Result<PlanDraft, OrchestratorError> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let body = rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());
        return decode_draft(body);
    }

    if trimmed.starts_with('{') {
        let body = match trimmed.rfind('}') {
            Some(end) => &trimmed[..=end],
            None => trimmed,
        };
        return match decode_draft(body) {
            Ok(draft) => Ok(draft),
            Err(e) if looks_like_json(trimmed) => Err(e),
            Err(_) => Ok(text_reply(trimmed)),
        };
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(draft) = decode_draft(&trimmed[start..=end]) {
                if !draft.response.is_empty() || !draft.steps.is_empty() {
                    return Ok(draft);
                }
            }
        }
    }

    Ok(text_reply(trimmed))
}

fn decode_draft(json_str: &str) -> Result<PlanDraft, OrchestratorError> {
    serde_json::from_str(json_str)
        .map_err(|e| OrchestratorError::PlanParse(format!("{}: {}", e, json_str)))
}

/// 没有右括号，或 `{` 后紧跟键名 / `}`
fn looks_like_json(text: &str) -> bool {
    if !text.contains('}') {
        return true;
    }
    matches!(text[1..].trim_start().chars().next(), Some('"') | Some('}'))
}

fn text_reply(text: &str) -> PlanDraft {
    PlanDraft {
        response: text.to_string(),
        steps: Vec::new(),
    }
}

/// system prompt：工具目录 + 输出约定
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    format!(
        r#"You are a desktop copilot orchestrator. Answer the user and, when actions on the
user's machine or services are needed, plan them as tool steps.

Available tools and actions:
{catalog}

Reply with a single JSON object and nothing else:
{{"response": "<answer shown to the user>", "steps": [{{"tool": "<tool>", "action": "<action>", "args": {{}}}}]}}

Rules:
- Use only the tools and actions listed above; "steps" may be empty.
- "args" is always a JSON object.
- system.kill_process and system.launch_app need "allow": true, set it only when the user explicitly asked for it."#,
        catalog = tools.to_catalog_json()
    )
}

pub struct Planner {
    tools: Arc<ToolRegistry>,
    context_chars: usize,
    history_messages: usize,
}

impl Planner {
    /// max_context_turns 轮对话 = 2 * max_context_turns 条消息
    pub fn new(tools: Arc<ToolRegistry>, context_chars: usize, max_context_turns: usize) -> Self {
        Self {
            tools,
            context_chars,
            history_messages: max_context_turns * 2,
        }
    }

    /// system prompt、上下文、最近历史、用户输入，依次拼装
    pub fn build_messages(
        &self,
        prompt: &str,
        context: &SuperContext,
        history: &[Message],
        pre: &PreProcessResult,
    ) -> Vec<Message> {
        let mut system = build_system_prompt(&self.tools);
        if let Some(intent) = pre.intention() {
            system.push_str(&format!("\n\nDetected intent: {}", intent.as_str()));
        }
        system.push_str("\n\nCurrent context (JSON):\n");
        system.push_str(&context.summary_for_prompt(self.context_chars));

        let skip = history.len().saturating_sub(self.history_messages);
        let mut messages = Vec::with_capacity(history.len() - skip + 2);
        messages.push(Message::system(system));
        messages.extend(history[skip..].iter().cloned());
        messages.push(Message::user(prompt.to_string()));
        messages
    }

    pub async fn plan(
        &self,
        llm: &dyn LlmClient,
        messages: &[Message],
    ) -> Result<PlanDraft, OrchestratorError> {
        let output = llm.complete(messages).await.map_err(OrchestratorError::Llm)?;
        let draft = parse_plan(&output)?;
        tracing::debug!(steps = draft.steps.len(), "plan parsed");
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextSection;
    use crate::context::ContextBuilder;
    use crate::llm::{MockLlmClient, ScriptedLlmClient};
    use crate::memory::Role;
    use crate::router::{AgentRegistry, MultiAgentRouter};

    #[test]
    fn test_parse_fenced_json() {
        let out = "Sure.\n```json\n{\"response\": \"ok\", \"steps\": [{\"tool\": \"files\", \"action\": \"list_dir\", \"args\": {\"path\": \".\"}}]}\n```";
        let draft = parse_plan(out).unwrap();
        assert_eq!(draft.response, "ok");
        assert_eq!(draft.steps.len(), 1);
        assert_eq!(draft.steps[0].action, "list_dir");
    }

    #[test]
    fn test_parse_bare_object_and_text() {
        let draft = parse_plan("{\"response\": \"hi\"}").unwrap();
        assert_eq!(draft.response, "hi");
        assert!(draft.steps.is_empty());

        let draft = parse_plan("  just talking  ").unwrap();
        assert_eq!(draft.response, "just talking");
        assert!(draft.steps.is_empty());
    }

    #[test]
    fn test_parse_malformed_object_is_error() {
        let err = parse_plan("{\"response\": ").unwrap_err();
        assert!(matches!(err, OrchestratorError::PlanParse(_)));
        assert!(matches!(
            parse_plan("{ broken"),
            Err(OrchestratorError::PlanParse(_))
        ));
        // 只有右括号在前的文本按纯文本处理
        assert!(parse_plan("} oops {").is_ok());
    }

    #[test]
    fn test_parse_text_with_braces_keeps_full_reply() {
        let code = "Here you go:\nfn main() {}";
        let draft = parse_plan(code).unwrap();
        assert_eq!(draft.response, code);
        assert!(draft.steps.is_empty());

        let draft = parse_plan("fn main() {}").unwrap();
        assert_eq!(draft.response, "fn main() {}");

        let draft = parse_plan("{x} or {y}").unwrap();
        assert_eq!(draft.response, "{x} or {y}");
        assert!(draft.steps.is_empty());
    }

    #[test]
    fn test_parse_object_embedded_in_prose() {
        let draft = parse_plan("Sure: {\"response\": \"ok\", \"steps\": []} done").unwrap();
        assert_eq!(draft.response, "ok");
        assert!(draft.steps.is_empty());
    }

    #[tokio::test]
    async fn test_build_messages_limits_history() {
        let tools = Arc::new(ToolRegistry::new());
        let planner = Planner::new(tools.clone(), 500, 1);
        let ctx = ContextBuilder::new(tools, &ContextSection::default())
            .build_super_context("hi", "s")
            .await;
        let router = MultiAgentRouter::new(Arc::new(AgentRegistry::defaults()), 100);
        let pre = router.pre_process("hello there");

        let history = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
            Message::assistant("four"),
        ];
        let messages = planner.build_messages("five", &ctx, &history, &pre);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Detected intent: general"));
        assert_eq!(messages[1].content, "three");
        assert_eq!(messages[3].content, "five");

        let draft = planner.plan(&MockLlmClient, &messages).await.unwrap();
        assert_eq!(draft.response, "Echo from Mock: five");

        let err = planner
            .plan(&ScriptedLlmClient::new("{ broken"), &messages)
            .await;
        // 截断的对象
        assert!(matches!(err, Err(OrchestratorError::PlanParse(_))));
    }
}
