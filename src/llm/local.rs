//! 本地模型后端：经由 llm 工具（本地模型 MCP 服务）实现 LlmClient

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::{ToolKind, ToolRegistry};

/// 通过注册表中的 llm 工具调用本地模型；与编排器共享同一个注册表
pub struct LocalLlmBackend {
    tools: Arc<ToolRegistry>,
    model: Option<String>,
}

impl LocalLlmBackend {
    pub fn new(tools: Arc<ToolRegistry>, model: Option<String>) -> Self {
        Self { tools, model }
    }
}

/// 从本地服务的响应中取文本（response / text / content / message.content）
fn extract_text(value: &Value) -> Option<String> {
    ["response", "text", "content"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .or_else(|| {
            value
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

#[async_trait]
impl LlmClient for LocalLlmBackend {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let payload: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();
        let result = self
            .tools
            .call(
                ToolKind::Llm,
                "chat",
                json!({ "messages": payload, "model": self.model }),
            )
            .await
            .map_err(|e| e.to_string())?;
        match result {
            Value::String(s) => Ok(s),
            other => extract_text(&other)
                .ok_or_else(|| format!("local model returned no text: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_variants() {
        assert_eq!(extract_text(&json!({"response": "a"})).as_deref(), Some("a"));
        assert_eq!(extract_text(&json!({"text": "b"})).as_deref(), Some("b"));
        assert_eq!(
            extract_text(&json!({"message": {"role": "assistant", "content": "c"}})).as_deref(),
            Some("c")
        );
        assert!(extract_text(&json!({"foo": 1})).is_none());
    }
}
