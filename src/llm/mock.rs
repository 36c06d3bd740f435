//! Mock LLM 客户端（用于测试与无 API Key 的本地调试）
//!
//! 取最后一条 User 消息，回显为不含步骤的规划 JSON。

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(serde_json::json!({
            "response": format!("Echo from Mock: {}", last_user),
            "steps": [],
        })
        .to_string())
    }
}

/// 固定回复的客户端：测试中模拟模型给出指定计划
#[derive(Debug, Clone)]
pub struct ScriptedLlmClient {
    reply: String,
}

impl ScriptedLlmClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        Ok(self.reply.clone())
    }
}
