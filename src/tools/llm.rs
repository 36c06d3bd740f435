//! 本地模型工具：generate / chat（local-LLM MCP 服务）

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct LocalLlmToolClient {
    http: ServiceClient,
}

#[derive(Deserialize)]
struct GenerateArgs {
    prompt: String,
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatArgs {
    messages: Vec<Value>,
    #[serde(default)]
    model: Option<String>,
}

impl LocalLlmToolClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("llm", base_url, timeout_secs),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        model: Option<&str>,
    ) -> Result<Value, ToolError> {
        self.http
            .post(
                "/llm/generate",
                &json!({ "prompt": prompt, "system": system, "model": model }),
            )
            .await
    }

    pub async fn chat(&self, messages: &[Value], model: Option<&str>) -> Result<Value, ToolError> {
        self.http
            .post("/llm/chat", &json!({ "messages": messages, "model": model }))
            .await
    }
}

#[async_trait]
impl ToolClient for LocalLlmToolClient {
    fn kind(&self) -> ToolKind {
        ToolKind::Llm
    }

    fn actions(&self) -> &'static [&'static str] {
        &["generate", "chat"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "generate" => {
                let a: GenerateArgs = parse_args(kind, action, args)?;
                self.generate(&a.prompt, a.system.as_deref(), a.model.as_deref())
                    .await
            }
            "chat" => {
                let a: ChatArgs = parse_args(kind, action, args)?;
                self.chat(&a.messages, a.model.as_deref()).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}
