//! 模型池：模型名 -> LlmClient，未配置连接器的模型统一走回退客户端
//!
//! 远端连接器的 API Key 在启动时读取；缺失只影响该连接器（记录 error 后不注册），其余模型不受影响。

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{LlmClient, LocalLlmBackend, OpenAiClient};
use crate::router::AgentRegistry;
use crate::tools::ToolRegistry;

/// 以 local 开头的模型名走本地模型服务
pub const LOCAL_MODEL_PREFIX: &str = "local";

pub struct ModelPool {
    clients: HashMap<String, Arc<dyn LlmClient>>,
    fallback: Arc<dyn LlmClient>,
}

impl ModelPool {
    pub fn new(fallback: Arc<dyn LlmClient>) -> Self {
        Self {
            clients: HashMap::new(),
            fallback,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, client: Arc<dyn LlmClient>) -> Self {
        self.insert(model, client);
        self
    }

    pub fn insert(&mut self, model: impl Into<String>, client: Arc<dyn LlmClient>) {
        self.clients.insert(model.into(), client);
    }

    /// 为注册表中每个模型建立连接器：local* 走本地服务，其余走 OpenAI 兼容端点
    pub fn from_config(cfg: &AppConfig, agents: &AgentRegistry, tools: Arc<ToolRegistry>) -> Self {
        let local: Arc<dyn LlmClient> = Arc::new(LocalLlmBackend::new(tools.clone(), None));
        let mut pool = Self::new(local);
        let mut missing_key_logged = false;

        for model in agents.models() {
            if model.starts_with(LOCAL_MODEL_PREFIX) {
                pool.insert(
                    model.clone(),
                    Arc::new(LocalLlmBackend::new(tools.clone(), Some(model.clone()))),
                );
                continue;
            }
            match OpenAiClient::from_env(&cfg.llm.base_url, &model, &cfg.llm.api_key_env) {
                Some(client) => {
                    tracing::info!(model = %model, "remote model connector ready");
                    pool.insert(model, Arc::new(client.with_timeout(cfg.llm.request_timeout_secs)));
                }
                None => {
                    if !missing_key_logged {
                        tracing::error!(
                            env = %cfg.llm.api_key_env,
                            "API key missing, remote model connectors disabled (falling back to local model)"
                        );
                        missing_key_logged = true;
                    }
                }
            }
        }
        pool
    }

    pub fn has_connector(&self, model: &str) -> bool {
        self.clients.contains_key(model)
    }

    /// 取模型对应的客户端；无连接器时返回回退客户端
    pub fn client_for(&self, model: &str) -> Arc<dyn LlmClient> {
        self.clients
            .get(model)
            .cloned()
            .unwrap_or_else(|| {
                tracing::debug!(model = %model, "no connector for model, using fallback");
                self.fallback.clone()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, ScriptedLlmClient};
    use crate::memory::Message;

    #[tokio::test]
    async fn test_unknown_model_uses_fallback() {
        let pool = ModelPool::new(Arc::new(ScriptedLlmClient::new("fallback")))
            .with_model("gemini-1.5-pro", Arc::new(MockLlmClient));

        assert!(pool.has_connector("gemini-1.5-pro"));
        assert!(!pool.has_connector("gpt-x"));

        let reply = pool
            .client_for("gpt-x")
            .complete(&[Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(reply, "fallback");
    }

    #[test]
    fn test_missing_key_only_disables_remote_connectors() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key_env = "COPILOT_TEST_KEY_THAT_IS_NOT_SET".to_string();
        let agents = AgentRegistry::defaults();
        let pool = ModelPool::from_config(&cfg, &agents, Arc::new(ToolRegistry::new()));

        for model in agents.models() {
            assert_eq!(
                pool.has_connector(&model),
                model.starts_with(LOCAL_MODEL_PREFIX),
                "model {model}"
            );
        }
    }
}
