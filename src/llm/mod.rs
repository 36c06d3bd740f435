//! LLM 层：客户端抽象与实现（OpenAI 兼容 / 本地模型服务 / Mock）与模型池

pub mod local;
pub mod mock;
pub mod openai;
pub mod pool;
pub mod traits;

pub use local::LocalLlmBackend;
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use pool::{ModelPool, LOCAL_MODEL_PREFIX};
pub use traits::LlmClient;
