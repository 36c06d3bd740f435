//! Audio 工具：音频上下文、转写、TTS（audio MCP 服务，音频以 base64 传输）

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct AudioClient {
    http: ServiceClient,
}

#[derive(Deserialize)]
struct TranscribeArgs {
    audio_base64: String,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Deserialize)]
struct SpeakArgs {
    text: String,
    #[serde(default)]
    voice: Option<String>,
}

impl AudioClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("audio", base_url, timeout_secs),
        }
    }

    pub async fn get_context(&self) -> Result<Value, ToolError> {
        self.http.get("/audio/context").await
    }

    pub async fn transcribe(&self, audio_base64: &str, language: Option<&str>) -> Result<Value, ToolError> {
        self.http
            .post(
                "/audio/transcribe",
                &json!({ "audio": audio_base64, "language": language }),
            )
            .await
    }

    pub async fn speak(&self, text: &str, voice: Option<&str>) -> Result<Value, ToolError> {
        self.http
            .post("/audio/speak", &json!({ "text": text, "voice": voice }))
            .await
    }
}

#[async_trait]
impl ToolClient for AudioClient {
    fn kind(&self) -> ToolKind {
        ToolKind::Audio
    }

    fn actions(&self) -> &'static [&'static str] {
        &["get_context", "transcribe", "speak"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "get_context" => self.get_context().await,
            "transcribe" => {
                let a: TranscribeArgs = parse_args(kind, action, args)?;
                self.transcribe(&a.audio_base64, a.language.as_deref()).await
            }
            "speak" => {
                let a: SpeakArgs = parse_args(kind, action, args)?;
                self.speak(&a.text, a.voice.as_deref()).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}
