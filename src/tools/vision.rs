//! Vision 工具：当前屏幕上下文、截图、屏幕 / 图片分析（vision MCP 服务）
//!
//! 图片以 base64 字符串放在 JSON 字段中传输。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct VisionClient {
    http: ServiceClient,
}

#[derive(Deserialize, Default)]
struct PromptArgs {
    #[serde(default)]
    prompt: Option<String>,
}

#[derive(Deserialize)]
struct ImageArgs {
    image_base64: String,
    #[serde(default)]
    prompt: Option<String>,
}

impl VisionClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("vision", base_url, timeout_secs),
        }
    }

    pub async fn get_active_context(&self) -> Result<Value, ToolError> {
        self.http.get("/vision/context").await
    }

    pub async fn capture_screen(&self) -> Result<Value, ToolError> {
        self.http.post("/vision/capture", &json!({})).await
    }

    pub async fn analyze_screen(&self, prompt: Option<&str>) -> Result<Value, ToolError> {
        self.http
            .post("/vision/analyze_screen", &json!({ "prompt": prompt }))
            .await
    }

    pub async fn analyze_image(&self, image_base64: &str, prompt: Option<&str>) -> Result<Value, ToolError> {
        self.http
            .post(
                "/vision/analyze_image",
                &json!({ "image": image_base64, "prompt": prompt }),
            )
            .await
    }
}

#[async_trait]
impl ToolClient for VisionClient {
    fn kind(&self) -> ToolKind {
        ToolKind::Vision
    }

    fn actions(&self) -> &'static [&'static str] {
        &["get_active_context", "capture_screen", "analyze_screen", "analyze_image"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "get_active_context" => self.get_active_context().await,
            "capture_screen" => self.capture_screen().await,
            "analyze_screen" => {
                let a: PromptArgs = parse_args(kind, action, args)?;
                self.analyze_screen(a.prompt.as_deref()).await
            }
            "analyze_image" => {
                let a: ImageArgs = parse_args(kind, action, args)?;
                self.analyze_image(&a.image_base64, a.prompt.as_deref()).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}
