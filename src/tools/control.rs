//! Control 工具：鼠标 / 键盘注入（control MCP 服务）

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::ToolError;
use crate::tools::{parse_args, ServiceClient, ToolClient, ToolKind};

pub struct ControlClient {
    http: ServiceClient,
}

#[derive(Deserialize)]
struct MoveArgs {
    x: i32,
    y: i32,
}

#[derive(Deserialize)]
struct ClickArgs {
    #[serde(default)]
    x: Option<i32>,
    #[serde(default)]
    y: Option<i32>,
    #[serde(default = "default_button")]
    button: String,
}

fn default_button() -> String {
    "left".to_string()
}

#[derive(Deserialize)]
struct TypeArgs {
    text: String,
}

#[derive(Deserialize)]
struct HotkeyArgs {
    keys: Vec<String>,
}

impl ControlClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http: ServiceClient::new("control", base_url, timeout_secs),
        }
    }

    pub async fn mouse_position(&self) -> Result<Value, ToolError> {
        self.http.get("/control/mouse/position").await
    }

    pub async fn move_mouse(&self, x: i32, y: i32) -> Result<Value, ToolError> {
        self.http
            .post("/control/mouse/move", &json!({ "x": x, "y": y }))
            .await
    }

    pub async fn click(&self, x: Option<i32>, y: Option<i32>, button: &str) -> Result<Value, ToolError> {
        self.http
            .post(
                "/control/mouse/click",
                &json!({ "x": x, "y": y, "button": button }),
            )
            .await
    }

    pub async fn type_text(&self, text: &str) -> Result<Value, ToolError> {
        self.http
            .post("/control/keyboard/type", &json!({ "text": text }))
            .await
    }

    pub async fn hotkey(&self, keys: &[String]) -> Result<Value, ToolError> {
        if keys.is_empty() {
            return Err(ToolError::invalid_args("hotkey requires at least one key"));
        }
        self.http
            .post("/control/keyboard/hotkey", &json!({ "keys": keys }))
            .await
    }
}

#[async_trait]
impl ToolClient for ControlClient {
    fn kind(&self) -> ToolKind {
        ToolKind::Control
    }

    fn actions(&self) -> &'static [&'static str] {
        &["mouse_position", "move_mouse", "click", "type_text", "hotkey"]
    }

    async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let kind = self.kind();
        match action {
            "mouse_position" => self.mouse_position().await,
            "move_mouse" => {
                let a: MoveArgs = parse_args(kind, action, args)?;
                self.move_mouse(a.x, a.y).await
            }
            "click" => {
                let a: ClickArgs = parse_args(kind, action, args)?;
                self.click(a.x, a.y, &a.button).await
            }
            "type_text" => {
                let a: TypeArgs = parse_args(kind, action, args)?;
                self.type_text(&a.text).await
            }
            "hotkey" => {
                let a: HotkeyArgs = parse_args(kind, action, args)?;
                self.hotkey(&a.keys).await
            }
            _ => Err(ToolError::unknown_action(kind.as_str(), action)),
        }
    }
}
