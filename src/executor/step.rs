//! 计划步骤与执行结果

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 计划中的一步：{tool, action, args}；args 缺省或 null 表示无参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub args: Value,
}

impl Step {
    pub fn new(tool: impl Into<String>, action: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            action: action.into(),
            args,
        }
    }
}

/// 计划：按序执行的步骤列表
pub type Plan = Vec<Step>;

/// 单步执行结果（不可变）；critical 为 false 时不序列化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success {
        tool: String,
        action: String,
        result: Value,
    },
    Error {
        tool: String,
        action: String,
        error: String,
        #[serde(default, skip_serializing_if = "is_false")]
        critical: bool,
    },
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ExecutionResult {
    pub fn success(step: &Step, result: Value) -> Self {
        ExecutionResult::Success {
            tool: step.tool.clone(),
            action: step.action.clone(),
            result,
        }
    }

    pub fn error(step: &Step, error: impl Into<String>, critical: bool) -> Self {
        ExecutionResult::Error {
            tool: step.tool.clone(),
            action: step.action.clone(),
            error: error.into(),
            critical,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, ExecutionResult::Error { critical: true, .. })
    }

    pub fn tool(&self) -> &str {
        match self {
            ExecutionResult::Success { tool, .. } | ExecutionResult::Error { tool, .. } => tool,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ExecutionResult::Error { error, .. } => Some(error),
            ExecutionResult::Success { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_defaults_for_missing_fields() {
        let step: Step = serde_json::from_value(json!({ "tool": "vision" })).unwrap();
        assert_eq!(step.action, "");
        assert!(step.args.is_null());
    }

    #[test]
    fn test_result_wire_shape() {
        let step = Step::new("system", "kill_process", json!({}));
        let ok = serde_json::to_value(ExecutionResult::error(&step, "nope", false)).unwrap();
        assert_eq!(ok["status"], "error");
        assert!(ok.get("critical").is_none());

        let crit = serde_json::to_value(ExecutionResult::error(&step, "down", true)).unwrap();
        assert_eq!(crit["critical"], true);

        let success = serde_json::to_value(ExecutionResult::success(&step, json!({"ok": 1}))).unwrap();
        assert_eq!(success["status"], "success");
        assert_eq!(success["result"]["ok"], 1);
    }
}
