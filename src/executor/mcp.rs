//! MCP 执行器
//!
//! 持有共享的 ToolRegistry，把计划步骤转为工具调用：顺序执行（遇关键错误即停）、重试、并行、
//! 校验与 dry-run。单步失败一律转为 ExecutionResult::Error，不向上抛；每次调用输出 JSON 审计日志。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::core::{ErrorKind, ToolError};
use crate::executor::{ExecutionResult, Plan, Step, Timeline, TimelineEvent};
use crate::tools::{ToolKind, ToolRegistry};

/// 单步校验结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// dry-run 报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunReport {
    pub total_steps: usize,
    pub valid_steps: usize,
    pub invalid_steps: usize,
    pub validations: Vec<StepValidation>,
    pub can_execute: bool,
}

pub struct McpExecutor {
    tools: Arc<ToolRegistry>,
    timeline: Arc<Timeline>,
    retry_delay: Duration,
}

impl McpExecutor {
    pub fn new(tools: Arc<ToolRegistry>, retry_delay_ms: u64) -> Self {
        Self {
            tools,
            timeline: Arc::new(Timeline::new()),
            retry_delay: Duration::from_millis(retry_delay_ms),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// 执行单步；任何失败都转为错误结果，critical 由错误类别决定
    pub async fn execute_action(&self, step: &Step) -> ExecutionResult {
        let start = Instant::now();
        let outcome = self.call_step(step).await;

        let (ok, outcome_name) = match &outcome {
            Ok(_) => (true, "ok"),
            Err(e) => (false, e.kind.name()),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": step.tool,
            "action": step.action,
            "ok": ok,
            "outcome": outcome_name,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&step.args),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match outcome {
            Ok(result) => ExecutionResult::success(step, result),
            Err(e) => {
                let critical = e.is_critical();
                if critical {
                    tracing::warn!(tool = %step.tool, action = %step.action, error = %e, "critical tool failure");
                }
                ExecutionResult::error(step, e.message, critical)
            }
        }
    }

    async fn call_step(&self, step: &Step) -> Result<Value, ToolError> {
        let kind: ToolKind = step.tool.parse()?;
        self.tools.call(kind, &step.action, step.args.clone()).await
    }

    /// 顺序执行；每步后记录时间线事件，遇到关键错误后不再执行后续步骤
    pub async fn execute_plan(&self, plan: &[Step], session_id: &str) -> Vec<ExecutionResult> {
        let total = plan.len();
        let mut results = Vec::with_capacity(total);
        for (index, step) in plan.iter().enumerate() {
            let result = self.execute_action(step).await;
            self.timeline
                .push(
                    session_id,
                    TimelineEvent::execution(index, total, step.clone(), result.clone()),
                )
                .await;
            let stop = result.is_critical();
            results.push(result);
            if stop {
                tracing::warn!(
                    session_id = %session_id,
                    step_index = index,
                    remaining = total - index - 1,
                    "plan aborted on critical error"
                );
                break;
            }
        }
        results
    }

    /// 非关键失败线性退避重试；关键错误立即返回
    pub async fn execute_with_retry(&self, step: &Step, max_retries: usize) -> ExecutionResult {
        let attempts = max_retries.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let result = self.execute_action(step).await;
            match &result {
                ExecutionResult::Success { .. } => return result,
                ExecutionResult::Error { critical: true, .. } => return result,
                ExecutionResult::Error { error, .. } => {
                    tracing::debug!(attempt, attempts, error = %error, "step failed, retrying");
                    last_error = error.clone();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.retry_delay * attempt as u32).await;
            }
        }
        ExecutionResult::error(
            step,
            format!("Failed after {attempts} attempts: {last_error}"),
            false,
        )
    }

    /// 全部步骤并发执行，结果按输入顺序；panic 的步骤转为错误结果
    pub async fn execute_parallel(&self, steps: &[Step]) -> Vec<ExecutionResult> {
        let futures = steps.iter().map(|step| async move {
            match AssertUnwindSafe(self.execute_action(step)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(tool = %step.tool, action = %step.action, "step panicked: {}", message);
                    let e = ToolError::new(ErrorKind::Internal, format!("Step panicked: {message}"));
                    ExecutionResult::error(step, e.message, e.kind.is_critical())
                }
            }
        });
        join_all(futures).await
    }

    /// 纯校验，不发起任何调用
    pub fn validate_step(&self, step: &Step) -> StepValidation {
        let mut errors = Vec::new();

        if step.tool.trim().is_empty() {
            errors.push("Missing tool".to_string());
        }
        if step.action.trim().is_empty() {
            errors.push("Missing action".to_string());
        }

        if !step.tool.trim().is_empty() {
            match step.tool.parse::<ToolKind>() {
                Err(e) => errors.push(e.message),
                Ok(kind) => match self.tools.get(kind) {
                    None => errors.push(format!("Tool '{kind}' is not registered")),
                    Some(client) => {
                        if !step.action.trim().is_empty() && !client.has_action(&step.action) {
                            errors.push(ToolError::unknown_action(kind.as_str(), &step.action).message);
                        }
                    }
                },
            }
        }

        if !matches!(step.args, Value::Object(_) | Value::Null) {
            errors.push("Arguments must be a JSON object".to_string());
        }

        StepValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn dry_run(&self, plan: &Plan) -> DryRunReport {
        let validations: Vec<StepValidation> = plan.iter().map(|s| self.validate_step(s)).collect();
        let valid_steps = validations.iter().filter(|v| v.valid).count();
        DryRunReport {
            total_steps: plan.len(),
            valid_steps,
            invalid_steps: plan.len() - valid_steps,
            can_execute: valid_steps == plan.len(),
            validations,
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolClient;
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// system 桩：kill_process 连接失败，list_processes 前 n 次返回远端错误
    struct FlakySystem {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl ToolClient for FlakySystem {
        fn kind(&self) -> ToolKind {
            ToolKind::System
        }

        fn actions(&self) -> &'static [&'static str] {
            &["snapshot", "list_processes", "kill_process"]
        }

        async fn call(&self, action: &str, _args: Map<String, Value>) -> Result<Value, ToolError> {
            match action {
                "kill_process" => Err(ToolError::connection("Connection refused")),
                "snapshot" => panic!("snapshot exploded"),
                _ => {
                    let n = self.calls.fetch_add(1, Ordering::SeqCst);
                    if n < self.fail_first {
                        Err(ToolError::new(ErrorKind::Remote, "busy"))
                    } else {
                        Ok(json!({ "processes": ["a", "b"] }))
                    }
                }
            }
        }
    }

    struct EchoFiles;

    #[async_trait]
    impl ToolClient for EchoFiles {
        fn kind(&self) -> ToolKind {
            ToolKind::Files
        }

        fn actions(&self) -> &'static [&'static str] {
            &["read_file", "list_dir"]
        }

        async fn call(&self, action: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
            Ok(json!({ "action": action, "args": args }))
        }
    }

    fn executor(fail_first: usize) -> McpExecutor {
        let mut tools = ToolRegistry::new();
        tools.register(FlakySystem {
            calls: AtomicUsize::new(0),
            fail_first,
        });
        tools.register(EchoFiles);
        McpExecutor::new(Arc::new(tools), 1)
    }

    #[tokio::test]
    async fn test_connection_error_is_critical() {
        let exec = executor(0);
        let step = Step::new("system", "kill_process", json!({ "name": "notepad.exe" }));
        let result = exec.execute_action(&step).await;
        assert_eq!(
            result,
            ExecutionResult::Error {
                tool: "system".into(),
                action: "kill_process".into(),
                error: "Connection refused".into(),
                critical: true,
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_and_action() {
        let exec = executor(0);
        let result = exec.execute_action(&Step::new("unknown_tool", "x", Value::Null)).await;
        assert_eq!(result.error_message(), Some("Unknown tool: unknown_tool"));
        assert!(!result.is_critical());

        let result = exec.execute_action(&Step::new("files", "delete_all", Value::Null)).await;
        assert_eq!(result.error_message(), Some("Action 'delete_all' not found on tool 'files'"));
        assert!(!result.is_critical());
    }

    #[tokio::test]
    async fn test_plan_stops_after_first_critical_error() {
        let exec = executor(0);
        let plan = vec![
            Step::new("files", "list_dir", json!({ "path": "." })),
            Step::new("files", "nope", Value::Null),
            Step::new("system", "kill_process", json!({ "name": "x", "allow": true })),
            Step::new("files", "read_file", json!({ "path": "a.txt" })),
        ];
        let results = exec.execute_plan(&plan, "s1").await;

        // 关键错误在第 3 步（下标 2），结果数为 3
        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(!results[1].is_success() && !results[1].is_critical());
        assert!(results[2].is_critical());
        for (result, step) in results.iter().zip(&plan) {
            assert_eq!(result.tool(), step.tool);
        }

        let events = exec.timeline().events("s1").await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].step_index, 1);
        assert_eq!(events[0].total_steps, 4);
    }

    #[tokio::test]
    async fn test_plan_without_critical_runs_all_steps() {
        let exec = executor(0);
        let plan = vec![
            Step::new("files", "list_dir", json!({})),
            Step::new("unknown_tool", "x", Value::Null),
            Step::new("files", "read_file", json!({ "path": "b" })),
        ];
        assert_eq!(exec.execute_plan(&plan, "s2").await.len(), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let exec = executor(2);
        let step = Step::new("system", "list_processes", Value::Null);
        assert!(exec.execute_with_retry(&step, 3).await.is_success());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_message() {
        let exec = executor(10);
        let step = Step::new("system", "list_processes", Value::Null);
        let result = exec.execute_with_retry(&step, 3).await;
        assert_eq!(result.error_message(), Some("Failed after 3 attempts: busy"));
        assert!(!result.is_critical());
    }

    #[tokio::test]
    async fn test_retry_returns_critical_immediately() {
        let exec = executor(0);
        let step = Step::new("system", "kill_process", json!({ "allow": true }));
        let result = exec.execute_with_retry(&step, 5).await;
        assert_eq!(result.error_message(), Some("Connection refused"));
        assert!(result.is_critical());
    }

    #[tokio::test]
    async fn test_parallel_keeps_order_and_contains_panics() {
        let exec = executor(0);
        let steps = vec![
            Step::new("files", "read_file", json!({ "path": "1" })),
            Step::new("system", "snapshot", Value::Null),
            Step::new("files", "list_dir", json!({ "path": "2" })),
        ];
        let results = exec.execute_parallel(&steps).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(results[1].error_message().unwrap().contains("snapshot exploded"));
        assert!(!results[1].is_critical());
        match &results[2] {
            ExecutionResult::Success { result, .. } => assert_eq!(result["args"]["path"], "2"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_step_without_io() {
        let exec = executor(0);
        assert!(exec.validate_step(&Step::new("files", "read_file", json!({}))).valid);

        let v = exec.validate_step(&Step::new("", "", json!([1])));
        assert!(!v.valid);
        assert_eq!(v.errors.len(), 3);

        let v = exec.validate_step(&Step::new("vision", "capture_screen", Value::Null));
        assert_eq!(v.errors, vec!["Tool 'vision' is not registered"]);

        let v = exec.validate_step(&Step::new("files", "rm", Value::Null));
        assert_eq!(v.errors, vec!["Action 'rm' not found on tool 'files'"]);
    }

    #[test]
    fn test_dry_run_report() {
        let exec = executor(0);
        let plan = vec![
            Step::new("files", "read_file", json!({ "path": "a" })),
            Step::new("bogus", "x", Value::Null),
        ];
        let report = exec.dry_run(&plan);
        assert_eq!(report.total_steps, 2);
        assert_eq!(report.valid_steps, 1);
        assert_eq!(report.invalid_steps, 1);
        assert!(!report.can_execute);

        assert!(exec.dry_run(&plan[..1].to_vec()).can_execute);
        assert!(exec.dry_run(&Vec::new()).can_execute);
    }
}
