//! 执行时间线：按会话追加的执行事件（仅内存）

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::executor::{ExecutionResult, Step};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub step_index: usize,
    pub total_steps: usize,
    pub step: Step,
    pub result: ExecutionResult,
    pub timestamp: DateTime<Utc>,
}

impl TimelineEvent {
    pub fn execution(step_index: usize, total_steps: usize, step: Step, result: ExecutionResult) -> Self {
        Self {
            event_type: "execution",
            step_index,
            total_steps,
            step,
            result,
            timestamp: Utc::now(),
        }
    }
}

/// 每个会话保留的事件上限
pub const MAX_EVENTS_PER_SESSION: usize = 1000;

/// 会话 -> 事件列表，只追加；超出上限时丢弃最早的事件
#[derive(Debug)]
pub struct Timeline {
    events: RwLock<HashMap<String, Vec<TimelineEvent>>>,
    cap: usize,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::with_cap(MAX_EVENTS_PER_SESSION)
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            cap: cap.max(1),
        }
    }

    pub async fn push(&self, session_id: &str, event: TimelineEvent) {
        let mut events = self.events.write().await;
        let list = events.entry(session_id.to_string()).or_default();
        list.push(event);
        if list.len() > self.cap {
            let overflow = list.len() - self.cap;
            list.drain(..overflow);
        }
    }

    pub async fn events(&self, session_id: &str) -> Vec<TimelineEvent> {
        self.events
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn clear(&self, session_id: &str) -> bool {
        self.events.write().await.remove(session_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_events_are_per_session_and_ordered() {
        let timeline = Timeline::new();
        let step = Step::new("files", "list_dir", json!({ "path": "." }));
        for i in 0..3 {
            let result = ExecutionResult::success(&step, json!(i));
            timeline
                .push("a", TimelineEvent::execution(i, 3, step.clone(), result))
                .await;
        }

        let events = timeline.events("a").await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].step_index, 2);
        assert!(timeline.events("b").await.is_empty());

        let value = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(value["type"], "execution");
        assert_eq!(value["total_steps"], 3);

        assert!(timeline.clear("a").await);
        assert!(timeline.events("a").await.is_empty());
    }

    #[tokio::test]
    async fn test_oldest_events_dropped_over_cap() {
        let timeline = Timeline::with_cap(2);
        let step = Step::new("files", "list_dir", json!({ "path": "." }));
        for i in 0..3 {
            let result = ExecutionResult::success(&step, json!(i));
            timeline
                .push("a", TimelineEvent::execution(i, 3, step.clone(), result))
                .await;
        }

        let events = timeline.events("a").await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].step_index, 1);
        assert_eq!(events[1].step_index, 2);
    }
}
