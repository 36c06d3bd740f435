//! Agent 注册表：agent 名 -> {model, priority, capabilities}
//!
//! 启动时从配置加载一次（配置为空时用内置默认表），之后只读，通过 Arc 共享给路由器。

use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::AgentEntry;

/// 单个 Agent 的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentConfig {
    pub model: String,
    pub priority: u32,
    pub capabilities: BTreeSet<String>,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>, priority: u32, capabilities: &[&str]) -> Self {
        Self {
            model: model.into(),
            priority,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// 有序注册表（保留插入顺序，用于优先级相同时的决胜）
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<(String, AgentConfig)>,
}

impl AgentRegistry {
    /// 由条目列表构建；重名时保留第一次出现的条目
    pub fn from_entries(entries: impl IntoIterator<Item = (String, AgentConfig)>) -> Self {
        let mut agents: Vec<(String, AgentConfig)> = Vec::new();
        for (name, config) in entries {
            if agents.iter().any(|(n, _)| *n == name) {
                tracing::warn!(agent = %name, "duplicate agent ignored");
                continue;
            }
            agents.push((name, config));
        }
        Self { agents }
    }

    /// 内置默认表
    pub fn defaults() -> Self {
        Self::from_entries([
            (
                "gemini_reasoner".to_string(),
                AgentConfig::new("gemini-1.5-pro", 10, &["reasoning", "documents", "chat"]),
            ),
            (
                "gemini_vision".to_string(),
                AgentConfig::new("gemini-1.5-flash", 8, &["vision", "chat"]),
            ),
            (
                "code_agent".to_string(),
                AgentConfig::new("gemini-1.5-pro", 9, &["code"]),
            ),
            (
                "local_operator".to_string(),
                AgentConfig::new(
                    "local-llama",
                    5,
                    &["system_control", "web_search", "documents", "chat"],
                ),
            ),
        ])
    }

    /// 配置中的 [[router.agents]]；为空时使用默认表
    pub fn from_config(entries: &[AgentEntry]) -> Self {
        if entries.is_empty() {
            return Self::defaults();
        }
        Self::from_entries(entries.iter().map(|e| {
            (
                e.name.clone(),
                AgentConfig {
                    model: e.model.clone(),
                    priority: e.priority,
                    capabilities: e.capabilities.iter().cloned().collect(),
                },
            )
        }))
    }

    pub fn get(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentConfig)> {
        self.agents.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// 去重后的模型名（按插入顺序）
    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for (_, config) in &self.agents {
            if !models.contains(&config.model) {
                models.push(config.model.clone());
            }
        }
        models
    }

    /// 拥有该能力的 Agent 中优先级最高者；优先级相同取先插入者
    pub fn best_for(&self, capability: &str) -> Option<(&str, &AgentConfig)> {
        best_by_priority(self.iter().filter(|(_, c)| c.has_capability(capability)))
    }

    /// 全表优先级最高者
    pub fn highest_priority(&self) -> Option<(&str, &AgentConfig)> {
        best_by_priority(self.iter())
    }
}

fn best_by_priority<'a>(
    candidates: impl Iterator<Item = (&'a str, &'a AgentConfig)>,
) -> Option<(&'a str, &'a AgentConfig)> {
    // max_by_key 在相等时取最后一个，这里需要第一个
    candidates.fold(None, |best, cand| match best {
        Some(b) if b.1.priority >= cand.1.priority => Some(b),
        _ => Some(cand),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_for_prefers_priority_then_insertion_order() {
        let registry = AgentRegistry::from_entries([
            ("a".to_string(), AgentConfig::new("m1", 5, &["chat"])),
            ("b".to_string(), AgentConfig::new("m2", 7, &["chat"])),
            ("c".to_string(), AgentConfig::new("m3", 7, &["chat", "code"])),
            ("d".to_string(), AgentConfig::new("m4", 9, &["vision"])),
        ]);

        assert_eq!(registry.best_for("chat").unwrap().0, "b");
        assert_eq!(registry.best_for("code").unwrap().0, "c");
        assert!(registry.best_for("audio").is_none());
        assert_eq!(registry.highest_priority().unwrap().0, "d");
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let registry = AgentRegistry::from_entries([
            ("a".to_string(), AgentConfig::new("m1", 1, &[])),
            ("a".to_string(), AgentConfig::new("m2", 9, &[])),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().model, "m1");
    }

    #[test]
    fn test_models_are_deduplicated() {
        let registry = AgentRegistry::defaults();
        let models = registry.models();
        assert_eq!(models, vec!["gemini-1.5-pro", "gemini-1.5-flash", "local-llama"]);
    }

    #[test]
    fn test_from_config_empty_uses_defaults() {
        assert_eq!(AgentRegistry::from_config(&[]).len(), AgentRegistry::defaults().len());

        let registry = AgentRegistry::from_config(&[AgentEntry {
            name: "solo".into(),
            model: "local".into(),
            priority: 1,
            capabilities: vec!["chat".into()],
        }]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("solo").unwrap().has_capability("chat"));
    }
}
