//! Rule definitions and the registry that serves them to the engine.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::event::EventKind;
use crate::value::Value;

/// Reference to a condition or action plugin plus its configuration blob.
///
/// The engine never interprets the configuration; it hands the blob to the
/// resolved plugin untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub plugin: String,
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

impl PluginSpec {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            config: HashMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.config.get(name)
    }
}

/// One condition-gated action within a rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleStep {
    /// Optional gate; a false evaluation skips this step only.
    #[serde(default)]
    pub condition: Option<PluginSpec>,
    pub action: PluginSpec,
    /// Token name whose value becomes the action subject for the bracket.
    #[serde(default)]
    pub subject: Option<String>,
}

impl RuleStep {
    pub fn new(action: PluginSpec) -> Self {
        Self {
            condition: None,
            action,
            subject: None,
        }
    }

    pub fn with_condition(mut self, condition: PluginSpec) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_subject(mut self, token: impl Into<String>) -> Self {
        self.subject = Some(token.into());
        self
    }
}

/// An event-condition-action rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub trigger: EventKind,
    #[serde(default)]
    pub steps: Vec<RuleStep>,
}

impl Rule {
    pub fn new(id: impl Into<String>, trigger: EventKind) -> Self {
        Self {
            id: id.into(),
            label: None,
            trigger,
            steps: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_step(mut self, step: RuleStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// Shared registry of rules, queried on every dispatch.
#[derive(Clone, Debug, Default)]
pub struct RuleRegistry {
    rules: Arc<DashMap<String, Arc<Rule>>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule, replacing any previous rule with the same id.
    #[instrument(level = "debug", skip(self, rule), fields(rule_id = %rule.id))]
    pub fn register(&self, rule: Rule) -> Option<Arc<Rule>> {
        debug!(trigger = %rule.trigger, steps = rule.steps.len(), "registering rule");
        self.rules.insert(rule.id.clone(), Arc::new(rule))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Rule>> {
        self.rules.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Rule>> {
        self.rules.remove(id).map(|(_, rule)| rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules triggered by `kind`, in identifier order so dispatch is
    /// deterministic.
    pub fn matching(&self, kind: &EventKind) -> Vec<Arc<Rule>> {
        let mut matched: Vec<Arc<Rule>> = self
            .rules
            .iter()
            .filter(|entry| entry.value().trigger == *kind)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        matched
    }

    pub fn all(&self) -> Vec<Arc<Rule>> {
        let mut rules: Vec<Arc<Rule>> = self
            .rules
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, trigger: EventKind) -> Rule {
        Rule::new(id, trigger).with_step(RuleStep::new(PluginSpec::new("noop")))
    }

    #[test]
    fn test_register_and_replace() {
        let registry = RuleRegistry::new();
        assert!(registry.register(rule("a", EventKind::Timer)).is_none());
        assert_eq!(registry.len(), 1);

        let replaced = registry.register(rule("a", EventKind::custom("other")));
        assert_eq!(replaced.unwrap().trigger, EventKind::Timer);
        assert_eq!(registry.get("a").unwrap().trigger, EventKind::custom("other"));
    }

    #[test]
    fn test_matching_sorted_by_id() {
        let registry = RuleRegistry::new();
        registry.register(rule("b", EventKind::Timer));
        registry.register(rule("a", EventKind::Timer));
        registry.register(rule("c", EventKind::custom("other")));

        let matched = registry.matching(&EventKind::Timer);
        let ids: Vec<&str> = matched.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_trigger_matching_is_exact() {
        let registry = RuleRegistry::new();
        registry.register(rule("ins", EventKind::inserted("node")));

        assert_eq!(registry.matching(&EventKind::inserted("node")).len(), 1);
        assert!(registry.matching(&EventKind::inserted("user")).is_empty());
        assert!(registry.matching(&EventKind::updated("node")).is_empty());
    }

    #[test]
    fn test_rule_from_json() {
        let raw = r#"{
            "id": "notify_on_publish",
            "trigger": { "EntityUpdated": { "entity_type": "node" } },
            "steps": [
                {
                    "condition": {
                        "plugin": "scalar_comparison",
                        "config": {
                            "left_token": "status",
                            "right": "published",
                            "operator": "equals"
                        }
                    },
                    "action": { "plugin": "log_message" }
                }
            ]
        }"#;

        let rule: Rule = serde_json::from_str(raw).unwrap();
        assert_eq!(rule.id, "notify_on_publish");
        assert_eq!(rule.trigger, EventKind::updated("node"));
        assert_eq!(rule.steps.len(), 1);
        let step = &rule.steps[0];
        assert_eq!(step.action.plugin, "log_message");
        assert_eq!(
            step.condition.as_ref().unwrap().get("left_token"),
            Some(&Value::from("status"))
        );
        assert!(step.subject.is_none());
    }
}
