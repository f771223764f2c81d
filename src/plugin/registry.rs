//! Factory registries mapping plugin ids to condition and action builders.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::instrument;

use crate::model::PluginSpec;

use super::builtin::{
    LogMessageAction, NoopAction, ScalarComparisonCondition, SetTokenAction, TriggerEventAction,
};
use super::{Action, ActionResolver, Condition, ConditionResolver, PluginError, PluginResult};

type ConditionFactory =
    Box<dyn Fn(&PluginSpec) -> PluginResult<Arc<dyn Condition>> + Send + Sync>;
type ActionFactory = Box<dyn Fn(&PluginSpec) -> PluginResult<Arc<dyn Action>> + Send + Sync>;

#[derive(Default)]
pub struct ConditionRegistry {
    factories: DashMap<String, ConditionFactory>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the stock condition plugins.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register("scalar_comparison", |spec| {
            let condition = ScalarComparisonCondition::from_spec(spec)?;
            Ok(Arc::new(condition) as Arc<dyn Condition>)
        });
        registry
    }

    #[instrument(level = "debug", skip(self, factory))]
    pub fn register<F>(&self, plugin: &str, factory: F)
    where
        F: Fn(&PluginSpec) -> PluginResult<Arc<dyn Condition>> + Send + Sync + 'static,
    {
        self.factories.insert(plugin.to_string(), Box::new(factory));
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.factories.contains_key(plugin)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn resolve(&self, spec: &PluginSpec) -> PluginResult<Arc<dyn Condition>> {
        let factory = self
            .factories
            .get(&spec.plugin)
            .ok_or_else(|| PluginError::NotFound {
                kind: "condition",
                plugin: spec.plugin.clone(),
            })?;
        factory(spec)
    }
}

impl ConditionResolver for ConditionRegistry {
    fn resolve_condition(&self, spec: &PluginSpec) -> PluginResult<Arc<dyn Condition>> {
        self.resolve(spec)
    }
}

#[derive(Default)]
pub struct ActionRegistry {
    factories: DashMap<String, ActionFactory>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the stock action plugins.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register("set_token", |spec| {
            let action = SetTokenAction::from_spec(spec)?;
            Ok(Arc::new(action) as Arc<dyn Action>)
        });
        registry.register("log_message", |spec| {
            let action = LogMessageAction::from_spec(spec)?;
            Ok(Arc::new(action) as Arc<dyn Action>)
        });
        registry.register("trigger_event", |spec| {
            let action = TriggerEventAction::from_spec(spec)?;
            Ok(Arc::new(action) as Arc<dyn Action>)
        });
        registry.register("noop", |_| Ok(Arc::new(NoopAction) as Arc<dyn Action>));
        registry
    }

    #[instrument(level = "debug", skip(self, factory))]
    pub fn register<F>(&self, plugin: &str, factory: F)
    where
        F: Fn(&PluginSpec) -> PluginResult<Arc<dyn Action>> + Send + Sync + 'static,
    {
        self.factories.insert(plugin.to_string(), Box::new(factory));
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.factories.contains_key(plugin)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn resolve(&self, spec: &PluginSpec) -> PluginResult<Arc<dyn Action>> {
        let factory = self
            .factories
            .get(&spec.plugin)
            .ok_or_else(|| PluginError::NotFound {
                kind: "action",
                plugin: spec.plugin.clone(),
            })?;
        factory(spec)
    }
}

impl ActionResolver for ActionRegistry {
    fn resolve_action(&self, spec: &PluginSpec) -> PluginResult<Arc<dyn Action>> {
        self.resolve(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let conditions = ConditionRegistry::with_builtin();
        assert_eq!(conditions.names(), vec!["scalar_comparison"]);

        let actions = ActionRegistry::with_builtin();
        assert_eq!(
            actions.names(),
            vec!["log_message", "noop", "set_token", "trigger_event"]
        );
    }

    #[test]
    fn test_unknown_plugin_errors() {
        let actions = ActionRegistry::with_builtin();
        let err = actions
            .resolve(&PluginSpec::new("does_not_exist"))
            .err()
            .unwrap();
        assert_eq!(
            err,
            PluginError::NotFound {
                kind: "action",
                plugin: "does_not_exist".to_string(),
            }
        );
    }

    #[test]
    fn test_custom_registration() {
        let actions = ActionRegistry::new();
        assert!(!actions.contains("noop"));

        actions.register("noop", |_| Ok(Arc::new(NoopAction) as Arc<dyn Action>));
        assert!(actions.contains("noop"));
        assert!(actions.resolve(&PluginSpec::new("noop")).is_ok());
    }

    #[test]
    fn test_malformed_condition_config() {
        let conditions = ConditionRegistry::with_builtin();
        let spec = PluginSpec::new("scalar_comparison").with("operator", "not_an_operator");
        let err = conditions.resolve(&spec).err().unwrap();
        assert!(matches!(err, PluginError::InvalidConfig { .. }));
    }
}
