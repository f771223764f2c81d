//! Condition and action plugins.
//!
//! Rules reference plugins by string id plus a configuration blob; resolvers
//! turn those references into live [`Condition`] and [`Action`] objects. The
//! engine only brackets calls into them and never interprets their
//! configuration itself.

pub mod builtin;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::{ContextStacks, EngineContext};
use crate::engine::{DispatchReport, Engine};
use crate::event::Event;
use crate::model::PluginSpec;
use crate::token::TokenScope;

pub use registry::{ActionRegistry, ConditionRegistry};

pub type PluginResult<T> = Result<T, PluginError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Unknown {kind} plugin: {plugin}")]
    NotFound { kind: &'static str, plugin: String },

    #[error("Invalid configuration for plugin {plugin}: {message}")]
    InvalidConfig { plugin: String, message: String },

    #[error("Plugin {plugin} failed: {message}")]
    ExecutionFailed { plugin: String, message: String },
}

impl PluginError {
    pub fn invalid_config(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        PluginError::InvalidConfig {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    pub fn execution_failed(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        PluginError::ExecutionFailed {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Stable identifier used as the `error_type` of published error events.
    pub fn error_type(&self) -> &'static str {
        match self {
            PluginError::NotFound { .. } => "plugin_not_found",
            PluginError::InvalidConfig { .. } => "invalid_configuration",
            PluginError::ExecutionFailed { .. } => "plugin_failed",
        }
    }
}

/// What a plugin sees while it evaluates or executes.
///
/// The scope exposes the triggering event, the engine's token scope and
/// context stacks, and a handle for dispatching nested events. Nested
/// dispatch re-enters the engine on the current task, so context and token
/// nesting behaves as matched parentheses around the inner event.
#[derive(Clone)]
pub struct ExecutionScope {
    engine: Engine,
    event: Event,
}

impl ExecutionScope {
    pub fn new(engine: Engine, event: Event) -> Self {
        Self { engine, event }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn context(&self) -> &EngineContext {
        self.engine.context()
    }

    pub fn tokens(&self) -> &TokenScope {
        &self.engine.context().tokens
    }

    pub fn stacks(&self) -> &ContextStacks {
        &self.engine.context().stacks
    }

    /// Dispatch a nested event before the current action returns.
    pub async fn trigger(&self, event: Event) -> DispatchReport {
        self.engine.dispatch(event).await
    }
}

/// Boolean gate in front of an action.
#[async_trait]
pub trait Condition: Send + Sync {
    async fn evaluate(&self, scope: &ExecutionScope) -> PluginResult<bool>;
}

/// Unit of work executed by a rule step.
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(&self, scope: &ExecutionScope) -> PluginResult<()>;
}

/// Resolves condition plugin references for the engine.
#[mockall::automock]
pub trait ConditionResolver: Send + Sync {
    fn resolve_condition(&self, spec: &PluginSpec) -> PluginResult<Arc<dyn Condition>>;
}

/// Resolves action plugin references for the engine.
#[mockall::automock]
pub trait ActionResolver: Send + Sync {
    fn resolve_action(&self, spec: &PluginSpec) -> PluginResult<Arc<dyn Action>>;
}
