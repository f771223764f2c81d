//! # Karakuri: Event-Condition-Action Rule Engine
//!
//! Karakuri dispatches events against registered rules. Each rule names a
//! trigger, an optional condition gate per step, and the actions to run.
//! What makes the engine interesting is its scoping discipline: rule
//! execution sees dynamically scoped context (the innermost binding of a
//! name wins) and an isolated token scope, and both are restored exactly
//! when execution finishes, no matter how deeply actions trigger further
//! events.
//!
//! ## Architecture
//!
//! - Context state lives in purpose-keyed stacks of immutable collections
//!   ([`context`]), with a replaying unwind that tolerates asymmetric nested
//!   pushes.
//! - The token scope ([`token`]) is a flat mutable map, snapshotted and
//!   cleared on frame entry and restored entry by entry on exit.
//! - Execution frames and action brackets ([`frame`]) drive those two
//!   disciplines around each event and each action.
//! - Conditions and actions are plugins ([`plugin`]) resolved by string id;
//!   the stock set covers scalar comparison ([`compare`]), token writes,
//!   logging and nested event triggering.
//! - The engine ([`engine`]) wires rules ([`model`]), plugins and the
//!   broadcast event bus ([`bus`]) together; dispatch reports failures
//!   instead of raising them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use karakuri::{Engine, EngineConfig, Event, EventKind, PluginSpec, Rule, RuleStep};
//!
//! # async fn example() {
//! let engine = Engine::new(EngineConfig::default());
//! engine.register_rule(
//!     Rule::new("greet", EventKind::custom("hello")).with_step(
//!         RuleStep::new(PluginSpec::new("log_message").with("message", "hello world")),
//!     ),
//! );
//! let report = engine.dispatch(Event::new(EventKind::custom("hello"))).await;
//! assert_eq!(report.executed_actions, 1);
//! # }
//! ```

pub mod bus;
pub mod compare;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod frame;
pub mod model;
pub mod plugin;
pub mod token;
pub mod value;

// Re-exports
pub use bus::{ErrorEvent, ErrorReceiver, ErrorSeverity, EventBus, EventError, EventReceiver};
pub use compare::{CompareOperator, ComparisonType};
pub use config::EngineConfig;
pub use context::{
    ContextCollection, ContextStack, ContextStacks, ContextValue, EngineContext, DEFAULT_PURPOSE,
};
pub use engine::{DispatchError, DispatchReport, Engine};
pub use error::{EngineResult, Error};
pub use event::{ContextGroup, Event, EventKind};
pub use frame::{ActionBracket, ExecutionFrame};
pub use model::{PluginSpec, Rule, RuleRegistry, RuleStep};
pub use plugin::{
    Action, ActionRegistry, ActionResolver, Condition, ConditionRegistry, ConditionResolver,
    ExecutionScope, PluginError, PluginResult,
};
pub use token::{TokenScope, TokenSnapshot};
pub use value::{EntityRef, TypedValue, Value};
