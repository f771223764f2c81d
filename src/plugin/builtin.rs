//! Stock plugins shipped with the engine.
//!
//! These cover the basics rule authors reach for first: comparing loosely
//! typed scalars, writing tokens, logging, and triggering follow-up events.
//! Anything beyond that is expected to arrive through custom registrations.

use std::str::FromStr;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::compare::{self, CompareOperator, ComparisonType};
use crate::context::{ContextValue, DEFAULT_PURPOSE};
use crate::event::{Event, EventKind};
use crate::model::PluginSpec;
use crate::value::Value;

use super::{Action, Condition, ExecutionScope, PluginError, PluginResult};

/// Where a comparison operand comes from at evaluation time.
#[derive(Clone, Debug, PartialEq)]
enum Operand {
    Literal(Value),
    Token(String),
    Context(String),
}

impl Operand {
    /// Read the operand declaration for one side (`left` or `right`).
    ///
    /// A literal under the plain key wins; otherwise `<side>_token` names a
    /// token and `<side>_context` names a default-purpose context binding.
    /// An undeclared operand is a null literal.
    fn from_spec(spec: &PluginSpec, side: &str) -> PluginResult<Self> {
        if let Some(value) = spec.get(side) {
            return Ok(Operand::Literal(value.clone()));
        }
        for (suffix, build) in [
            ("token", Operand::Token as fn(String) -> Operand),
            ("context", Operand::Context as fn(String) -> Operand),
        ] {
            let key = format!("{side}_{suffix}");
            match spec.get(&key) {
                None => continue,
                Some(Value::String(name)) => return Ok(build(name.clone())),
                Some(other) => {
                    return Err(PluginError::invalid_config(
                        &spec.plugin,
                        format!("{key} must be a string, got {}", other.type_name()),
                    ))
                }
            }
        }
        Ok(Operand::Literal(Value::Null))
    }

    fn resolve(&self, scope: &ExecutionScope) -> Value {
        match self {
            Operand::Literal(value) => value.clone(),
            Operand::Token(name) => scope.tokens().get(name).unwrap_or_default(),
            Operand::Context(name) => scope
                .stacks()
                .get_context(DEFAULT_PURPOSE, name)
                .map(|bound| bound.to_value())
                .unwrap_or_default(),
        }
    }
}

fn parse_keyword<T>(spec: &PluginSpec, key: &str) -> PluginResult<T>
where
    T: FromStr + Default,
{
    match spec.get(key) {
        None => Ok(T::default()),
        Some(Value::String(raw)) => T::from_str(raw).map_err(|_| {
            PluginError::invalid_config(&spec.plugin, format!("unknown {key}: {raw}"))
        }),
        Some(other) => Err(PluginError::invalid_config(
            &spec.plugin,
            format!("{key} must be a string, got {}", other.type_name()),
        )),
    }
}

fn parse_flag(spec: &PluginSpec, key: &str) -> PluginResult<bool> {
    match spec.get(key) {
        None => Ok(false),
        Some(Value::Boolean(flag)) => Ok(*flag),
        Some(other) => Err(PluginError::invalid_config(
            &spec.plugin,
            format!("{key} must be a boolean, got {}", other.type_name()),
        )),
    }
}

fn required_string(spec: &PluginSpec, key: &str) -> PluginResult<String> {
    match spec.get(key) {
        Some(Value::String(raw)) => Ok(raw.clone()),
        Some(other) => Err(PluginError::invalid_config(
            &spec.plugin,
            format!("{key} must be a string, got {}", other.type_name()),
        )),
        None => Err(PluginError::invalid_config(
            &spec.plugin,
            format!("{key} is required"),
        )),
    }
}

fn optional_string(spec: &PluginSpec, key: &str) -> PluginResult<Option<String>> {
    match spec.get(key) {
        None => Ok(None),
        Some(Value::String(raw)) => Ok(Some(raw.clone())),
        Some(other) => Err(PluginError::invalid_config(
            &spec.plugin,
            format!("{key} must be a string, got {}", other.type_name()),
        )),
    }
}

/// Compares two scalars with the permissive comparison semantics of
/// [`crate::compare`]. Plugin id: `scalar_comparison`.
#[derive(Clone, Debug)]
pub struct ScalarComparisonCondition {
    left: Operand,
    right: Operand,
    operator: CompareOperator,
    comparison: ComparisonType,
    case_sensitive: bool,
    negate: bool,
}

impl ScalarComparisonCondition {
    pub fn from_spec(spec: &PluginSpec) -> PluginResult<Self> {
        Ok(Self {
            left: Operand::from_spec(spec, "left")?,
            right: Operand::from_spec(spec, "right")?,
            operator: parse_keyword(spec, "operator")?,
            comparison: parse_keyword(spec, "type")?,
            case_sensitive: parse_flag(spec, "case_sensitive")?,
            negate: parse_flag(spec, "negate")?,
        })
    }
}

#[async_trait]
impl Condition for ScalarComparisonCondition {
    async fn evaluate(&self, scope: &ExecutionScope) -> PluginResult<bool> {
        let left = self.left.resolve(scope);
        let right = self.right.resolve(scope);
        let result = compare::evaluate(
            &left,
            &right,
            self.operator,
            self.comparison,
            self.case_sensitive,
            self.negate,
        );
        debug!(%left, %right, operator = %self.operator, result, "scalar comparison");
        Ok(result)
    }
}

/// Writes a token into the current scope. Plugin id: `set_token`.
#[derive(Clone, Debug)]
pub struct SetTokenAction {
    token: String,
    source: TokenSource,
}

#[derive(Clone, Debug, PartialEq)]
enum TokenSource {
    Literal(Value),
    Parameter(String),
    Context(String),
}

impl SetTokenAction {
    pub fn from_spec(spec: &PluginSpec) -> PluginResult<Self> {
        let token = required_string(spec, "token")?;
        let source = if let Some(value) = spec.get("value") {
            TokenSource::Literal(value.clone())
        } else if let Some(name) = optional_string(spec, "parameter")? {
            TokenSource::Parameter(name)
        } else if let Some(name) = optional_string(spec, "context")? {
            TokenSource::Context(name)
        } else {
            TokenSource::Literal(Value::Null)
        };
        Ok(Self { token, source })
    }
}

#[async_trait]
impl Action for SetTokenAction {
    async fn execute(&self, scope: &ExecutionScope) -> PluginResult<()> {
        let value = match &self.source {
            TokenSource::Literal(value) => value.clone(),
            TokenSource::Parameter(name) => {
                scope.event().parameter(name).cloned().unwrap_or_default()
            }
            TokenSource::Context(name) => scope
                .stacks()
                .get_context(DEFAULT_PURPOSE, name)
                .map(|bound| bound.to_value())
                .unwrap_or_default(),
        };
        debug!(token = %self.token, %value, "setting token");
        scope.tokens().set(self.token.clone(), value);
        Ok(())
    }
}

/// Emits a log line for the current event. Plugin id: `log_message`.
#[derive(Clone, Debug)]
pub struct LogMessageAction {
    message: String,
}

impl LogMessageAction {
    pub fn from_spec(spec: &PluginSpec) -> PluginResult<Self> {
        Ok(Self {
            message: required_string(spec, "message")?,
        })
    }
}

#[async_trait]
impl Action for LogMessageAction {
    async fn execute(&self, scope: &ExecutionScope) -> PluginResult<()> {
        info!(kind = %scope.event().kind, "{}", self.message);
        Ok(())
    }
}

/// Dispatches a custom follow-up event from inside an action chain.
/// Plugin id: `trigger_event`.
///
/// The nested dispatch runs to completion before this action returns, so
/// rules reacting to the follow-up event execute inside the current one.
#[derive(Clone, Debug)]
pub struct TriggerEventAction {
    event: String,
    subject_token: Option<String>,
}

impl TriggerEventAction {
    pub fn from_spec(spec: &PluginSpec) -> PluginResult<Self> {
        Ok(Self {
            event: required_string(spec, "event")?,
            subject_token: optional_string(spec, "subject_token")?,
        })
    }
}

#[async_trait]
impl Action for TriggerEventAction {
    async fn execute(&self, scope: &ExecutionScope) -> PluginResult<()> {
        let mut event = Event::new(EventKind::custom(&self.event));
        if let Some(token) = &self.subject_token {
            if let Some(value) = scope.tokens().get(token) {
                event = event.with_subject(ContextValue::from(value));
            }
        }
        let report = scope.trigger(event).await;
        debug!(
            dispatch_id = %report.dispatch_id,
            matched = report.matched_rules,
            executed = report.executed_actions,
            "nested event dispatched"
        );
        Ok(())
    }
}

/// Does nothing. Plugin id: `noop`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAction;

#[async_trait]
impl Action for NoopAction {
    async fn execute(&self, _scope: &ExecutionScope) -> PluginResult<()> {
        Ok(())
    }
}
