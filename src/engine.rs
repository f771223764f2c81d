//! The dispatch engine tying rules, plugins, frames and the event bus
//! together.
//!
//! Dispatch never fails: whatever goes wrong while rules run is collected
//! into the returned [`DispatchReport`] and published on the error channel,
//! and the frame and bracket cleanup runs regardless. Actions may trigger
//! nested dispatches through their [`ExecutionScope`]; those re-enter the
//! same engine on the same task, nesting frames like matched parentheses.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{SelectAll, Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bus::{ErrorEvent, ErrorSeverity, EventBus};
use crate::config::EngineConfig;
use crate::context::{ContextValue, EngineContext};
use crate::error::EngineResult;
use crate::event::{Event, EventKind};
use crate::frame::{ActionBracket, ExecutionFrame};
use crate::model::{Rule, RuleRegistry};
use crate::plugin::{
    ActionRegistry, ActionResolver, ConditionRegistry, ConditionResolver, ExecutionScope,
    PluginError,
};
use crate::value::Value;

/// Outcome of dispatching one event.
#[derive(Clone, Debug)]
pub struct DispatchReport {
    pub dispatch_id: Uuid,
    pub kind: EventKind,
    pub dispatched_at: DateTime<Utc>,
    pub matched_rules: usize,
    pub executed_actions: usize,
    /// Steps whose condition gate evaluated false.
    pub skipped_steps: usize,
    pub errors: Vec<DispatchError>,
}

impl DispatchReport {
    fn new(kind: EventKind) -> Self {
        Self {
            dispatch_id: Uuid::new_v4(),
            kind,
            dispatched_at: Utc::now(),
            matched_rules: 0,
            executed_actions: 0,
            skipped_steps: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record_error(&mut self, rule_id: &str, plugin: &str, error: &PluginError) {
        self.errors.push(DispatchError {
            rule_id: rule_id.to_string(),
            plugin: plugin.to_string(),
            error_type: error.error_type().to_string(),
            message: error.to_string(),
        });
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DispatchError {
    pub rule_id: String,
    pub plugin: String,
    pub error_type: String,
    pub message: String,
}

/// Rule execution engine.
///
/// Cheap to clone; clones share the same context, rules, resolvers and bus.
/// Plugins receive a clone through their scope, which is what makes nested
/// event triggering possible.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    context: EngineContext,
    rules: RuleRegistry,
    conditions: Arc<dyn ConditionResolver>,
    actions: Arc<dyn ActionResolver>,
    bus: Arc<EventBus>,
    depth: Arc<AtomicUsize>,
}

enum StreamMessage {
    Event(Event),
    Lagged(u64),
    Shutdown,
}

impl Engine {
    /// Engine with the stock plugin registries.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_resolvers(
            config,
            Arc::new(ConditionRegistry::with_builtin()),
            Arc::new(ActionRegistry::with_builtin()),
        )
    }

    /// Engine with injected plugin resolvers.
    pub fn with_resolvers(
        config: EngineConfig,
        conditions: Arc<dyn ConditionResolver>,
        actions: Arc<dyn ActionResolver>,
    ) -> Self {
        let bus = Arc::new(EventBus::new(config.event_buffer_size));
        let rules = RuleRegistry::new();
        for rule in &config.rules {
            rules.register(rule.clone());
        }
        Self {
            config,
            context: EngineContext::new(),
            rules,
            conditions,
            actions,
            bus,
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn register_rule(&self, rule: Rule) -> Option<Arc<Rule>> {
        self.rules.register(rule)
    }

    /// Publish an event onto the bus for the run loop to pick up.
    pub async fn publish(&self, event: Event) -> EngineResult<()> {
        self.bus.publish(event).await?;
        Ok(())
    }

    /// Execute every rule matching `event`, inside one execution frame.
    ///
    /// Infallible by design: plugin failures are recorded on the report and
    /// published as error events, and the frame is exited either way.
    #[instrument(level = "debug", skip(self, event), fields(kind = %event.kind))]
    pub async fn dispatch(&self, event: Event) -> DispatchReport {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if depth >= self.config.reentrancy_warn_depth {
            warn!(depth, kind = %event.kind, "deep reentrant dispatch");
        }

        let mut report = DispatchReport::new(event.kind.clone());
        let rules = self.rules.matching(&event.kind);
        report.matched_rules = rules.len();
        debug!(
            dispatch_id = %report.dispatch_id,
            matched = rules.len(),
            depth,
            "dispatching event"
        );

        let mut frame = ExecutionFrame::enter(self.context.clone(), &event);
        let scope = ExecutionScope::new(self.clone(), event);
        for rule in &rules {
            self.execute_rule(rule, &scope, &mut report).await;
        }
        frame.exit();

        self.depth.fetch_sub(1, Ordering::SeqCst);
        report
    }

    async fn execute_rule(&self, rule: &Rule, scope: &ExecutionScope, report: &mut DispatchReport) {
        debug!(rule_id = %rule.id, steps = rule.steps.len(), "running rule");
        for step in &rule.steps {
            if let Some(condition_spec) = &step.condition {
                let verdict = match self.conditions.resolve_condition(condition_spec) {
                    Ok(condition) => condition.evaluate(scope).await,
                    Err(error) => Err(error),
                };
                match verdict {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(rule_id = %rule.id, condition = %condition_spec.plugin, "step gated off");
                        report.skipped_steps += 1;
                        continue;
                    }
                    Err(error) => {
                        report.record_error(&rule.id, &condition_spec.plugin, &error);
                        self.publish_plugin_error(&rule.id, &condition_spec.plugin, &error)
                            .await;
                        continue;
                    }
                }
            }

            let subject = step
                .subject
                .as_ref()
                .and_then(|token| self.context.tokens.get(token))
                .map(ContextValue::from);
            let mut bracket = ActionBracket::before(self.context.clone(), subject.as_ref());

            // The bracket closes whether or not the plugin resolves.
            match self.actions.resolve_action(&step.action) {
                Ok(action) => match action.execute(scope).await {
                    Ok(()) => report.executed_actions += 1,
                    Err(error) => {
                        report.record_error(&rule.id, &step.action.plugin, &error);
                        self.publish_plugin_error(&rule.id, &step.action.plugin, &error)
                            .await;
                    }
                },
                Err(error) => {
                    report.record_error(&rule.id, &step.action.plugin, &error);
                    self.publish_plugin_error(&rule.id, &step.action.plugin, &error)
                        .await;
                }
            }
            bracket.after();
        }
    }

    async fn publish_plugin_error(&self, rule_id: &str, plugin: &str, error: &PluginError) {
        warn!(rule_id, plugin, error = %error, "plugin error during dispatch");
        let event = ErrorEvent::new(error.error_type(), error.to_string(), ErrorSeverity::Error)
            .with_parameter("rule_id", Value::from(rule_id))
            .with_parameter("plugin", Value::from(plugin));
        if let Err(publish_error) = self.bus.publish_error(event).await {
            debug!(error = %publish_error, "error event could not be published");
        }
    }

    /// Consume events from the bus until a shutdown signal arrives.
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> EngineResult<()> {
        let (event_rx, _error_rx) = self.bus.subscribe();

        let event_stream = BroadcastStream::new(event_rx.receiver).map(|received| match received {
            Ok(event) => Ok(StreamMessage::Event(event)),
            Err(BroadcastStreamRecvError::Lagged(n)) => Ok(StreamMessage::Lagged(n)),
        });
        let shutdown_stream = BroadcastStream::new(shutdown_rx).map(|received| match received {
            Ok(_) => Ok(StreamMessage::Shutdown),
            Err(_) => Err(()),
        });

        let mut streams: SelectAll<Pin<Box<dyn Stream<Item = Result<StreamMessage, ()>> + Send>>> =
            SelectAll::new();
        streams.push(Box::pin(event_stream));
        streams.push(Box::pin(shutdown_stream));

        info!(rules = self.rules.len(), "engine started");
        while let Some(Ok(message)) = streams.next().await {
            match message {
                StreamMessage::Event(event) => {
                    let report = self.dispatch(event).await;
                    if !report.is_clean() {
                        warn!(
                            dispatch_id = %report.dispatch_id,
                            errors = report.errors.len(),
                            "dispatch finished with errors"
                        );
                    }
                }
                StreamMessage::Lagged(count) => {
                    warn!(count, "event receiver lagged, events skipped");
                }
                StreamMessage::Shutdown => {
                    info!("engine received shutdown signal");
                    break;
                }
            }
        }
        info!("engine stopped");
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
