use std::sync::Arc;

use async_trait::async_trait;

use karakuri::{
    Action, ActionRegistry, ConditionRegistry, ContextValue, EntityRef, Engine, EngineConfig,
    Event, EventBus, EventError, EventKind, ExecutionScope, PluginError, PluginResult, PluginSpec,
    Rule, RuleStep, Value, DEFAULT_PURPOSE,
};

#[tokio::test]
async fn test_failed_step_does_not_stop_the_chain() {
    let engine = Engine::default();
    engine.register_rule(
        Rule::new("mixed", EventKind::Timer)
            .with_step(RuleStep::new(PluginSpec::new("noop")))
            .with_step(RuleStep::new(PluginSpec::new("missing_action")))
            .with_step(RuleStep::new(PluginSpec::new("noop"))),
    );

    let report = engine.dispatch(Event::new(EventKind::Timer)).await;
    assert_eq!(report.executed_actions, 2);
    assert_eq!(report.skipped_steps, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].error_type, "plugin_not_found");
}

#[tokio::test]
async fn test_invalid_condition_config_skips_step_not_dispatch() {
    let engine = Engine::default();
    engine.register_rule(
        Rule::new("a_broken", EventKind::Timer).with_step(
            RuleStep::new(PluginSpec::new("noop")).with_condition(
                PluginSpec::new("scalar_comparison").with("operator", "wibble"),
            ),
        ),
    );
    engine.register_rule(
        Rule::new("z_ok", EventKind::Timer).with_step(RuleStep::new(PluginSpec::new("noop"))),
    );

    let report = engine.dispatch(Event::new(EventKind::Timer)).await;
    assert_eq!(report.matched_rules, 2);
    // The broken gate costs its own step; the other rule is untouched.
    assert_eq!(report.executed_actions, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].rule_id, "a_broken");
    assert_eq!(report.errors[0].error_type, "invalid_configuration");
}

#[tokio::test]
async fn test_error_events_carry_rule_and_plugin() {
    let engine = Engine::default();
    let (_, mut error_rx) = engine.event_bus().subscribe();

    engine.register_rule(
        Rule::new("broken", EventKind::custom("boom"))
            .with_step(RuleStep::new(PluginSpec::new("missing_action"))),
    );
    engine.dispatch(Event::new(EventKind::custom("boom"))).await;

    let published = error_rx.recv().await.unwrap();
    assert_eq!(published.error_type, "plugin_not_found");
    assert!(published.message.contains("missing_action"));
    assert_eq!(
        published.parameters.get("rule_id"),
        Some(&Value::from("broken"))
    );
    assert_eq!(
        published.parameters.get("plugin"),
        Some(&Value::from("missing_action"))
    );
}

#[tokio::test]
async fn test_failing_action_reported_and_context_restored() {
    struct FailingAction;

    #[async_trait]
    impl Action for FailingAction {
        async fn execute(&self, _scope: &ExecutionScope) -> PluginResult<()> {
            Err(PluginError::execution_failed("fail", "deliberate failure"))
        }
    }

    let actions = ActionRegistry::with_builtin();
    actions.register("fail", |_| Ok(Arc::new(FailingAction) as Arc<dyn Action>));
    let engine = Engine::with_resolvers(
        EngineConfig::default(),
        Arc::new(ConditionRegistry::with_builtin()),
        Arc::new(actions),
    );

    engine.context().tokens.set("keep", Value::from("before"));
    engine.register_rule(
        Rule::new("fails", EventKind::updated("node"))
            .with_step(RuleStep::new(PluginSpec::new("fail"))),
    );

    let event = Event::new(EventKind::updated("node"))
        .with_subject(ContextValue::entity(EntityRef::new("node", "9")));
    let report = engine.dispatch(event).await;

    assert_eq!(report.executed_actions, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].error_type, "plugin_failed");

    assert_eq!(engine.context().stacks.depth(DEFAULT_PURPOSE), 0);
    assert_eq!(
        engine.context().tokens.get("keep"),
        Some(Value::from("before"))
    );
}

#[tokio::test]
async fn test_lagged_receiver_resubscribes_and_recovers() {
    let bus = EventBus::new(2);
    let (mut event_rx, _) = bus.subscribe();

    for i in 0..4 {
        bus.publish(Event::new(EventKind::custom(format!("e{i}"))))
            .await
            .unwrap();
    }

    let lagged = event_rx.recv().await.unwrap_err();
    assert_eq!(lagged, EventError::Lagged { count: 2 });

    // The receiver came back resubscribed; new events flow again.
    bus.publish(Event::new(EventKind::custom("fresh"))).await.unwrap();
    let received = event_rx.recv().await.unwrap();
    assert_eq!(received.kind, EventKind::custom("fresh"));
}
