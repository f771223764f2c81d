use criterion::{black_box, criterion_group, criterion_main, Criterion};

use karakuri::{
    compare, CompareOperator, ComparisonType, ContextCollection, ContextStack, ContextValue,
    EngineContext, EntityRef, Engine, EngineConfig, Event, EventKind, ExecutionFrame, PluginSpec,
    Rule, RuleStep, TypedValue, Value,
};

fn bench_stack_push_unwind(c: &mut Criterion) {
    c.bench_function("stack push and unwind 16 deep", |b| {
        b.iter(|| {
            let mut stack = ContextStack::new();
            let marker = stack.push(ContextCollection::placeholder());
            for i in 0..16 {
                stack.push(ContextCollection::single(
                    "entity",
                    ContextValue::entity(EntityRef::new("node", i.to_string())),
                ));
            }
            stack.unwind(&marker);
            black_box(stack.len())
        })
    });
}

fn bench_innermost_lookup(c: &mut Criterion) {
    let mut stack = ContextStack::new();
    for i in 0..32 {
        stack.push(ContextCollection::single(
            format!("name{}", i),
            ContextValue::scalar(TypedValue::of(Value::Integer(i))),
        ));
    }

    c.bench_function("innermost lookup across 32 collections", |b| {
        b.iter(|| black_box(stack.get_context("name0")))
    });
}

fn bench_compare(c: &mut Criterion) {
    let left = Value::from("my test string");
    let right = Value::from("MY TEST STRING");

    c.bench_function("case folded equals", |b| {
        b.iter(|| {
            black_box(compare::evaluate(
                &left,
                &right,
                CompareOperator::Equals,
                ComparisonType::Value,
                false,
                false,
            ))
        })
    });

    let five = Value::from("5");
    let four = Value::Integer(4);
    c.bench_function("numeric greaterthan with coercion", |b| {
        b.iter(|| {
            black_box(compare::evaluate(
                &five,
                &four,
                CompareOperator::GreaterThan,
                ComparisonType::Numeric,
                false,
                false,
            ))
        })
    });
}

fn bench_frame_cycle(c: &mut Criterion) {
    let context = EngineContext::new();
    let event = Event::new(EventKind::updated("node"))
        .with_subject(ContextValue::entity(EntityRef::new("node", "1")));

    c.bench_function("frame enter and exit", |b| {
        b.iter(|| {
            let mut frame = ExecutionFrame::enter(context.clone(), &event);
            frame.exit();
        })
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let engine = Engine::new(EngineConfig::default());
    engine.register_rule(
        Rule::new("bench", EventKind::Timer)
            .with_step(RuleStep::new(PluginSpec::new("noop")))
            .with_step(
                RuleStep::new(PluginSpec::new("noop")).with_condition(
                    PluginSpec::new("scalar_comparison")
                        .with("left", "a")
                        .with("right", "a"),
                ),
            ),
    );

    c.bench_function("dispatch two-step rule", |b| {
        b.iter(|| {
            let report = runtime.block_on(engine.dispatch(Event::new(EventKind::Timer)));
            black_box(report.executed_actions)
        })
    });
}

// ベンチマークグループの定義
criterion_group!(
    benches,
    bench_stack_push_unwind,
    bench_innermost_lookup,
    bench_compare,
    bench_frame_cycle,
    bench_dispatch
);
criterion_main!(benches);
