/// Strategy selection benchmarks
///
/// Measures selection latency with and without learned history, and the
/// cost of recording outcomes.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use recovery_selector::{
    ErrorCategory, ErrorClassification, ErrorContext, Recoverability, RecoveryStrategySelector,
    Severity, StrategyType,
};

fn critical_resource() -> ErrorClassification {
    ErrorClassification::new(
        Severity::Critical,
        ErrorCategory::Resource,
        Recoverability::Partial,
    )
}

fn transient() -> ErrorClassification {
    ErrorClassification::new(
        Severity::Warning,
        ErrorCategory::Transient,
        Recoverability::Automatic,
    )
    .with_data_risk()
}

// Benchmark selection on an empty ledger
fn bench_cold_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_selection");
    let selector = RecoveryStrategySelector::new();

    let cases = [
        ("critical_resource", critical_resource(), ErrorContext::new(2, "planner")),
        (
            "transient_retry",
            transient(),
            ErrorContext::new(3, "tool-runner")
                .with_attempts(2)
                .with_previous_strategy(StrategyType::RetrySame),
        ),
    ];

    for (name, classification, context) in cases.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &(classification, context), |b, (cl, ctx)| {
            b.iter(|| black_box(selector.select_strategy(cl, ctx)));
        });
    }

    group.finish();
}

// Benchmark selection with a populated ledger across many context keys
fn bench_warm_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("warm_selection");

    for keys in [1usize, 100, 1_000] {
        let selector = RecoveryStrategySelector::new();
        let classification = critical_resource();

        for k in 0..keys {
            let context = ErrorContext::new(2, format!("component-{}", k));
            for (n, strategy) in StrategyType::ALL.iter().enumerate() {
                selector.record_outcome(*strategy, &classification, &context, n % 2 == 0, 250.0, 0.2);
            }
        }

        let context = ErrorContext::new(2, "component-0");
        group.bench_with_input(BenchmarkId::from_parameter(keys), &keys, |b, _| {
            b.iter(|| black_box(selector.select_strategy(&classification, &context)));
        });
    }

    group.finish();
}

// Benchmark outcome recording throughput
fn bench_record_outcome(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_outcome");
    let num_outcomes = 1_000;

    group.throughput(Throughput::Elements(num_outcomes as u64));

    group.bench_function("single_key", |b| {
        let classification = transient();
        let context = ErrorContext::new(2, "api");
        b.iter(|| {
            let selector = RecoveryStrategySelector::new();
            for n in 0..num_outcomes {
                selector.record_outcome(
                    StrategyType::RetrySame,
                    &classification,
                    &context,
                    n % 4 != 0,
                    120.0,
                    0.05,
                );
            }
            black_box(selector.effectiveness_statistics());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_cold_selection,
    bench_warm_selection,
    bench_record_outcome
);
criterion_main!(benches);
