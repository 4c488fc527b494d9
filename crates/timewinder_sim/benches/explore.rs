use criterion::{black_box, criterion_group, criterion_main, Criterion};
use timewinder_check::EvaluatorConfig;
use timewinder_core::ChoiceSet;
use timewinder_sim::{accounts, condwait, queue};

// Unguarded transfers stop at the first overdraft (89 states); the guarded
// run explores the whole space, so it dominates the numbers.
fn bench_transfers(c: &mut Criterion) {
    let amounts = ChoiceSet::in_range(1, 5);
    let config = EvaluatorConfig::default().with_max_steps(10);

    c.bench_function("transfers_unguarded", |b| {
        b.iter(|| {
            let mut ev = accounts::transfers(false, &amounts)
                .unwrap()
                .with_config(config.clone());
            black_box(ev.evaluate().is_err())
        })
    });

    c.bench_function("transfers_guarded", |b| {
        b.iter(|| {
            let mut ev = accounts::transfers(true, &amounts)
                .unwrap()
                .with_config(config.clone());
            black_box(ev.evaluate().unwrap().states)
        })
    });
}

fn bench_queues(c: &mut Criterion) {
    c.bench_function("queue_pipeline", |b| {
        b.iter(|| {
            let mut ev = queue::pipeline(queue::waiting_writer(), queue::waiting_reader())
                .unwrap()
                .with_config(EvaluatorConfig::default().unbounded());
            black_box(ev.evaluate().unwrap().states)
        })
    });

    c.bench_function("condwait_2p_2c", |b| {
        b.iter(|| {
            let mut ev = condwait::bounded_queue(2, 2, 2)
                .unwrap()
                .with_config(EvaluatorConfig::default().with_max_steps(12));
            black_box(ev.evaluate().map(|s| s.states).unwrap_or_default())
        })
    });
}

criterion_group!(benches, bench_transfers, bench_queues);
criterion_main!(benches);
