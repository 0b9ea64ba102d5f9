#[macro_use]
extern crate criterion;

use criterion::Criterion;

use skysim_core::events::{FeedBatch, HandoffQueue};

fn bench_handoff_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("handoff_throughput");

    group.bench_function("bounded_5", |b| {
        let (tx, mut rx) = HandoffQueue::bounded(5);
        b.iter(|| {
            tx.publish(FeedBatch::new(0, 0.0, Vec::new())).unwrap();
            rx.try_take().unwrap();
        });
    });

    group.bench_function("latest", |b| {
        let (tx, mut rx) = HandoffQueue::latest();
        b.iter(|| {
            tx.publish(FeedBatch::new(0, 0.0, Vec::new())).unwrap();
            rx.try_take().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_handoff_push_pop);
criterion_main!(benches);
