//! Performance benchmarks for the pub/sub engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use submux::{MemoryConnection, PubSub};

/// Benchmark dispatch fan-out with varying listener counts on one topic.
fn bench_dispatch_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_fanout");

    for listeners in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &listeners,
            |b, &count| {
                let pubsub = PubSub::new(MemoryConnection::new());
                for _ in 0..count {
                    pubsub
                        .subscribe(
                            "bench",
                            Arc::new(|payload| {
                                black_box(payload);
                            }),
                            None,
                        )
                        .unwrap();
                }
                let payload = json!({"seq": 1, "body": "0123456789abcdef"});
                b.iter(|| pubsub.publish("bench", &payload).unwrap());
            },
        );
    }

    group.finish();
}

/// Benchmark subscribe/unsubscribe churn against an already-hot topic.
fn bench_subscribe_churn(c: &mut Criterion) {
    c.bench_function("subscribe_unsubscribe_multiplexed", |b| {
        let pubsub = PubSub::new(MemoryConnection::new());
        // Keep the topic alive so churn never touches the broker.
        pubsub.subscribe("churn", Arc::new(|_| {}), None).unwrap();

        b.iter(|| {
            let id = pubsub.subscribe("churn", Arc::new(|_| {}), None).unwrap();
            pubsub.unsubscribe(id).unwrap();
        });
    });

    c.bench_function("subscribe_unsubscribe_cold_topic", |b| {
        let pubsub = PubSub::new(MemoryConnection::new());
        b.iter(|| {
            let id = pubsub.subscribe("cold", Arc::new(|_| {}), None).unwrap();
            pubsub.unsubscribe(id).unwrap();
        });
    });
}

/// Benchmark pull throughput through a subscription stream.
fn bench_stream_pull(c: &mut Criterion) {
    c.bench_function("stream_pull_buffered", |b| {
        let pubsub = PubSub::new(MemoryConnection::new());
        let stream = pubsub.stream("pull").unwrap();
        let payload = json!({"n": 7});

        b.iter(|| {
            pubsub.publish("pull", &payload).unwrap();
            black_box(stream.next());
        });
    });
}

criterion_group!(
    benches,
    bench_dispatch_fanout,
    bench_subscribe_churn,
    bench_stream_pull
);
criterion_main!(benches);
