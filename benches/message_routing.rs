//! Message routing and store throughput benchmarks.

use conduit_bus::database::{DatabaseConfig, DatabaseConnection, DatabasePath};
use conduit_bus::domain_types::{MessageKind, Sender, TraceId};
use conduit_bus::message::Message;
use conduit_bus::store::{SqliteStore, Store};
use conduit_bus::Router;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn generate_test_message(payload_size: usize) -> Message {
    Message::new(
        MessageKind::UserMessage,
        Sender::User,
        serde_json::json!({"text": "x".repeat(payload_size)}),
    )
    .with_trace_id(TraceId::generate())
}

async fn test_store_and_router() -> (Arc<dyn Store>, Router) {
    let dir = tempfile::tempdir().unwrap();
    let path = DatabasePath::new(dir.path().join("bench.db")).unwrap();
    let conn = DatabaseConnection::initialize(DatabaseConfig::for_testing(path))
        .await
        .unwrap();
    std::mem::forget(dir);
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(conn));
    let router = Router::new(Arc::clone(&store));
    (store, router)
}

/// Benchmark routing a single message of varying payload size.
fn bench_route_single_message(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("message_routing");
    group.measurement_time(Duration::from_secs(10));

    for payload_size in [64, 512, 4096, 32768] {
        group.throughput(Throughput::Bytes(payload_size as u64));

        group.bench_with_input(
            BenchmarkId::new("route_single_message", payload_size),
            &payload_size,
            |b, &payload_size| {
                b.to_async(&rt).iter(|| async {
                    let (_store, router) = test_store_and_router().await;
                    let message = generate_test_message(payload_size);
                    let result = router.route(message).await;
                    std::hint::black_box(result)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark lease throughput against a pre-populated queue.
fn bench_lease_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("lease_throughput");
    group.measurement_time(Duration::from_secs(10));

    for queue_depth in [1u64, 10, 100, 1000] {
        group.throughput(Throughput::Elements(queue_depth));

        group.bench_with_input(
            BenchmarkId::new("lease_from_populated_queue", queue_depth),
            &queue_depth,
            |b, &queue_depth| {
                b.to_async(&rt).iter(|| async {
                    let (store, router) = test_store_and_router().await;
                    for _ in 0..queue_depth {
                        router.route(generate_test_message(64)).await.unwrap();
                    }
                    let leased = store
                        .lease(&conduit_bus::router::queues::router(), Duration::from_secs(30))
                        .await;
                    std::hint::black_box(leased)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_route_single_message, bench_lease_throughput);
criterion_main!(benches);
