use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use siloq::config::EngineConfig;
use siloq::core::batch::SendMessageBatchEntry;
use siloq::types::digest::{md5_of_attributes, md5_of_body};
use siloq::types::{MessageAttributeValue, MessageAttributes, ReceiveOptions, SendMessageInput};
use siloq::{Engine, QueueService};
use std::collections::HashMap;
use tokio::runtime::Runtime;

/// Engine with one fresh queue
async fn create_test_queue(engine: &Engine) -> String {
    let name = format!("bench-queue-{}", uuid::Uuid::new_v4().simple());
    engine.create_queue(&name, HashMap::new()).await.unwrap()
}

/// Benchmark MD5 of message bodies with different sizes
fn bench_md5_body(c: &mut Criterion) {
    let mut group = c.benchmark_group("md5_of_body");

    for size in [100, 1024, 10240, 262_144].iter() {
        let body = "x".repeat(*size);

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(md5_of_body(black_box(&body))));
        });
    }
    group.finish();
}

/// Benchmark MD5 of message attributes with different attribute counts
fn bench_md5_attributes(c: &mut Criterion) {
    let mut group = c.benchmark_group("md5_of_attributes");

    for count in [1, 5, 10].iter() {
        let attributes: MessageAttributes = (0..*count)
            .map(|i| (format!("attr{}", i), MessageAttributeValue::string(format!("value{}", i))))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| black_box(md5_of_attributes(black_box(&attributes))));
        });
    }
    group.finish();
}

/// Benchmark send_message with different body sizes
fn bench_send_message(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("send_message");

    for size in [100, 1024, 10240, 102400].iter() {
        let engine = Engine::new(EngineConfig::default());
        let queue_url = rt.block_on(create_test_queue(&engine));
        let body = "x".repeat(*size);

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(
                    engine
                        .send_message(&queue_url, SendMessageInput::new(body.clone()))
                        .await
                        .unwrap(),
                );
            });
        });
    }
    group.finish();
}

/// Benchmark a full batch of ten sends
fn bench_send_message_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let engine = Engine::new(EngineConfig::default());
    let queue_url = rt.block_on(create_test_queue(&engine));

    let mut group = c.benchmark_group("send_message_batch");
    group.throughput(Throughput::Elements(10));
    group.bench_function("10_entries", |b| {
        b.to_async(&rt).iter(|| async {
            let entries = (0..10)
                .map(|i| SendMessageBatchEntry {
                    id: format!("entry-{}", i),
                    input: SendMessageInput::new("test message body"),
                })
                .collect();
            black_box(
                engine
                    .send_message_batch(&queue_url, entries)
                    .await
                    .unwrap(),
            );
        });
    });
    group.finish();
}

/// Benchmark send, receive and delete of one message
fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("round_trip");

    for max_messages in [1u32, 10].iter() {
        let engine = Engine::new(EngineConfig::default());
        let queue_url = rt.block_on(create_test_queue(&engine));

        group.throughput(Throughput::Elements(u64::from(*max_messages)));
        group.bench_with_input(
            BenchmarkId::from_parameter(max_messages),
            max_messages,
            |b, &max| {
                b.to_async(&rt).iter(|| async {
                    for _ in 0..max {
                        engine
                            .send_message(&queue_url, SendMessageInput::new("ping"))
                            .await
                            .unwrap();
                    }
                    let messages = engine
                        .receive_message(&queue_url, ReceiveOptions::max(max))
                        .await
                        .unwrap();
                    for message in messages {
                        engine
                            .delete_message(&queue_url, &message.receipt_handle)
                            .await
                            .unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

/// Benchmark a sweep over queues holding in-flight messages
fn bench_sweep(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("sweep");

    for queue_count in [1, 10, 100].iter() {
        let engine = Engine::new(EngineConfig::default());
        rt.block_on(async {
            for _ in 0..*queue_count {
                let queue_url = create_test_queue(&engine).await;
                for _ in 0..10 {
                    engine
                        .send_message(&queue_url, SendMessageInput::new("idle"))
                        .await
                        .unwrap();
                }
            }
        });

        group.bench_with_input(
            BenchmarkId::from_parameter(queue_count),
            queue_count,
            |b, _| {
                b.to_async(&rt).iter(|| async {
                    black_box(engine.sweep().await);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_md5_body,
    bench_md5_attributes,
    bench_send_message,
    bench_send_message_batch,
    bench_round_trip,
    bench_sweep
);
criterion_main!(benches);
