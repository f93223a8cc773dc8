use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use resilient_amqp::message::{ContentType, Message, Route};
use resilient_amqp::queue::PublishQueue;

fn msg() -> Message {
    Message::new(Route::topic("test", "test.event.ping"), vec![1, 2, 3], ContentType::Json)
}

fn enqueue_benchmark(c: &mut Criterion) {
    c.bench_function("enqueue_until_full", |b| {
        b.iter(|| {
            let queue = PublishQueue::new(128);
            for _ in 0..128 {
                black_box(queue.enqueue(msg())).ok();
            }
        });
    });

    c.bench_function("enqueue_single", |b| {
        let queue = PublishQueue::new(1024);
        b.iter(|| {
            let _ = queue.enqueue(msg());
        });
    });
}

criterion_group!(benches, enqueue_benchmark);
criterion_main!(benches);
