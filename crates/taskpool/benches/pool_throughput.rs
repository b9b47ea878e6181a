//! Worker pool throughput
//!
//! Measures the full create → submit → close → wait cycle for no-op tasks
//! across worker counts and queue capacities.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use taskpool::{Task, WorkerPool};

const TASKS: u64 = 10_000;

fn run_pool(workers: usize, capacity: usize) {
    let pool = WorkerPool::new(workers, capacity).expect("pool");
    for id in 0..TASKS {
        pool.submit(Task::new(id, id, move || {
            black_box(id.wrapping_mul(31));
            Ok(())
        }))
        .expect("submit");
    }
    black_box(pool.shutdown());
}

fn bench_worker_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_count");
    group.throughput(Throughput::Elements(TASKS));
    group.sample_size(20);

    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| run_pool(w, 256));
        });
    }
    group.finish();
}

fn bench_queue_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_capacity");
    group.throughput(Throughput::Elements(TASKS));
    group.sample_size(20);

    for capacity in [1usize, 16, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &cap| {
                b.iter(|| run_pool(4, cap));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_worker_counts, bench_queue_capacity);
criterion_main!(benches);
