use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use spark_deferred::{DeferredError, DeferredRuntime, ManualScheduler, Operation};

/// `bench_chain_depth` 度量链式组合的单级开销。
///
/// # 设计目的（Why）
/// - 每一级 `then` 都会新建结算单元并投递一次调度任务，链越深，分配与调度的成本越明显；
///   以不同深度测量，可以区分固定开销与线性开销。
///
/// # 执行逻辑（How）
/// - 使用 `ManualScheduler`，在每次迭代内构造链、结算源头并 `run_until_idle`，排除线程切换的干扰。
fn bench_chain_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_depth");
    for depth in [1_usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let scheduler = ManualScheduler::new();
            let runtime = DeferredRuntime::new(scheduler.clone());
            b.iter(|| {
                let (resolver, source) = runtime.deferred::<u64, DeferredError>();
                let mut tail = source;
                for _ in 0..depth {
                    tail = tail.and_then(|value| Ok::<_, DeferredError>(value + 1));
                }
                resolver.fulfill(black_box(0));
                scheduler.run_until_idle();
                black_box(tail.result())
            });
        });
    }
    group.finish();
}

/// `bench_batch_width` 度量聚合组合器随输入数量的扩展性。
fn bench_batch_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_width");
    for width in [4_usize, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            let scheduler = ManualScheduler::new();
            let runtime = DeferredRuntime::new(scheduler.clone());
            b.iter(|| {
                let all = runtime.batch((0..width).map(|index| {
                    Operation::<usize, DeferredError>::producer(move |resolver| {
                        resolver.fulfill(index)
                    })
                }));
                scheduler.run_until_idle();
                black_box(all.result())
            });
        });
    }
    group.finish();
}

criterion_group!(deferred_benches, bench_chain_depth, bench_batch_width);
criterion_main!(deferred_benches);
