//! 聚合组合器集成测试
//!
//! - **意图 (Why)**：验证 `batch` 的“全部兑现或首个拒绝”语义，以及结果顺序只取决于输入顺序。
//! - **方法 (How)**：以手动调度器控制各输入的完成顺序，逐步推进后检查聚合结果。

mod support;

use spark_deferred::{DeferredError, Operation, PanicOrigin, Status, batch};
use support::manual_runtime;

#[test]
fn results_follow_input_order_not_completion_order() {
    let (runtime, scheduler) = manual_runtime();
    let (resolve_a, a) = runtime.deferred::<u32, DeferredError>();
    let (resolve_b, b) = runtime.deferred::<u32, DeferredError>();
    let (resolve_c, c) = runtime.deferred::<u32, DeferredError>();

    let all = batch!(runtime; a, b, c);

    resolve_c.fulfill(3);
    scheduler.run_until_idle();
    resolve_a.fulfill(1);
    scheduler.run_until_idle();
    assert_eq!(all.status(), Status::Pending, "仍有输入未完成");

    resolve_b.fulfill(2);
    scheduler.run_until_idle();
    assert_eq!(all.result(), Some(Ok(vec![1, 2, 3])));
}

#[test]
fn first_rejection_short_circuits() {
    let (runtime, scheduler) = manual_runtime();
    let (resolve_a, a) = runtime.deferred::<u32, DeferredError>();
    let (_never, b) = runtime.deferred::<u32, DeferredError>();

    let all = runtime.batch([Operation::from(a), Operation::from(b)]);
    resolve_a.reject(DeferredError::rejected("boom"));
    scheduler.run_until_idle();

    assert_eq!(
        all.result(),
        Some(Err(DeferredError::rejected("boom"))),
        "未结算的兄弟输入不得阻塞拒绝"
    );
}

#[test]
fn later_results_are_discarded_after_rejection() {
    let (runtime, scheduler) = manual_runtime();
    let (resolve_a, a) = runtime.deferred::<u32, DeferredError>();
    let (resolve_b, b) = runtime.deferred::<u32, DeferredError>();

    let all = batch!(runtime; a, b);
    resolve_b.reject(DeferredError::rejected("first"));
    scheduler.run_until_idle();
    resolve_a.reject(DeferredError::rejected("second"));
    scheduler.run_until_idle();

    assert_eq!(all.result(), Some(Err(DeferredError::rejected("first"))));
}

#[test]
fn empty_input_fulfills_with_empty_vec() {
    let (runtime, scheduler) = manual_runtime();
    let all = runtime.batch(Vec::<Operation<u8, DeferredError>>::new());

    let seen = support::Recorder::new();
    let recorder = seen.clone();
    all.observe_fulfilled(move |values: Vec<u8>| recorder.push(values.len()));
    assert!(seen.is_empty(), "空输入的订阅者同样延迟执行");

    scheduler.run_until_idle();
    assert_eq!(all.result(), Some(Ok(Vec::new())));
    assert_eq!(seen.snapshot(), vec![0]);
}

#[test]
fn producer_operations_receive_a_resolver() {
    let (runtime, scheduler) = manual_runtime();
    let (resolve_late, late) = runtime.deferred::<&'static str, DeferredError>();

    let all = runtime.batch(vec![
        Operation::producer(|resolver| resolver.fulfill("sync")),
        Operation::producer(move |resolver| {
            late.observe_fulfilled(move |value| resolver.fulfill(value));
        }),
        Operation::from(runtime.resolved::<_, DeferredError>("ready")),
    ]);

    scheduler.run_until_idle();
    assert_eq!(all.status(), Status::Pending);

    resolve_late.fulfill("async");
    scheduler.run_until_idle();
    assert_eq!(all.result(), Some(Ok(vec!["sync", "async", "ready"])));
}

#[test]
fn panicking_producer_rejects_the_aggregate() {
    let (runtime, scheduler) = manual_runtime();
    let all = runtime.batch(vec![
        Operation::from(runtime.resolved::<u8, DeferredError>(1)),
        Operation::producer(|_| panic!("producer exploded")),
    ]);
    scheduler.run_until_idle();

    let reason = all.result().and_then(Result::err).expect("聚合结果应被拒绝");
    assert_eq!(reason.panic_origin(), Some(PanicOrigin::Producer));
}
