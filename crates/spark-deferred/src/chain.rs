//! # 链式组合器（`then`）
//!
//! ## 教案级导览
//! - **Why**：`then` 是延迟值最容易写错的部分，需要同时处理回调延迟执行、同步失败捕获、
//!   嵌套延迟值展开以及缺省回调的透传。本模块把这些规则收敛到一处，其他组合器（如 `batch`）
//!   只复用这里的订阅机制。
//! - **How**：每次调用都会新建子结算单元，并为父单元的兑现、拒绝两条路径各构造一个适配器；
//!   适配器在调度任务中调用用户回调，再把回调结果 [`Step`] 落实到子单元。
//! - **What**：
//!   1. 父单元已结算时，结果被重放到刚登记的适配器，仍然延迟执行；
//!   2. 回调返回 `Err` 或发生 panic，子单元以对应原因拒绝；
//!   3. 回调返回延迟值，子单元跟随其最终结果；
//!   4. 其余返回值一律兑现子单元，包括拒绝处理器的正常返回。

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    cell::{CellId, OnFulfilled, OnRejected, SettlementCell},
    config::DeferredConfig,
    error::{PanicOrigin, Reason, panic_message},
    handle::{Deferred, Step, Thenable},
};

/// 类型擦除后的链式回调。
///
/// `then_opt` 以 `Option<Handler<..>>` 表达“可能缺省的回调”，缺省即透传。
pub type Handler<A, U, E> = Box<dyn FnOnce(A) -> Step<U, E> + Send + 'static>;

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    /// 同时登记兑现与拒绝回调，返回跟随回调结果的新延迟值。
    ///
    /// # 契约说明（What）
    /// - 两个回调至多执行一个，且总是在调度任务中执行；
    /// - 回调可返回 `Result<U, E>`、`Deferred<U, E>` 或 [`Step<U, E>`]；
    /// - 拒绝回调正常返回即视为恢复，新延迟值以其返回值兑现。
    pub fn then<U, F, G, R1, R2>(&self, on_fulfilled: F, on_rejected: G) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> R1 + Send + 'static,
        R1: Into<Step<U, E>>,
        G: FnOnce(E) -> R2 + Send + 'static,
        R2: Into<Step<U, E>>,
    {
        self.chain(
            Box::new(move |value: T| -> Step<U, E> { on_fulfilled(value).into() }),
            Box::new(move |reason: E| -> Step<U, E> { on_rejected(reason).into() }),
        )
    }

    /// 只登记兑现回调，拒绝原样透传。
    pub fn and_then<U, F, R>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: Into<Step<U, E>>,
    {
        self.chain(
            Box::new(move |value: T| -> Step<U, E> { on_fulfilled(value).into() }),
            pass_rejection(),
        )
    }

    /// 只登记拒绝回调，兑现原样透传。
    pub fn catch<G, R>(&self, on_rejected: G) -> Deferred<T, E>
    where
        G: FnOnce(E) -> R + Send + 'static,
        R: Into<Step<T, E>>,
    {
        self.chain(
            pass_fulfillment(),
            Box::new(move |reason: E| -> Step<T, E> { on_rejected(reason).into() }),
        )
    }

    /// 回调均可缺省的形式：`None` 退化为对应路径的透传。
    pub fn then_opt(
        &self,
        on_fulfilled: Option<Handler<T, T, E>>,
        on_rejected: Option<Handler<E, T, E>>,
    ) -> Deferred<T, E> {
        self.chain(
            on_fulfilled.unwrap_or_else(pass_fulfillment),
            on_rejected.unwrap_or_else(pass_rejection),
        )
    }

    /// 观察兑现结果而不派生新的延迟值，适用于“结算后渲染”一类的外部协作者。
    ///
    /// 观察者同样在调度任务中执行；开启 `capture_panics` 时其 panic 只记录日志。
    pub fn observe_fulfilled<F>(&self, observer: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        let (id, config) = (self.id(), Arc::clone(self.cell().config()));
        self.cell()
            .subscribe_fulfill(Box::new(move |value| guard_observer(id, &config, observer, value)));
    }

    /// 观察拒绝原因而不派生新的延迟值。
    pub fn observe_rejected<G>(&self, observer: G)
    where
        G: FnOnce(E) + Send + 'static,
    {
        let (id, config) = (self.id(), Arc::clone(self.cell().config()));
        self.cell()
            .subscribe_reject(Box::new(move |reason| guard_observer(id, &config, observer, reason)));
    }

    fn chain<U>(
        &self,
        on_fulfilled: Handler<T, U, E>,
        on_rejected: Handler<E, U, E>,
    ) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
    {
        let parent = self.cell();
        let child = Arc::new(SettlementCell::<U, E>::new(
            Arc::clone(parent.scheduler()),
            Arc::clone(parent.config()),
        ));
        tracing::trace!(
            parent_id = parent.id().get(),
            child_id = child.id().get(),
            "chained deferred"
        );

        parent.subscribe(
            adapter(Arc::clone(&child), on_fulfilled),
            adapter(Arc::clone(&child), on_rejected),
        );
        Deferred::from_cell(child)
    }
}

fn pass_fulfillment<T, E>() -> Handler<T, T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Box::new(Step::Value)
}

fn pass_rejection<U, E>() -> Handler<E, U, E>
where
    U: Send + 'static,
    E: Send + 'static,
{
    Box::new(Step::Fail)
}

/// 把用户回调包装成父单元的订阅者：调用回调、捕获失败、落实到子单元。
fn adapter<A, U, E>(
    child: Arc<SettlementCell<U, E>>,
    handler: Handler<A, U, E>,
) -> Box<dyn FnOnce(A) + Send>
where
    A: Send + 'static,
    U: Clone + Send + 'static,
    E: Reason,
{
    Box::new(move |argument: A| {
        let step = invoke(&child, handler, argument);
        settle_with(&child, step);
    })
}

fn invoke<A, U, E>(
    child: &SettlementCell<U, E>,
    handler: Handler<A, U, E>,
    argument: A,
) -> Step<U, E>
where
    U: Clone + Send + 'static,
    E: Reason,
{
    if !child.config().capture_panics {
        return handler(argument);
    }
    match panic::catch_unwind(AssertUnwindSafe(move || handler(argument))) {
        Ok(step) => step,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(
                cell_id = child.id().get(),
                origin = PanicOrigin::Callback.as_str(),
                panic = %message,
                "callback panicked; rejecting chained deferred"
            );
            Step::Fail(E::from_panic(PanicOrigin::Callback, &message))
        }
    }
}

/// 把回调结果落实到结算单元；`Adopt` 会让单元跟随另一个延迟值。
pub(crate) fn settle_with<U, E>(cell: &Arc<SettlementCell<U, E>>, step: Step<U, E>)
where
    U: Clone + Send + 'static,
    E: Reason,
{
    match step {
        Step::Value(value) => cell.fulfill(value),
        Step::Fail(reason) => cell.reject(reason),
        Step::Adopt(thenable) => adopt_into(cell, thenable),
    }
}

/// 让 `cell` 跟随 `thenable` 的最终结果。
///
/// 外部实现的 `subscribe` 可能 panic；此时以 [`PanicOrigin::Thenable`] 拒绝，panic 不会穿透到调度器。
pub(crate) fn adopt_into<U, E>(cell: &Arc<SettlementCell<U, E>>, thenable: Box<dyn Thenable<U, E>>)
where
    U: Clone + Send + 'static,
    E: Reason,
{
    let on_fulfilled: OnFulfilled<U> = {
        let cell = Arc::clone(cell);
        Box::new(move |value| cell.fulfill(value))
    };
    let on_rejected: OnRejected<E> = {
        let cell = Arc::clone(cell);
        Box::new(move |reason| cell.reject(reason))
    };

    if !cell.config().capture_panics {
        thenable.subscribe(on_fulfilled, on_rejected);
        return;
    }
    let registered = panic::catch_unwind(AssertUnwindSafe(move || {
        thenable.subscribe(on_fulfilled, on_rejected);
    }));
    if let Err(payload) = registered {
        let message = panic_message(payload.as_ref());
        tracing::warn!(
            cell_id = cell.id().get(),
            origin = PanicOrigin::Thenable.as_str(),
            panic = %message,
            "thenable panicked while subscribing; rejecting adopting deferred"
        );
        cell.reject(E::from_panic(PanicOrigin::Thenable, &message));
    }
}

fn guard_observer<A, F>(id: CellId, config: &DeferredConfig, observer: F, argument: A)
where
    F: FnOnce(A),
{
    if !config.capture_panics {
        observer(argument);
        return;
    }
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || observer(argument))) {
        tracing::warn!(
            cell_id = id.get(),
            origin = PanicOrigin::Callback.as_str(),
            panic = %panic_message(payload.as_ref()),
            "observer panicked"
        );
    }
}
