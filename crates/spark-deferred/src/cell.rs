//! # 结算单元（Settlement Cell）
//!
//! ## 角色定位（Why）
//! - 结算单元持有 `Pending / Fulfilled / Rejected` 三态与唯一的结果值，是整个延迟计算原语的状态核心；
//! - 对外只通过 [`Resolver`](crate::Resolver)（生产者能力）与 [`Deferred`](crate::Deferred)
//!   （消费者能力）间接访问，单元本身从不暴露给调用方。
//!
//! ## 执行逻辑（How）
//! - 状态与两条订阅队列放在同一把 `parking_lot::Mutex` 下，结算时在锁内完成“记录结果 + 取出队列”，
//!   释放锁后再把每个订阅者包装成调度任务投递出去；
//! - 已结算后的订阅不再排队，直接投递到调度器，时序与结算前登记的订阅者一致。
//!
//! ## 契约（What）
//! - 至多结算一次；结算后的 `fulfill`/`reject` 为静默空操作，最早的结果永久保留；
//! - 每个订阅者至多被调用一次，同一路径上的订阅者按登记顺序投递；
//! - 锁内从不执行用户代码，订阅者总是在调度任务中运行，永不与触发它的调用处于同一调用栈；
//! - 本单元不会失败，也不处理 panic；回调异常的捕获属于链式组合器的职责。

use std::{
    fmt, mem,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{config::DeferredConfig, error::Reason, scheduler::Scheduler, status::Status};

/// 进程内唯一的结算单元编号，用作日志字段。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        CellId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// 兑现路径上的一次性订阅者。
pub type OnFulfilled<T> = Box<dyn FnOnce(T) + Send + 'static>;
/// 拒绝路径上的一次性订阅者。
pub type OnRejected<E> = Box<dyn FnOnce(E) + Send + 'static>;

struct CellInner<T, E> {
    outcome: Option<Result<T, E>>,
    on_fulfilled: Vec<OnFulfilled<T>>,
    on_rejected: Vec<OnRejected<E>>,
}

impl<T, E> CellInner<T, E> {
    fn status(&self) -> Status {
        match &self.outcome {
            None => Status::Pending,
            Some(Ok(_)) => Status::Fulfilled,
            Some(Err(_)) => Status::Rejected,
        }
    }
}

pub(crate) struct SettlementCell<T, E> {
    id: CellId,
    inner: Mutex<CellInner<T, E>>,
    scheduler: Arc<dyn Scheduler>,
    config: Arc<DeferredConfig>,
}

impl<T, E> SettlementCell<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>, config: Arc<DeferredConfig>) -> Self {
        Self {
            id: CellId::next(),
            inner: Mutex::new(CellInner {
                outcome: None,
                on_fulfilled: Vec::new(),
                on_rejected: Vec::new(),
            }),
            scheduler,
            config,
        }
    }

    pub(crate) fn id(&self) -> CellId {
        self.id
    }

    pub(crate) fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub(crate) fn config(&self) -> &Arc<DeferredConfig> {
        &self.config
    }

    pub(crate) fn status(&self) -> Status {
        self.inner.lock().status()
    }

    /// 结算前返回 `None`。
    pub(crate) fn result(&self) -> Option<Result<T, E>> {
        self.inner.lock().outcome.clone()
    }

    pub(crate) fn fulfill(&self, value: T) {
        let subscribers = {
            let mut inner = self.inner.lock();
            if inner.outcome.is_some() {
                let current = inner.status();
                drop(inner);
                self.report_redundant(Status::Fulfilled, current);
                return;
            }
            inner.outcome = Some(Ok(value.clone()));
            inner.on_rejected.clear();
            mem::take(&mut inner.on_fulfilled)
        };
        self.trace_settled(Status::Fulfilled, subscribers.len());
        self.dispatch(subscribers, value);
    }

    pub(crate) fn reject(&self, reason: E) {
        let subscribers = {
            let mut inner = self.inner.lock();
            if inner.outcome.is_some() {
                let current = inner.status();
                drop(inner);
                self.report_redundant(Status::Rejected, current);
                return;
            }
            inner.outcome = Some(Err(reason.clone()));
            inner.on_fulfilled.clear();
            mem::take(&mut inner.on_rejected)
        };
        self.trace_settled(Status::Rejected, subscribers.len());
        self.dispatch(subscribers, reason);
    }

    pub(crate) fn subscribe_fulfill(&self, on_fulfilled: OnFulfilled<T>) {
        self.register(Some(on_fulfilled), None);
    }

    pub(crate) fn subscribe_reject(&self, on_rejected: OnRejected<E>) {
        self.register(None, Some(on_rejected));
    }

    /// 在同一把锁下登记两条路径，结算无法插入两次登记之间。
    pub(crate) fn subscribe(&self, on_fulfilled: OnFulfilled<T>, on_rejected: OnRejected<E>) {
        self.register(Some(on_fulfilled), Some(on_rejected));
    }

    fn register(&self, on_fulfilled: Option<OnFulfilled<T>>, on_rejected: Option<OnRejected<E>>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &inner.outcome {
            None => {
                inner.on_fulfilled.extend(on_fulfilled);
                inner.on_rejected.extend(on_rejected);
            }
            Some(Ok(value)) => {
                let value = value.clone();
                drop(guard);
                if let Some(subscriber) = on_fulfilled {
                    self.dispatch(vec![subscriber], value);
                }
            }
            Some(Err(reason)) => {
                let reason = reason.clone();
                drop(guard);
                if let Some(subscriber) = on_rejected {
                    self.dispatch(vec![subscriber], reason);
                }
            }
        }
    }

    fn dispatch<A>(&self, subscribers: Vec<Box<dyn FnOnce(A) + Send + 'static>>, argument: A)
    where
        A: Clone + Send + 'static,
    {
        for subscriber in subscribers {
            let argument = argument.clone();
            self.scheduler.schedule(Box::new(move || subscriber(argument)));
        }
    }

    fn trace_settled(&self, status: Status, subscribers: usize) {
        tracing::trace!(
            cell_id = self.id.get(),
            status = status.as_str(),
            subscribers,
            label = self.config.label_str(),
            "deferred settled"
        );
    }

    fn report_redundant(&self, attempted: Status, current: Status) {
        if self.config.report_redundant_settlement {
            tracing::debug!(
                cell_id = self.id.get(),
                attempted = attempted.as_str(),
                current = current.as_str(),
                label = self.config.label_str(),
                "ignored settlement of an already settled deferred"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::SettlementCell;
    use crate::{
        config::DeferredConfig, error::DeferredError, scheduler::ManualScheduler, status::Status,
    };

    fn cell() -> (SettlementCell<i32, DeferredError>, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let cell = SettlementCell::new(
            Arc::new(scheduler.clone()),
            Arc::new(DeferredConfig::default()),
        );
        (cell, scheduler)
    }

    #[test]
    fn first_settlement_wins() {
        let (cell, _scheduler) = cell();
        assert_eq!(cell.status(), Status::Pending);
        assert!(cell.result().is_none());

        cell.fulfill(1);
        cell.fulfill(2);
        cell.reject(DeferredError::rejected("late"));

        assert_eq!(cell.status(), Status::Fulfilled);
        assert_eq!(cell.result(), Some(Ok(1)));
    }

    #[test]
    fn queued_subscribers_run_deferred_in_order() {
        let (cell, scheduler) = cell();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            cell.subscribe_fulfill(Box::new(move |value| seen.lock().push((tag, value))));
        }
        cell.fulfill(7);

        assert!(seen.lock().is_empty(), "结算调用返回前订阅者不得执行");
        assert_eq!(scheduler.run_until_idle(), 3);
        assert_eq!(*seen.lock(), vec![("a", 7), ("b", 7), ("c", 7)]);
    }

    #[test]
    fn mismatched_path_is_dropped_and_late_match_is_replayed() {
        let (cell, scheduler) = cell();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let on_fulfilled_hits = Arc::clone(&hits);
        cell.subscribe_fulfill(Box::new(move |_| on_fulfilled_hits.lock().push("fulfilled")));
        cell.reject(DeferredError::rejected("nope"));

        let late_hits = Arc::clone(&hits);
        cell.subscribe_reject(Box::new(move |_| late_hits.lock().push("late-reject")));
        let never_hits = Arc::clone(&hits);
        cell.subscribe_fulfill(Box::new(move |_| never_hits.lock().push("late-fulfill")));

        assert!(hits.lock().is_empty());
        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(*hits.lock(), vec!["late-reject"]);
    }
}
