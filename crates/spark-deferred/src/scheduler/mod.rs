//! # 调度钩子
//!
//! ## 契约声明
//! * **唯一外部依赖：** 结算单元只依赖一个能力，即“把一段工作推迟到稍后的轮次执行”。本模块以
//!   [`Scheduler`] Trait 表达该能力，事件循环、微任务队列或异步运行时均由宿主提供。
//! * **显式注入：** 调度器通过 [`DeferredRuntime`](crate::DeferredRuntime) 注入到每个结算单元，
//!   不读取任何全局状态，因此测试可以使用手动步进的 [`ManualScheduler`] 获得确定性的执行顺序。
//!
//! ## 并发与顺序语义
//! * `schedule` 必须立即返回，不得在调用栈内同步执行任务；这是“回调永不重入”的基础。
//! * 同一调度器上的任务应按提交顺序执行；结算单元只在此前提下保证同一单元内订阅者的先后次序。

mod manual;
#[cfg(feature = "tokio")]
mod tokio_handle;

pub use manual::ManualScheduler;
#[cfg(feature = "tokio")]
pub use tokio_handle::TokioScheduler;

use std::sync::Arc;

/// 被推迟执行的一次性任务。
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// `Scheduler` 描述宿主提供的延迟执行原语。
///
/// # 设计背景（Why）
/// - 若订阅者有时同步执行、有时异步执行，调用方就能观测到重入差异，这是手写 Promise 最常见的缺陷；
///   将所有回调统一投递到调度器，使同步生产者与异步生产者的回调时序不可区分。
///
/// # 契约说明（What）
/// - **前置条件**：实现需线程安全（`Send + Sync + 'static`），结算单元可能在任意线程上调用 `schedule`；
/// - **后置条件**：`job` 恰好执行一次，且不早于 `schedule` 返回；
/// - 调度器丢弃尚未执行的任务时，对应订阅者永远不会被调用，这不视为错误。
pub trait Scheduler: Send + Sync + 'static {
    /// 将任务推迟到稍后的轮次执行。
    fn schedule(&self, job: Job);
}

impl<S> Scheduler for Arc<S>
where
    S: Scheduler + ?Sized,
{
    fn schedule(&self, job: Job) {
        (**self).schedule(job);
    }
}
