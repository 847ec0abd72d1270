//! # 句柄层：生产者能力与消费者能力的拆分
//!
//! ## 设计背景（Why）
//! - 只有构造延迟值的一方可以结算，任何一方都可以订阅；若同一引用同时暴露两组能力，
//!   任何拿到句柄的消费者都能篡改结果。
//! - 因此同一个结算单元被包装成两种所有权不同的视图：[`Resolver`] 只负责结算，
//!   [`Deferred`] 只负责订阅与查询。
//!
//! ## 结构互通（How）
//! - [`Thenable`] 是“可被吸收的延迟值”的显式能力接口：凡是能够接受一对兑现/拒绝续体的类型，
//!   都可以被链式组合器吸收，与其由哪个库实现无关；
//! - [`Step`] 是链式回调的返回值：直接给出值、给出拒绝原因，或者交出另一个 [`Thenable`] 让子节点跟随。

use std::{fmt, sync::Arc};

use crate::{
    cell::{CellId, OnFulfilled, OnRejected, SettlementCell},
    error::Reason,
    status::Status,
};

/// `Deferred` 是延迟值的消费者句柄。
///
/// # 契约说明（What）
/// - 克隆共享同一结算单元，[`Deferred::ptr_eq`] 可判断身份；
/// - 不提供任何结算入口，结果只能由对应的 [`Resolver`] 或内部吸收逻辑写入；
/// - 链式组合方法（`then`、`and_then`、`catch`、`then_opt`）定义在 `chain` 模块。
pub struct Deferred<T, E> {
    cell: Arc<SettlementCell<T, E>>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    pub(crate) fn from_cell(cell: Arc<SettlementCell<T, E>>) -> Self {
        Self { cell }
    }

    pub(crate) fn cell(&self) -> &Arc<SettlementCell<T, E>> {
        &self.cell
    }

    pub fn id(&self) -> CellId {
        self.cell.id()
    }

    pub fn status(&self) -> Status {
        self.cell.status()
    }

    /// 读取已保存的结果。
    ///
    /// 结算前返回 `None`；结算后每次调用都返回同一结果的克隆。
    pub fn result(&self) -> Option<Result<T, E>> {
        self.cell.result()
    }

    pub fn is_settled(&self) -> bool {
        self.status().is_settled()
    }

    /// 两个句柄是否指向同一结算单元。
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

/// `Resolver` 是延迟值的生产者能力。
///
/// # 教案式说明
/// - **意图 (Why)**：把 `fulfill`/`reject` 收拢到只交给生产者的独立类型上，消费者拿不到写入入口。
/// - **契约 (What)**：
///   - 第一次 `fulfill` 或 `reject` 生效，之后的任何结算调用都是静默空操作，不返回错误；
///   - 调用本身不会执行任何订阅者，订阅者总是经由调度器在稍后的轮次执行；
///   - 可克隆，便于把兑现与拒绝分别交给不同的代码路径。
/// - **风险 (Trade-offs)**：丢弃所有 `Resolver` 而未结算时，对应的 [`Deferred`] 永远停留在 `Pending`；
///   本原语不提供取消或超时。
pub struct Resolver<T, E> {
    cell: Arc<SettlementCell<T, E>>,
}

impl<T, E> Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    pub(crate) fn from_cell(cell: Arc<SettlementCell<T, E>>) -> Self {
        Self { cell }
    }

    pub fn fulfill(&self, value: T) {
        self.cell.fulfill(value);
    }

    pub fn reject(&self, reason: E) {
        self.cell.reject(reason);
    }

    /// 依据 `Result` 选择兑现或拒绝。
    pub fn settle(&self, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => self.fulfill(value),
            Err(reason) => self.reject(reason),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.cell.status().is_settled()
    }

    pub fn id(&self) -> CellId {
        self.cell.id()
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("id", &self.id())
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// `Thenable` 是可被链式组合器吸收的延迟值能力接口。
///
/// # 设计背景（Why）
/// - 链式回调返回另一个延迟值时，子节点应跟随其最终结果，而不是以延迟值对象本身兑现；
/// - 不同库实现的延迟值需要互通，因此“是否为延迟值”由是否实现本 Trait 决定，
///   编译期即可完成一致性检查，不依赖运行时反射。
///
/// # 契约说明（What）
/// - `subscribe` 接收兑现与拒绝两个一次性续体，实现方最终至多调用其中一个；
/// - 实现方多次或交叉调用续体不会破坏接收方：接收方的结算单元保证首次结算生效；
/// - 实现方在 `subscribe` 中 panic 时，吸收方会以 [`PanicOrigin::Thenable`](crate::PanicOrigin::Thenable)
///   构造的原因拒绝（需开启 `capture_panics`）。
pub trait Thenable<T, E>: Send + 'static {
    /// 登记兑现与拒绝续体。
    fn subscribe(self: Box<Self>, on_fulfilled: OnFulfilled<T>, on_rejected: OnRejected<E>);
}

impl<T, E> Thenable<T, E> for Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    fn subscribe(self: Box<Self>, on_fulfilled: OnFulfilled<T>, on_rejected: OnRejected<E>) {
        self.cell.subscribe(on_fulfilled, on_rejected);
    }
}

/// 链式回调的返回值。
///
/// - `Value`：以该值兑现子节点，拒绝处理器返回 `Value` 即视为“已恢复”；
/// - `Fail`：以该原因拒绝子节点，等价于回调抛出异常；
/// - `Adopt`：子节点跟随给定延迟值的最终结果。
///
/// 回调可以直接返回 `Result<U, E>` 或 `Deferred<U, E>`，二者都会经由 `From` 转换为 `Step`。
pub enum Step<T, E> {
    Value(T),
    Fail(E),
    Adopt(Box<dyn Thenable<T, E>>),
}

impl<T, E> Step<T, E> {
    pub fn value(value: T) -> Self {
        Step::Value(value)
    }

    pub fn fail(reason: E) -> Self {
        Step::Fail(reason)
    }

    /// 跟随任意 [`Thenable`] 的最终结果。
    pub fn adopt(thenable: impl Thenable<T, E>) -> Self {
        Step::Adopt(Box::new(thenable))
    }
}

impl<T, E> From<Result<T, E>> for Step<T, E> {
    fn from(outcome: Result<T, E>) -> Self {
        match outcome {
            Ok(value) => Step::Value(value),
            Err(reason) => Step::Fail(reason),
        }
    }
}

impl<T, E> From<Deferred<T, E>> for Step<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    fn from(deferred: Deferred<T, E>) -> Self {
        Step::Adopt(Box::new(deferred))
    }
}

impl<T, E> fmt::Debug for Step<T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Step::Fail(reason) => f.debug_tuple("Fail").field(reason).finish(),
            Step::Adopt(_) => f.write_str("Adopt(..)"),
        }
    }
}
