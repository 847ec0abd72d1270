//! # 聚合组合器（`batch`）
//!
//! ## 设计背景（Why）
//! - 渲染、批量加载等场景需要“等待一组彼此独立的操作全部完成”，并在任一操作失败时尽早放弃；
//! - 输入既可能是已有的延迟值，也可能是尚未启动、需要交给生产者能力去启动的操作，
//!   [`Operation`] 把这几种形态统一成同一个输入类型。
//!
//! ## 执行逻辑（How）
//! - 先把每个输入物化为本运行时的 [`Deferred`]；
//! - 再通过链式组合器的 `then` 订阅每个输入，不另建订阅路径；
//! - 兑现结果按输入下标写入槽位，计数归零时按输入顺序整体兑现；首个拒绝直接拒绝聚合结果。
//!
//! ## 契约（What）
//! - 结果顺序与输入顺序一致，与完成顺序无关；
//! - 聚合结果拒绝后，其余输入的后续结果被丢弃；
//! - 空输入以空 `Vec` 兑现，订阅者同样在下一轮执行。

use std::{fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::Reason,
    handle::{Deferred, Resolver, Step, Thenable},
    runtime::DeferredRuntime,
};

/// 生产者函数：收到一个新的 [`Resolver`]，负责最终结算它。
pub type Producer<T, E> = Box<dyn FnOnce(Resolver<T, E>) + Send + 'static>;

/// `batch` 的单个输入。
pub enum Operation<T, E> {
    /// 已存在的延迟值。
    Deferred(Deferred<T, E>),
    /// 其他实现提供的延迟值，结果经吸收后参与聚合。
    Thenable(Box<dyn Thenable<T, E>>),
    /// 尚未启动的操作，聚合时以新的生产者能力同步调用一次。
    Producer(Producer<T, E>),
}

impl<T, E> Operation<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    pub fn producer<F>(producer: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) + Send + 'static,
    {
        Operation::Producer(Box::new(producer))
    }

    pub fn thenable(thenable: impl Thenable<T, E>) -> Self {
        Operation::Thenable(Box::new(thenable))
    }

    fn materialize(self, runtime: &DeferredRuntime) -> Deferred<T, E> {
        match self {
            Operation::Deferred(deferred) => deferred,
            Operation::Thenable(thenable) => runtime.adopt_boxed(thenable),
            Operation::Producer(producer) => runtime.new_deferred(producer),
        }
    }
}

impl<T, E> From<Deferred<T, E>> for Operation<T, E> {
    fn from(deferred: Deferred<T, E>) -> Self {
        Operation::Deferred(deferred)
    }
}

impl<T, E> fmt::Debug for Operation<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Deferred(deferred) => f.debug_tuple("Deferred").field(deferred).finish(),
            Operation::Thenable(_) => f.write_str("Thenable(..)"),
            Operation::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

struct BatchState<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

impl<T> BatchState<T> {
    /// 写入一个槽位；全部到齐时取出按输入顺序排列的结果。
    fn fill(&mut self, index: usize, value: T) -> Option<Vec<T>> {
        let slot = self.slots.get_mut(index)?;
        if slot.replace(value).is_none() {
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return None;
        }
        self.slots.iter_mut().map(Option::take).collect()
    }
}

impl DeferredRuntime {
    /// 聚合一组操作：全部兑现时按输入顺序兑现，任一拒绝时以首个拒绝原因拒绝。
    ///
    /// # 契约说明（What）
    /// - `Operation::Producer` 在本调用内按输入顺序同步启动，panic 只拒绝其自身槽位，进而拒绝聚合结果；
    /// - 输入可来自任意迭代器，宏 [`batch!`](crate::batch!) 提供变参写法。
    pub fn batch<T, E, I>(&self, operations: I) -> Deferred<Vec<T>, E>
    where
        T: Clone + Send + 'static,
        E: Reason,
        I: IntoIterator<Item = Operation<T, E>>,
    {
        let inputs: Vec<Deferred<T, E>> = operations
            .into_iter()
            .map(|operation| operation.materialize(self))
            .collect();
        if inputs.is_empty() {
            return self.resolved(Vec::new());
        }

        let (resolver, aggregate) = self.deferred::<Vec<T>, E>();
        tracing::trace!(
            cell_id = aggregate.id().get(),
            inputs = inputs.len(),
            "batch started"
        );
        let state = Arc::new(Mutex::new(BatchState {
            slots: vec![None; inputs.len()],
            remaining: inputs.len(),
        }));

        for (index, input) in inputs.into_iter().enumerate() {
            let on_fulfilled_state = Arc::clone(&state);
            let on_fulfilled_resolver = resolver.clone();
            let on_rejected_resolver = resolver.clone();
            input.then::<(), _, _, _, _>(
                move |value: T| -> Step<(), E> {
                    let completed = on_fulfilled_state.lock().fill(index, value);
                    if let Some(values) = completed {
                        on_fulfilled_resolver.fulfill(values);
                    }
                    Step::Value(())
                },
                move |reason: E| -> Step<(), E> {
                    // 聚合结果已经结算时，后续拒绝属于预期内的丢弃，不触发重复结算诊断。
                    if !on_rejected_resolver.is_settled() {
                        on_rejected_resolver.reject(reason);
                    }
                    Step::Value(())
                },
            );
        }
        aggregate
    }
}

/// 以变参形式调用 [`DeferredRuntime::batch`]。
///
/// 每个实参需可转换为 [`Operation`]，例如 `Deferred` 句柄，或显式构造的
/// `Operation::producer(..)`、`Operation::thenable(..)`。
///
/// ```
/// use spark_deferred::{DeferredError, DeferredRuntime, ManualScheduler, batch};
///
/// let scheduler = ManualScheduler::new();
/// let runtime = DeferredRuntime::new(scheduler.clone());
/// let a = runtime.resolved::<u8, DeferredError>(1);
/// let b = runtime.resolved::<u8, DeferredError>(2);
///
/// let all = batch!(runtime; a, b);
/// scheduler.run_until_idle();
/// assert_eq!(all.result(), Some(Ok(vec![1, 2])));
/// ```
#[macro_export]
macro_rules! batch {
    ($runtime:expr; $($operation:expr),* $(,)?) => {
        $runtime.batch(::std::vec![$($crate::batch::Operation::from($operation)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::BatchState;

    #[test]
    fn fill_reports_completion_in_input_order() {
        let mut state = BatchState {
            slots: vec![None, None, None],
            remaining: 3,
        };
        assert_eq!(state.fill(2, "c"), None);
        assert_eq!(state.fill(0, "a"), None);
        assert_eq!(state.fill(1, "b"), Some(vec!["a", "b", "c"]));
    }
}
