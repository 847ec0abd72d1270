//! # 异步桥接
//!
//! 把 [`Deferred`] 暴露为标准 [`Future`]，便于在 `async` 代码中 `.await` 其结果。
//! 结果仍然经由调度器交付：`Settled` 只是订阅者之一，不会绕过“回调永不同步执行”的约定。

use std::{
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::channel::oneshot;
use parking_lot::Mutex;

use crate::{error::Reason, handle::Deferred};

/// 等待延迟值结算的 Future，由 [`Deferred::settled`] 创建。
///
/// # 契约说明（What）
/// - 输出为 `Result<T, E>`，与 [`Deferred::result`] 的结算结果一致；
/// - 若调度器在交付前丢弃了任务，Future 退回读取单元中已保存的结果；
///   单元仍未结算时保持 `Pending`。
pub struct Settled<T, E> {
    receiver: oneshot::Receiver<Result<T, E>>,
    deferred: Deferred<T, E>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    /// 返回一个在本延迟值结算后完成的 Future。
    pub fn settled(&self) -> Settled<T, E> {
        let (sender, receiver) = oneshot::channel();
        let sender = Arc::new(Mutex::new(Some(sender)));
        let on_rejected_sender = Arc::clone(&sender);

        self.cell().subscribe(
            Box::new(move |value| deliver(&sender, Ok(value))),
            Box::new(move |reason| deliver(&on_rejected_sender, Err(reason))),
        );

        Settled {
            receiver,
            deferred: self.clone(),
        }
    }
}

fn deliver<T, E>(sender: &Mutex<Option<oneshot::Sender<Result<T, E>>>>, outcome: Result<T, E>) {
    if let Some(sender) = sender.lock().take() {
        // 接收端已被丢弃时无人等待，结果直接丢弃。
        let _ = sender.send(outcome);
    }
}

impl<T, E> Future for Settled<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => match self.deferred.result() {
                Some(outcome) => Poll::Ready(outcome),
                None => Poll::Pending,
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> IntoFuture for Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    type Output = Result<T, E>;
    type IntoFuture = Settled<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        self.settled()
    }
}

impl<T, E> fmt::Debug for Settled<T, E>
where
    T: Clone + Send + 'static,
    E: Reason,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled")
            .field("deferred", &self.deferred)
            .finish()
    }
}
