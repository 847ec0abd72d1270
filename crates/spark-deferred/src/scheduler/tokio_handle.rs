//! Tokio 运行时适配。
//!
//! # 教案式说明
//! - **定位 (Why)**：核心 crate 不绑定任何异步运行时；启用 `tokio` Feature 后，
//!   宿主可以把每个结算回调作为独立任务投递到 Tokio 执行器上。
//! - **方法 (How)**：持有 [`Handle`]，`schedule` 通过 `Handle::spawn` 提交任务并立即分离 `JoinHandle`。
//! - **注意 (Trade-offs)**：多线程运行时下不同结算单元的回调可能并行执行，
//!   同一单元内订阅者的先后次序只在 `current_thread` 运行时下得到保证。

use tokio::runtime::Handle;

use super::{Job, Scheduler};
use crate::error::DeferredError;

#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// 绑定当前所处的 Tokio 运行时；不在运行时上下文中时返回配置错误。
    pub fn try_current() -> Result<Self, DeferredError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|err| DeferredError::config(err.to_string()))
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, job: Job) {
        drop(self.handle.spawn(async move { job() }));
    }
}
