//! # 运行时装配
//!
//! ## 角色定位（Why）
//! - 每个结算单元都需要同一组环境依赖：调度器与配置。`DeferredRuntime` 把二者打包，
//!   作为创建延迟值的唯一入口，避免任何全局状态；
//! - 运行时本身只是可廉价克隆的 `Arc` 集合，按值传递给各个生产者即可。
//!
//! ## 使用方式（How）
//! - 简单场景直接 [`DeferredRuntime::new`]；
//! - 需要校验配置或从 TOML 读取配置时使用 [`DeferredRuntime::builder`]，缺失调度器会在
//!   `build` 时以 [`DeferredError::Config`] 报告，而不是在首次结算时 panic。

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    cell::SettlementCell,
    chain::adopt_into,
    config::DeferredConfig,
    error::{DeferredError, PanicOrigin, Reason, panic_message},
    handle::{Deferred, Resolver, Thenable},
    scheduler::Scheduler,
};

/// 延迟值工厂，持有调度器与配置。
#[derive(Clone)]
pub struct DeferredRuntime {
    scheduler: Arc<dyn Scheduler>,
    config: Arc<DeferredConfig>,
}

impl DeferredRuntime {
    /// 使用默认配置构造运行时。
    pub fn new(scheduler: impl Scheduler) -> Self {
        Self::with_config(scheduler, DeferredConfig::default())
    }

    pub fn with_config(scheduler: impl Scheduler, config: DeferredConfig) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
            config: Arc::new(config),
        }
    }

    pub fn builder() -> DeferredRuntimeBuilder {
        DeferredRuntimeBuilder::default()
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &DeferredConfig {
        &self.config
    }

    pub(crate) fn cell<T, E>(&self) -> Arc<SettlementCell<T, E>>
    where
        T: Clone + Send + 'static,
        E: Reason,
    {
        Arc::new(SettlementCell::new(
            Arc::clone(&self.scheduler),
            Arc::clone(&self.config),
        ))
    }

    /// 创建一对共享同一结算单元的生产者与消费者句柄。
    pub fn deferred<T, E>(&self) -> (Resolver<T, E>, Deferred<T, E>)
    where
        T: Clone + Send + 'static,
        E: Reason,
    {
        let cell = self.cell();
        (Resolver::from_cell(Arc::clone(&cell)), Deferred::from_cell(cell))
    }

    /// 以执行器函数构造延迟值。
    ///
    /// # 契约说明（What）
    /// - `executor` 在本调用内同步执行一次，收到唯一的 [`Resolver`]；
    /// - 执行器可以立即结算，也可以把 `Resolver` 交给稍后完成的异步工作；
    /// - 执行器 panic 且尚未结算时，延迟值以 [`PanicOrigin::Producer`] 构造的原因拒绝；
    ///   已经结算则 panic 被记录后忽略，首次结算结果保持不变。
    /// - 关闭 `capture_panics` 后 panic 原样传播给调用方。
    pub fn new_deferred<T, E, F>(&self, executor: F) -> Deferred<T, E>
    where
        T: Clone + Send + 'static,
        E: Reason,
        F: FnOnce(Resolver<T, E>),
    {
        let (resolver, deferred) = self.deferred();
        run_producer(&self.config, resolver, executor);
        deferred
    }

    /// 已兑现的延迟值，订阅者仍在下一轮执行。
    pub fn resolved<T, E>(&self, value: T) -> Deferred<T, E>
    where
        T: Clone + Send + 'static,
        E: Reason,
    {
        let (resolver, deferred) = self.deferred();
        resolver.fulfill(value);
        deferred
    }

    /// 已拒绝的延迟值。
    pub fn rejected<T, E>(&self, reason: E) -> Deferred<T, E>
    where
        T: Clone + Send + 'static,
        E: Reason,
    {
        let (resolver, deferred) = self.deferred();
        resolver.reject(reason);
        deferred
    }

    /// 把任意 [`Thenable`] 转换为本运行时的延迟值，结果跟随其最终结算。
    pub fn adopt<T, E>(&self, thenable: impl Thenable<T, E>) -> Deferred<T, E>
    where
        T: Clone + Send + 'static,
        E: Reason,
    {
        self.adopt_boxed(Box::new(thenable))
    }

    pub(crate) fn adopt_boxed<T, E>(&self, thenable: Box<dyn Thenable<T, E>>) -> Deferred<T, E>
    where
        T: Clone + Send + 'static,
        E: Reason,
    {
        let cell = self.cell();
        adopt_into(&cell, thenable);
        Deferred::from_cell(cell)
    }
}

/// 同步执行生产者，并按配置处理其 panic。
pub(crate) fn run_producer<T, E, F>(
    config: &DeferredConfig,
    resolver: Resolver<T, E>,
    producer: F,
) where
    T: Clone + Send + 'static,
    E: Reason,
    F: FnOnce(Resolver<T, E>),
{
    if !config.capture_panics {
        producer(resolver);
        return;
    }
    let guard = resolver.clone();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || producer(resolver))) {
        let message = panic_message(payload.as_ref());
        tracing::warn!(
            cell_id = guard.id().get(),
            origin = PanicOrigin::Producer.as_str(),
            already_settled = guard.is_settled(),
            panic = %message,
            "producer panicked"
        );
        guard.reject(E::from_panic(PanicOrigin::Producer, &message));
    }
}

impl fmt::Debug for DeferredRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRuntime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// [`DeferredRuntime`] 的分步构造器。
#[derive(Default)]
pub struct DeferredRuntimeBuilder {
    scheduler: Option<Arc<dyn Scheduler>>,
    config: DeferredConfig,
}

impl DeferredRuntimeBuilder {
    pub fn scheduler(mut self, scheduler: impl Scheduler) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// 整体替换配置，之前对单项配置的修改会被覆盖。
    pub fn config(mut self, config: DeferredConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capture_panics(mut self, enabled: bool) -> Self {
        self.config.capture_panics = enabled;
        self
    }

    pub fn report_redundant_settlement(mut self, enabled: bool) -> Self {
        self.config.report_redundant_settlement = enabled;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    /// 校验并构造运行时；未提供调度器时返回 [`DeferredError::Config`]。
    pub fn build(self) -> Result<DeferredRuntime, DeferredError> {
        let scheduler = self.scheduler.ok_or_else(|| {
            DeferredError::config("a scheduler is required to build DeferredRuntime")
        })?;
        Ok(DeferredRuntime {
            scheduler,
            config: Arc::new(self.config),
        })
    }
}

impl fmt::Debug for DeferredRuntimeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRuntimeBuilder")
            .field("has_scheduler", &self.scheduler.is_some())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::DeferredRuntime;
    use crate::{DeferredError, ManualScheduler, PanicOrigin, Status};

    #[test]
    fn builder_requires_a_scheduler() {
        let err = DeferredRuntime::builder()
            .label("orphan")
            .build()
            .expect_err("缺少调度器必须构造失败");
        assert!(matches!(err, DeferredError::Config { .. }));
    }

    #[test]
    fn builder_applies_individual_settings() {
        let runtime = DeferredRuntime::builder()
            .scheduler(ManualScheduler::new())
            .capture_panics(false)
            .report_redundant_settlement(false)
            .label("render")
            .build()
            .expect("调度器已提供");
        assert!(!runtime.config().capture_panics);
        assert!(!runtime.config().report_redundant_settlement);
        assert_eq!(runtime.config().label.as_deref(), Some("render"));
    }

    #[test]
    fn executor_runs_synchronously_and_panics_become_rejections() {
        let runtime = DeferredRuntime::new(ManualScheduler::new());
        let mut ran = false;
        let ok = runtime.new_deferred::<i32, DeferredError, _>(|resolver| {
            ran = true;
            resolver.fulfill(1);
        });
        assert!(ran, "执行器应在构造期间同步运行");
        assert_eq!(ok.result(), Some(Ok(1)));

        let failed = runtime.new_deferred::<i32, DeferredError, _>(|_| panic!("boom"));
        assert_eq!(failed.status(), Status::Rejected);
        let reason = failed.result().and_then(Result::err).expect("应已拒绝");
        assert_eq!(reason.panic_origin(), Some(PanicOrigin::Producer));
    }

    #[test]
    fn panic_after_settlement_keeps_first_outcome() {
        let runtime = DeferredRuntime::new(ManualScheduler::new());
        let deferred = runtime.new_deferred::<&'static str, DeferredError, _>(|resolver| {
            resolver.fulfill("done");
            panic!("late failure");
        });
        assert_eq!(deferred.result(), Some(Ok("done")));
    }
}
