//! 集成测试共享夹具：手动调度的运行时与线程安全的事件记录器。
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use spark_deferred::{DeferredConfig, DeferredRuntime, ManualScheduler};

/// 返回共享同一队列的运行时与调度器，测试通过 `run_until_idle` 推进“下一轮”。
pub fn manual_runtime() -> (DeferredRuntime, ManualScheduler) {
    manual_runtime_with(DeferredConfig::default())
}

pub fn manual_runtime_with(config: DeferredConfig) -> (DeferredRuntime, ManualScheduler) {
    let scheduler = ManualScheduler::new();
    let runtime = DeferredRuntime::with_config(scheduler.clone(), config);
    (runtime, scheduler)
}

/// 记录回调观测到的事件，断言时取快照。
#[derive(Clone)]
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, event: T) {
        self.events.lock().push(event);
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.events.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
