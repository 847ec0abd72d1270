use std::{collections::VecDeque, fmt, sync::Arc};

use parking_lot::Mutex;

use super::{Job, Scheduler};

/// `ManualScheduler` 是由调用方显式步进的 FIFO 调度器。
///
/// # 教案式说明
/// - **意图 (Why)**：测试与嵌入式事件循环需要精确控制“下一轮”何时到来，
///   以便断言某个回调在结算调用返回时尚未执行。
/// - **逻辑 (How)**：内部以 `parking_lot::Mutex<VecDeque<Job>>` 保存任务；`run_once` 先在锁内弹出队首，
///   释放锁后再执行任务，因此任务内部可以继续调度新任务而不会死锁。
/// - **契约 (What)**：克隆共享同一队列；`run_until_idle` 会执行运行过程中新加入的任务，直到队列为空。
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<VecDeque<Job>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 队列中尚未执行的任务数量。
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// 执行队首任务；队列为空时返回 `false`。
    pub fn run_once(&self) -> bool {
        let job = self.queue.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// 反复执行任务直到队列为空，返回本次执行的任务总数。
    pub fn run_until_idle(&self) -> usize {
        let mut executed = 0;
        while self.run_once() {
            executed += 1;
        }
        executed
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, job: Job) {
        self.queue.lock().push_back(job);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
