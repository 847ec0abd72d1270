#![deny(unsafe_code)]
#![doc = "spark-deferred: 单次结算的延迟计算原语。"]
#![doc = ""]
#![doc = "== 组成 =="]
#![doc = "1. 结算单元：持有 Pending / Fulfilled / Rejected 三态与唯一结果，至多结算一次。"]
#![doc = "2. 句柄：`Resolver` 只负责结算，`Deferred` 只负责订阅与查询。"]
#![doc = "3. 链式组合器：`then` 及其变体，统一捕获回调失败并展开嵌套延迟值。"]
#![doc = "4. 聚合组合器：`batch` 与 `batch!`，全部兑现或首个拒绝。"]
#![doc = ""]
#![doc = "== 执行约定 =="]
#![doc = "所有订阅者都经由注入的 `Scheduler` 在稍后的轮次执行，无论登记发生在结算之前还是之后。"]
#![doc = ""]
#![doc = "```"]
#![doc = "use spark_deferred::{DeferredError, DeferredRuntime, ManualScheduler};"]
#![doc = ""]
#![doc = "let scheduler = ManualScheduler::new();"]
#![doc = "let runtime = DeferredRuntime::new(scheduler.clone());"]
#![doc = "let (resolver, deferred) = runtime.deferred::<u32, DeferredError>();"]
#![doc = ""]
#![doc = "let doubled = deferred.and_then(|value| Ok::<_, DeferredError>(value * 2));"]
#![doc = "resolver.fulfill(21);"]
#![doc = "assert!(doubled.result().is_none());"]
#![doc = ""]
#![doc = "scheduler.run_until_idle();"]
#![doc = "assert_eq!(doubled.result(), Some(Ok(42)));"]
#![doc = "```"]

pub mod batch;
pub mod bridge;
mod cell;
mod chain;
pub mod config;
pub mod error;
pub mod handle;
pub mod prelude;
pub mod runtime;
pub mod scheduler;
pub mod status;

pub use batch::{Operation, Producer};
pub use bridge::Settled;
pub use cell::{CellId, OnFulfilled, OnRejected};
pub use chain::Handler;
pub use config::DeferredConfig;
pub use error::{DeferredError, PanicOrigin, Reason, panic_message};
pub use handle::{Deferred, Resolver, Step, Thenable};
pub use runtime::{DeferredRuntime, DeferredRuntimeBuilder};
#[cfg(feature = "tokio")]
pub use scheduler::TokioScheduler;
pub use scheduler::{Job, ManualScheduler, Scheduler};
pub use status::Status;
