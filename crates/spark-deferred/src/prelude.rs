//! 常用类型的一次性导入：`use spark_deferred::prelude::*;`

pub use crate::{
    Deferred, DeferredError, DeferredRuntime, ManualScheduler, Operation, Reason, Resolver,
    Scheduler, Status, Step, Thenable,
};
