//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 延迟计算的全部失败都沿拒绝通道传播，因此拒绝原因的类型就是本 crate 的错误模型；
//! - [`Reason`] 约束拒绝原因必须能够从 panic 中构造，使回调中的同步 panic 与显式 `Err`
//!   返回走同一条拒绝路径；
//! - [`DeferredError`] 提供开箱即用的拒绝原因，调用方也可以为自有错误类型实现 [`Reason`]。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error`，兼容 `std::error::Error` 生态；
//! - 错误值需满足 `Clone + Send + 'static`：同一拒绝原因会被分发给多个订阅者，并可能跨线程传递。

use std::{any::Any, borrow::Cow, fmt, sync::Arc};

use thiserror::Error;

/// panic 的发生位置，用于构造可读的拒绝原因。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PanicOrigin {
    /// `then` / `catch` 等链式回调内部。
    Callback,
    /// `new_deferred` 或 `batch` 中的生产者函数内部。
    Producer,
    /// 外部 [`Thenable`](crate::Thenable) 在登记续体时。
    Thenable,
}

impl PanicOrigin {
    /// 稳定的文本标签。
    pub const fn as_str(self) -> &'static str {
        match self {
            PanicOrigin::Callback => "callback",
            PanicOrigin::Producer => "producer",
            PanicOrigin::Thenable => "thenable",
        }
    }
}

impl fmt::Display for PanicOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `DeferredError` 是 crate 自带的拒绝原因类型。
///
/// # 教案式说明
/// - **意图 (Why)**：多数调用方并不需要自定义错误体系，提供一个覆盖常见失败来源的枚举，
///   既能直接作为 `Deferred<T, DeferredError>` 的拒绝类型，也方便日志与断言。
/// - **契约 (What)**：
///   - `Rejected` 表示生产者或回调主动给出的业务拒绝；
///   - `*Panicked` 三个变体对应 [`PanicOrigin`] 的三个来源，携带 panic 文本；
///   - `Config` 表示运行时配置非法，例如构造器缺少调度器或 TOML 解析失败。
/// - **设计权衡 (Trade-offs)**：使用 `Cow<'static, str>` 保存业务原因，静态字符串零分配；
///   panic 文本来自运行期，只能使用 `String`。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DeferredError {
    #[error("deferred rejected: {reason}")]
    Rejected { reason: Cow<'static, str> },

    #[error("callback panicked: {message}")]
    CallbackPanicked { message: String },

    #[error("producer panicked: {message}")]
    ProducerPanicked { message: String },

    #[error("thenable panicked while subscribing: {message}")]
    ThenablePanicked { message: String },

    #[error("invalid deferred configuration: {detail}")]
    Config { detail: String },
}

impl DeferredError {
    /// 构造业务拒绝原因。
    pub fn rejected(reason: impl Into<Cow<'static, str>>) -> Self {
        DeferredError::Rejected {
            reason: reason.into(),
        }
    }

    /// 构造配置错误。
    pub fn config(detail: impl Into<String>) -> Self {
        DeferredError::Config {
            detail: detail.into(),
        }
    }

    /// 若为 panic 转换而来的错误，返回其来源。
    pub fn panic_origin(&self) -> Option<PanicOrigin> {
        match self {
            DeferredError::CallbackPanicked { .. } => Some(PanicOrigin::Callback),
            DeferredError::ProducerPanicked { .. } => Some(PanicOrigin::Producer),
            DeferredError::ThenablePanicked { .. } => Some(PanicOrigin::Thenable),
            _ => None,
        }
    }
}

#[cfg(feature = "config-toml")]
impl From<toml::de::Error> for DeferredError {
    fn from(err: toml::de::Error) -> Self {
        DeferredError::config(err.to_string())
    }
}

/// `Reason` 约束可以作为拒绝原因的类型。
///
/// # 设计背景（Why）
/// - 回调 panic 时没有调用方提供的拒绝值，需要由拒绝类型自身给出“从 panic 构造”的方式，
///   否则 panic 只能穿透调度器，破坏“所有失败都走拒绝通道”的约定。
///
/// # 契约说明（What）
/// - `Clone`：同一拒绝原因会分发给多个订阅者；
/// - `Send + 'static`：拒绝原因随调度任务在线程之间移动；
/// - `from_panic` 不得 panic。
pub trait Reason: Clone + Send + 'static {
    /// 根据 panic 来源与文本构造拒绝原因。
    fn from_panic(origin: PanicOrigin, message: &str) -> Self;
}

impl Reason for DeferredError {
    fn from_panic(origin: PanicOrigin, message: &str) -> Self {
        let message = message.to_owned();
        match origin {
            PanicOrigin::Callback => DeferredError::CallbackPanicked { message },
            PanicOrigin::Producer => DeferredError::ProducerPanicked { message },
            PanicOrigin::Thenable => DeferredError::ThenablePanicked { message },
        }
    }
}

impl Reason for String {
    fn from_panic(origin: PanicOrigin, message: &str) -> Self {
        format!("{origin} panicked: {message}")
    }
}

impl Reason for Cow<'static, str> {
    fn from_panic(origin: PanicOrigin, message: &str) -> Self {
        Cow::Owned(String::from_panic(origin, message))
    }
}

impl Reason for Arc<str> {
    fn from_panic(origin: PanicOrigin, message: &str) -> Self {
        Arc::from(String::from_panic(origin, message))
    }
}

/// 静态字符串无法携带运行期 panic 文本，只保留来源。
impl Reason for &'static str {
    fn from_panic(origin: PanicOrigin, _message: &str) -> Self {
        match origin {
            PanicOrigin::Callback => "callback panicked",
            PanicOrigin::Producer => "producer panicked",
            PanicOrigin::Thenable => "thenable panicked",
        }
    }
}

/// 从 panic 载荷中提取可读文本。
///
/// - `&'static str` 与 `String` 载荷原样返回；
/// - 其他类型返回占位文本，不尝试格式化未知载荷。
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        String::from("<non-string panic payload>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let borrowed: Box<dyn Any + Send> = Box::new("static boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        let opaque: Box<dyn Any + Send> = Box::new(7_u32);

        assert_eq!(panic_message(borrowed.as_ref()), "static boom");
        assert_eq!(panic_message(owned.as_ref()), "owned boom");
        assert_eq!(panic_message(opaque.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn reasons_built_from_panic_keep_their_origin() {
        let err = DeferredError::from_panic(PanicOrigin::Thenable, "bad then");
        assert_eq!(err.panic_origin(), Some(PanicOrigin::Thenable));
        assert_eq!(err.to_string(), "thenable panicked while subscribing: bad then");

        assert_eq!(
            String::from_panic(PanicOrigin::Callback, "oops"),
            "callback panicked: oops"
        );
        assert_eq!(
            <&'static str>::from_panic(PanicOrigin::Producer, "ignored"),
            "producer panicked"
        );
        assert_eq!(DeferredError::rejected("boom").panic_origin(), None);
    }
}
