//! 运行时配置。
//!
//! ## 意图（Why）
//! - 延迟计算原语本身没有外部 I/O，但 panic 处理策略与重复结算的诊断输出需要按部署环境调整；
//! - 配置以 serde 结构体描述，既可由宿主代码直接构造，也可从 TOML 片段加载，
//!   与宿主侧其余配置文件共用一种格式。
//!
//! ## 契约（What）
//! - 所有字段均有默认值，空文档等价于 [`DeferredConfig::default`]；
//! - 未知字段视为错误，避免拼写错误被静默忽略。

use serde::{Deserialize, Serialize};

#[cfg(feature = "config-toml")]
use crate::error::DeferredError;

/// 由 [`DeferredRuntime`](crate::DeferredRuntime) 创建的全部结算单元共享的配置。
///
/// # 字段说明（What）
/// - `capture_panics`：回调、生产者函数与外部 `then` 中的 panic 是否转换为拒绝；
///   关闭后 panic 会在调度任务内部继续展开，由调度器自行处理；
/// - `report_redundant_settlement`：重复调用 `fulfill`/`reject` 时是否输出 `debug` 级诊断事件；
/// - `label`：附加到所有日志事件上的自由标签，便于区分多个运行时实例。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeferredConfig {
    pub capture_panics: bool,
    pub report_redundant_settlement: bool,
    pub label: Option<String>,
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            capture_panics: true,
            report_redundant_settlement: true,
            label: None,
        }
    }
}

impl DeferredConfig {
    /// 从 TOML 文本解析配置，解析失败映射为 [`DeferredError::Config`]。
    #[cfg(feature = "config-toml")]
    pub fn from_toml_str(source: &str) -> Result<Self, DeferredError> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_capture_panics(mut self, enabled: bool) -> Self {
        self.capture_panics = enabled;
        self
    }

    pub fn with_redundant_settlement_report(mut self, enabled: bool) -> Self {
        self.report_redundant_settlement = enabled;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// 日志字段使用的标签文本，未设置时为空串。
    pub(crate) fn label_str(&self) -> &str {
        self.label.as_deref().unwrap_or_default()
    }
}

#[cfg(all(test, feature = "config-toml"))]
mod tests {
    use super::DeferredConfig;
    use crate::error::DeferredError;

    #[test]
    fn empty_document_yields_defaults() {
        let config = DeferredConfig::from_toml_str("").expect("空文档应解析为默认配置");
        assert_eq!(config, DeferredConfig::default());
        assert!(config.capture_panics);
        assert!(config.report_redundant_settlement);
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config = DeferredConfig::from_toml_str(
            r#"
            capture_panics = false
            label = "render-queue"
            "#,
        )
        .expect("合法配置应解析成功");

        assert!(!config.capture_panics);
        assert!(config.report_redundant_settlement);
        assert_eq!(config.label.as_deref(), Some("render-queue"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = DeferredConfig::from_toml_str("capture_panic = true")
            .expect_err("拼写错误的字段必须报错");
        assert!(matches!(err, DeferredError::Config { .. }));
    }
}
