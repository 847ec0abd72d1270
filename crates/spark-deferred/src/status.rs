use core::fmt;

use serde::{Deserialize, Serialize};

/// `Status` 描述结算单元所处的生命周期阶段。
///
/// # 契约说明（What）
/// - 只允许 `Pending -> Fulfilled` 或 `Pending -> Rejected` 两条单向迁移；
/// - 终态之间不可互相跨越，也不会回到 `Pending`；
/// - 文本形式固定为 `pending` / `fulfilled` / `rejected`，用于日志字段与序列化。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

impl Status {
    /// 返回稳定的小写文本表示。
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Fulfilled => "fulfilled",
            Status::Rejected => "rejected",
        }
    }

    /// 是否已离开 `Pending`。
    pub const fn is_settled(self) -> bool {
        !matches!(self, Status::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
