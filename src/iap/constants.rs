//! 计费常量
//!
//! 交易状态、计费服务编号、错误原因以及原生计费层的响应码。
//! 数值与脚本侧的 `iap.*` 常量一一对应，不可随意调整。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 交易状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum TransactionState {
    Purchasing = 0,
    Purchased = 1,
    Failed = 2,
    Restored = 3,
    Unverified = 4,
}

impl TransactionState {
    pub const ALL: [TransactionState; 5] = [
        TransactionState::Purchasing,
        TransactionState::Purchased,
        TransactionState::Failed,
        TransactionState::Restored,
        TransactionState::Unverified,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// 脚本侧常量名
    pub fn constant_name(self) -> &'static str {
        match self {
            TransactionState::Purchasing => "TRANS_STATE_PURCHASING",
            TransactionState::Purchased => "TRANS_STATE_PURCHASED",
            TransactionState::Failed => "TRANS_STATE_FAILED",
            TransactionState::Restored => "TRANS_STATE_RESTORED",
            TransactionState::Unverified => "TRANS_STATE_UNVERIFIED",
        }
    }
}

/// 计费服务编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ProviderId {
    Google = 0,
    Amazon = 1,
    Apple = 2,
    Facebook = 3,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Google,
        ProviderId::Amazon,
        ProviderId::Apple,
        ProviderId::Facebook,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// 脚本侧常量名
    pub fn constant_name(self) -> &'static str {
        match self {
            ProviderId::Google => "PROVIDER_ID_GOOGLE",
            ProviderId::Amazon => "PROVIDER_ID_AMAZON",
            ProviderId::Apple => "PROVIDER_ID_APPLE",
            ProviderId::Facebook => "PROVIDER_ID_FACEBOOK",
        }
    }

    /// 配置文件中的服务名称
    pub fn config_name(self) -> &'static str {
        match self {
            ProviderId::Google => "GooglePlay",
            ProviderId::Amazon => "Amazon",
            ProviderId::Apple => "AppStore",
            ProviderId::Facebook => "Facebook",
        }
    }

    /// Android 上只有 Google Play 和 Amazon 两种实现
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "GooglePlay" => Some(ProviderId::Google),
            "Amazon" => Some(ProviderId::Amazon),
            _ => None,
        }
    }

    /// Android 端对应的 Java 实现类
    pub fn java_class(self) -> &'static str {
        match self {
            ProviderId::Amazon => "com.defold.iap.IapAmazon",
            _ => "com.defold.iap.IapGooglePlay",
        }
    }
}

/// 错误原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorReason {
    Unspecified = 0,
    UserCanceled = 1,
}

impl ErrorReason {
    pub const ALL: [ErrorReason; 2] = [ErrorReason::Unspecified, ErrorReason::UserCanceled];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// 脚本侧常量名
    pub fn constant_name(self) -> &'static str {
        match self {
            ErrorReason::Unspecified => "REASON_UNSPECIFIED",
            ErrorReason::UserCanceled => "REASON_USER_CANCELED",
        }
    }
}

/// 原生计费层的响应码
///
/// 未列出的数值保留为 `Other`，按普通失败处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BillingResponse {
    Ok,
    UserCanceled,
    ServiceUnavailable,
    BillingUnavailable,
    ItemUnavailable,
    DeveloperError,
    Error,
    ItemAlreadyOwned,
    ItemNotOwned,
    Other(i32),
}

impl BillingResponse {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => BillingResponse::Ok,
            1 => BillingResponse::UserCanceled,
            2 => BillingResponse::ServiceUnavailable,
            3 => BillingResponse::BillingUnavailable,
            4 => BillingResponse::ItemUnavailable,
            5 => BillingResponse::DeveloperError,
            6 => BillingResponse::Error,
            7 => BillingResponse::ItemAlreadyOwned,
            8 => BillingResponse::ItemNotOwned,
            other => BillingResponse::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            BillingResponse::Ok => 0,
            BillingResponse::UserCanceled => 1,
            BillingResponse::ServiceUnavailable => 2,
            BillingResponse::BillingUnavailable => 3,
            BillingResponse::ItemUnavailable => 4,
            BillingResponse::DeveloperError => 5,
            BillingResponse::Error => 6,
            BillingResponse::ItemAlreadyOwned => 7,
            BillingResponse::ItemNotOwned => 8,
            BillingResponse::Other(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == BillingResponse::Ok
    }
}

impl fmt::Display for BillingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// 交给脚本回调的错误描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub message: String,
    pub reason: ErrorReason,
}

impl ErrorDescriptor {
    pub fn new(message: impl Into<String>, reason: ErrorReason) -> Self {
        Self {
            message: message.into(),
            reason,
        }
    }

    pub fn unspecified(message: impl Into<String>) -> Self {
        Self::new(message, ErrorReason::Unspecified)
    }
}

/// 所有暴露给脚本的常量 `(名称, 数值)`
pub fn script_constants() -> Vec<(&'static str, i32)> {
    let states = TransactionState::ALL
        .iter()
        .map(|s| (s.constant_name(), s.code()));
    let providers = ProviderId::ALL
        .iter()
        .map(|p| (p.constant_name(), p.code()));
    let reasons = ErrorReason::ALL
        .iter()
        .map(|r| (r.constant_name(), r.code()));
    states.chain(providers).chain(reasons).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_codes() {
        assert!(BillingResponse::from_code(0).is_ok());
        assert_eq!(BillingResponse::from_code(1), BillingResponse::UserCanceled);
        assert_eq!(BillingResponse::from_code(42), BillingResponse::Other(42));
        assert_eq!(BillingResponse::from_code(-3).code(), -3);
        assert_eq!(BillingResponse::ItemNotOwned.code(), 8);
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(ProviderId::from_config_name("Amazon"), Some(ProviderId::Amazon));
        assert_eq!(ProviderId::from_config_name("amazon"), None);
        assert_eq!(ProviderId::Amazon.java_class(), "com.defold.iap.IapAmazon");
        assert_eq!(ProviderId::Google.java_class(), "com.defold.iap.IapGooglePlay");
    }

    #[test]
    fn test_script_constants() {
        let constants = script_constants();
        assert_eq!(constants.len(), 11);
        assert!(constants.contains(&("TRANS_STATE_PURCHASED", 1)));
        assert!(constants.contains(&("PROVIDER_ID_AMAZON", 1)));
        assert!(constants.contains(&("REASON_USER_CANCELED", 1)));
    }
}
