pub mod recording;

#[cfg(target_os = "android")]
pub mod android;

pub use recording::RecordingBilling;

use crate::core::PlatformResult;

// ============================================================================
// Native Billing Abstraction
// ============================================================================

/// 原生计费层 - Google Play / Amazon 等
///
/// 所有调用都是发出即返回，结果稍后在原生线程上通过
/// [`ResultSink`](crate::relay::ResultSink) 送回。只在引擎线程上调用。
pub trait BillingProvider {
    /// 查询商品，`product_ids_json` 为商品编号的 JSON 数组
    fn list_items(&self, product_ids_json: &str) -> PlatformResult<()>;

    /// 发起购买
    fn buy(&self, product_id: &str) -> PlatformResult<()>;

    /// 恢复已购商品，结果以购买结果的形式送回
    fn restore(&self) -> PlatformResult<()>;

    /// 完成（消耗）交易
    fn finish_transaction(&self, receipt: &str) -> PlatformResult<()>;

    /// 请求补发监听器登记之前到达的购买结果
    fn process_pending_consumables(&self) -> PlatformResult<()>;

    /// 关闭计费连接
    fn stop(&self) -> PlatformResult<()> {
        Ok(())
    }
}

// ============================================================================
// Call Log
// ============================================================================

/// 发往原生层的调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingCall {
    ListItems { product_ids_json: String },
    Buy { product_id: String },
    Restore,
    FinishTransaction { receipt: String },
    ProcessPendingConsumables,
    Stop,
}

impl BillingCall {
    /// 对应的原生方法名
    pub fn method_name(&self) -> &'static str {
        match self {
            BillingCall::ListItems { .. } => "listItems",
            BillingCall::Buy { .. } => "buy",
            BillingCall::Restore => "restore",
            BillingCall::FinishTransaction { .. } => "finishTransaction",
            BillingCall::ProcessPendingConsumables => "processPendingConsumables",
            BillingCall::Stop => "stop",
        }
    }
}
