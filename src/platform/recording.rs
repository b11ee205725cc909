//! 记录调用的计费层
//!
//! 桌面平台没有原生计费服务；这里记录所有调用，可选地立即模拟原生回调。
//! 测试通过克隆出来的句柄检查调用记录。

use super::{BillingCall, BillingProvider};
use crate::core::{PlatformError, PlatformResult};
use crate::relay::ResultSink;
use std::sync::{Arc, Mutex, PoisonError};

/// 模拟原生层：根据调用产生回调结果
pub type Responder = Box<dyn Fn(&BillingCall, &ResultSink) + Send + Sync>;

/// 记录调用的计费层
#[derive(Clone, Default)]
pub struct RecordingBilling {
    calls: Arc<Mutex<Vec<BillingCall>>>,
    responder: Option<Arc<(ResultSink, Responder)>>,
    fail_with: Option<Arc<String>>,
}

impl RecordingBilling {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用后通过 `sink` 模拟原生回调
    pub fn with_responder<F>(mut self, sink: ResultSink, responder: F) -> Self
    where
        F: Fn(&BillingCall, &ResultSink) + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new((sink, Box::new(responder))));
        self
    }

    /// 所有调用都返回平台错误（调用仍被记录）
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.fail_with = Some(Arc::new(reason.into()));
        self
    }

    /// 已记录调用的快照
    pub fn calls(&self) -> Vec<BillingCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 某类调用出现的次数
    pub fn count(&self, method: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.method_name() == method)
            .count()
    }

    fn record(&self, call: BillingCall) -> PlatformResult<()> {
        tracing::debug!(target: "iap", "billing call {}", call.method_name());
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());

        if let Some(reason) = &self.fail_with {
            return Err(PlatformError::Call {
                method: call.method_name(),
                reason: reason.to_string(),
            });
        }
        if let Some(responder) = &self.responder {
            let (sink, respond) = responder.as_ref();
            respond(&call, sink);
        }
        Ok(())
    }
}

impl BillingProvider for RecordingBilling {
    fn list_items(&self, product_ids_json: &str) -> PlatformResult<()> {
        self.record(BillingCall::ListItems {
            product_ids_json: product_ids_json.to_string(),
        })
    }

    fn buy(&self, product_id: &str) -> PlatformResult<()> {
        self.record(BillingCall::Buy {
            product_id: product_id.to_string(),
        })
    }

    fn restore(&self) -> PlatformResult<()> {
        self.record(BillingCall::Restore)
    }

    fn finish_transaction(&self, receipt: &str) -> PlatformResult<()> {
        self.record(BillingCall::FinishTransaction {
            receipt: receipt.to_string(),
        })
    }

    fn process_pending_consumables(&self) -> PlatformResult<()> {
        self.record(BillingCall::ProcessPendingConsumables)
    }

    fn stop(&self) -> PlatformResult<()> {
        self.record(BillingCall::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::CommandQueue;

    #[test]
    fn test_calls_are_shared_between_clones() {
        let billing = RecordingBilling::new();
        let handle = billing.clone();
        billing.buy("coins_100").unwrap();
        billing.restore().unwrap();

        assert_eq!(
            handle.calls(),
            vec![
                BillingCall::Buy {
                    product_id: "coins_100".to_string()
                },
                BillingCall::Restore,
            ]
        );
        assert_eq!(handle.count("buy"), 1);
    }

    #[test]
    fn test_responder_feeds_queue() {
        let queue = Arc::new(CommandQueue::new());
        let billing = RecordingBilling::new().with_responder(
            ResultSink::new(Arc::clone(&queue)),
            |call, sink| {
                if let BillingCall::Buy { product_id } = call {
                    sink.purchase_completed(0, Some(format!(r#"{{"ident":"{}"}}"#, product_id)));
                }
            },
        );

        billing.buy("gems").unwrap();
        let drained = queue.drain_all();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].payload.as_deref(), Some(r#"{"ident":"gems"}"#));
    }

    #[test]
    fn test_failing_provider_still_records() {
        let billing = RecordingBilling::new().failing("service disconnected");
        assert!(matches!(
            billing.restore(),
            Err(PlatformError::Call { method: "restore", .. })
        ));
        assert_eq!(billing.count("restore"), 1);
    }
}
