//! 请求网关
//!
//! 校验参数、按需登记回调，然后把请求转发给原生计费层并立即返回；
//! 结果稍后经命令队列在某一帧的分发中送达。

use super::constants::TransactionState;
use super::Iap;
use crate::core::{IapError, IapResult};
use crate::iap::constants::ProviderId;
use crate::platform::BillingProvider;
use crate::scripting::{HostListener, HostRequest, ScriptHost, ScriptRequest, ScriptValue};

impl<H: ScriptHost, B: BillingProvider> Iap<H, B> {
    fn ensure_running(&self) -> IapResult<()> {
        if self.running {
            Ok(())
        } else {
            Err(IapError::NotRunning)
        }
    }

    /// 查询商品信息，结果交给一次性回调 `listener`
    ///
    /// 尚未触发的旧回调会被替换并释放，它不会再被调用。
    pub fn list<S: AsRef<str>>(
        &mut self,
        product_ids: &[S],
        listener: HostListener<H>,
    ) -> IapResult<()> {
        if let Err(e) = self.validate_product_ids(product_ids) {
            self.host.release(listener);
            return Err(e);
        }

        let ids: Vec<&str> = product_ids.iter().map(AsRef::as_ref).collect();
        let product_ids_json = match serde_json::to_string(&ids) {
            Ok(json) => json,
            Err(e) => {
                self.host.release(listener);
                return Err(IapError::InvalidArgument(e.to_string()));
            }
        };

        if let Some(superseded) = self.listeners.set_one_shot(listener) {
            self.host.release(superseded);
        }

        tracing::debug!(target: "iap", "list {}", product_ids_json);
        if let Err(e) = self.billing.list_items(&product_ids_json) {
            // 请求没有发出，回调也不会再有结果
            if let Some(listener) = self.listeners.consume_one_shot() {
                self.host.release(listener);
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn validate_product_ids<S: AsRef<str>>(&self, product_ids: &[S]) -> IapResult<()> {
        self.ensure_running()?;
        if product_ids.is_empty() {
            return Err(IapError::InvalidArgument(
                "product id list must not be empty".to_string(),
            ));
        }
        if product_ids.iter().any(|id| id.as_ref().is_empty()) {
            return Err(IapError::InvalidArgument(
                "product ids must be non-empty strings".to_string(),
            ));
        }
        Ok(())
    }

    /// 购买商品，结果交给常驻监听器
    pub fn buy(&mut self, product_id: &str) -> IapResult<()> {
        self.ensure_running()?;
        if product_id.is_empty() {
            return Err(IapError::InvalidArgument(
                "product id must not be empty".to_string(),
            ));
        }

        tracing::debug!(target: "iap", "buy {}", product_id);
        self.billing.buy(product_id)?;
        Ok(())
    }

    /// 完成交易
    ///
    /// 开启自动完成交易时忽略并警告。`transaction` 为购买结果对象，
    /// 需要 `state == TRANS_STATE_PURCHASED`（若存在）以及字符串 `receipt`。
    pub fn finish(&mut self, transaction: &ScriptValue) -> IapResult<()> {
        self.ensure_running()?;
        if self.config.auto_finish_transactions {
            tracing::warn!(
                target: "iap",
                "Calling iap.finish when autofinish transactions is enabled. Ignored."
            );
            return Ok(());
        }

        if !transaction.is_object() {
            return Err(IapError::InvalidArgument(
                "transaction must be a table".to_string(),
            ));
        }

        if let Some(state) = transaction.get("state").and_then(ScriptValue::as_number) {
            if state != f64::from(TransactionState::Purchased.code()) {
                return Err(IapError::InvalidTransaction(
                    "Invalid transaction state (must be iap.TRANS_STATE_PURCHASED).".to_string(),
                ));
            }
        }

        let receipt = transaction
            .get("receipt")
            .and_then(ScriptValue::as_str)
            .ok_or_else(|| {
                IapError::InvalidTransaction(
                    "Invalid transaction data, does not contain 'receipt' key.".to_string(),
                )
            })?;

        self.billing.finish_transaction(receipt)?;
        Ok(())
    }

    /// 恢复已购商品
    ///
    /// 没有单独的完成回调：恢复的购买以 `TRANS_STATE_RESTORED` 状态送达常驻监听器。
    pub fn restore(&mut self) -> IapResult<bool> {
        self.ensure_running()?;
        self.billing.restore()?;
        Ok(true)
    }

    /// 设置常驻监听器，替换并释放旧的
    ///
    /// 首次设置时请求原生层补发之前到达、无人接收的购买结果。
    pub fn set_listener(&mut self, listener: HostListener<H>) -> IapResult<()> {
        if let Err(e) = self.ensure_running() {
            self.host.release(listener);
            return Err(e);
        }

        let had_previous = match self.listeners.set_durable(listener) {
            Some(previous) => {
                self.host.release(previous);
                true
            }
            None => false,
        };

        if !had_previous {
            self.billing.process_pending_consumables()?;
        }
        Ok(())
    }

    /// 当前计费服务
    pub fn provider_id(&self) -> ProviderId {
        self.config.provider
    }

    /// 执行脚本发起的请求
    pub fn apply_request(&mut self, request: HostRequest<H>) -> IapResult<()> {
        tracing::trace!(target: "iap.script", "apply {:?}", request);
        match request {
            ScriptRequest::List {
                product_ids,
                listener,
            } => self.list(product_ids.as_slice(), listener),
            ScriptRequest::Buy { product_id } => self.buy(&product_id),
            ScriptRequest::Finish { transaction } => self.finish(&transaction),
            ScriptRequest::Restore => self.restore().map(|_| ()),
            ScriptRequest::SetListener { listener } => self.set_listener(listener),
        }
    }

    /// 丢弃请求，释放其中的回调
    pub(crate) fn discard_request(&mut self, request: HostRequest<H>) {
        match request {
            ScriptRequest::List { listener, .. } | ScriptRequest::SetListener { listener } => {
                self.host.release(listener)
            }
            _ => {}
        }
    }
}
