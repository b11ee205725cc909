//! 每帧分发
//!
//! 取走队列中的全部命令，按到达顺序解码并调用对应的脚本回调。
//! 单条命令的任何失败只记录日志，不影响同批次后续命令。

use super::constants::{BillingResponse, ErrorDescriptor, ErrorReason};
use super::listener::ListenerRegistry;
use crate::relay::{Command, CommandKind};
use crate::scripting::{CallbackArgs, HostListener, ScriptHost, ScriptValue};

/// 一帧分发的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// 取出的命令数
    pub drained: usize,
    /// 成功调用的回调数
    pub invoked: usize,
    /// 没有监听器或实例已销毁而跳过的命令数
    pub skipped: usize,
    /// 回调执行出错的命令数
    pub failed: usize,
}

impl DispatchStats {
    pub fn merge(&mut self, other: DispatchStats) {
        self.drained += other.drained;
        self.invoked += other.invoked;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

fn parse_payload(payload: &str) -> Result<ScriptValue, serde_json::Error> {
    serde_json::from_str::<serde_json::Value>(payload).map(ScriptValue::from)
}

/// 解码商品列表结果
pub fn decode_product_result(command: &Command) -> CallbackArgs {
    let response = command.response();
    if !response.is_ok() {
        tracing::error!(target: "iap.dispatch", "IAP error {}", response);
        return CallbackArgs::failure(ErrorDescriptor::unspecified("failed to fetch product"));
    }

    let parsed = match command.payload.as_deref() {
        Some(payload) => match parse_payload(payload) {
            Ok(ScriptValue::Null) => Err("product response was null".to_string()),
            Ok(products) => Ok(products),
            Err(e) => Err(e.to_string()),
        },
        None => Err("product response was null".to_string()),
    };

    match parsed {
        Ok(products) => CallbackArgs::success(products),
        Err(reason) => {
            tracing::error!(target: "iap.dispatch", "Failed to parse product response ({})", reason);
            CallbackArgs::failure(ErrorDescriptor::unspecified(
                "failed to parse product response",
            ))
        }
    }
}

/// 解码购买结果
///
/// 成功响应码但载荷为空（或 JSON `null`）按失败处理。
pub fn decode_purchase_result(command: &Command) -> CallbackArgs {
    match command.response() {
        BillingResponse::Ok => match command.payload.as_deref() {
            None => {
                tracing::error!(target: "iap.dispatch", "IAP error, purchase response was null");
                CallbackArgs::failure(ErrorDescriptor::unspecified("purchase response was null"))
            }
            Some(payload) => match parse_payload(payload) {
                Ok(ScriptValue::Null) => {
                    tracing::error!(target: "iap.dispatch", "IAP error, purchase response was null");
                    CallbackArgs::failure(ErrorDescriptor::unspecified(
                        "purchase response was null",
                    ))
                }
                Ok(purchase) => CallbackArgs::success(purchase),
                Err(e) => {
                    tracing::error!(target: "iap.dispatch", "Failed to parse purchase response ({})", e);
                    CallbackArgs::failure(ErrorDescriptor::unspecified(
                        "failed to parse purchase response",
                    ))
                }
            },
        },
        BillingResponse::UserCanceled => CallbackArgs::failure(ErrorDescriptor::new(
            "user canceled purchase",
            ErrorReason::UserCanceled,
        )),
        other => {
            tracing::error!(target: "iap.dispatch", "IAP error {}", other);
            CallbackArgs::failure(ErrorDescriptor::unspecified("failed to buy product"))
        }
    }
}

/// 分发器
///
/// 只在引擎线程上使用，不可重入。
pub struct Dispatcher<'a, H: ScriptHost> {
    registry: &'a mut ListenerRegistry<H::Callback, H::Instance>,
    host: &'a mut H,
}

impl<'a, H: ScriptHost> Dispatcher<'a, H> {
    pub fn new(
        registry: &'a mut ListenerRegistry<H::Callback, H::Instance>,
        host: &'a mut H,
    ) -> Self {
        Self { registry, host }
    }

    /// 依次分发一批命令
    pub fn dispatch_all<I>(&mut self, commands: I) -> DispatchStats
    where
        I: IntoIterator<Item = Command>,
    {
        let mut stats = DispatchStats::default();
        for command in commands {
            stats.drained += 1;
            self.dispatch(command, &mut stats);
        }
        stats
    }

    /// 分发单条命令，命令（及其载荷）在此被消费
    pub fn dispatch(&mut self, command: Command, stats: &mut DispatchStats) {
        match command.kind {
            CommandKind::ProductListResult => self.handle_product_result(&command, stats),
            CommandKind::PurchaseResult => self.handle_purchase_result(&command, stats),
        }
    }

    fn handle_product_result(&mut self, command: &Command, stats: &mut DispatchStats) {
        let Some(listener) = self.registry.consume_one_shot() else {
            tracing::error!(target: "iap.dispatch", "No callback set for product list result");
            stats.skipped += 1;
            return;
        };

        if self.host.is_instance_valid(&listener.instance) {
            let args = decode_product_result(command);
            invoke_listener(self.host, &listener, args, stats);
        } else {
            tracing::error!(
                target: "iap.dispatch",
                "Could not run IAP callback because the instance has been deleted."
            );
            stats.skipped += 1;
        }

        self.host.release(listener);
    }

    fn handle_purchase_result(&mut self, command: &Command, stats: &mut DispatchStats) {
        let Some(listener) = self.registry.durable() else {
            tracing::error!(target: "iap.dispatch", "No callback set for purchase result");
            stats.skipped += 1;
            return;
        };

        if !self.host.is_instance_valid(&listener.instance) {
            tracing::error!(
                target: "iap.dispatch",
                "Could not run IAP callback because the instance has been deleted."
            );
            stats.skipped += 1;
            return;
        }

        let args = decode_purchase_result(command);
        invoke_listener(self.host, listener, args, stats);
    }
}

fn invoke_listener<H: ScriptHost>(
    host: &mut H,
    listener: &HostListener<H>,
    args: CallbackArgs,
    stats: &mut DispatchStats,
) {
    match host.invoke(listener, args) {
        Ok(()) => stats.invoked += 1,
        Err(e) => {
            tracing::error!(target: "iap.dispatch", "Error running iap callback: {}", e);
            stats.failed += 1;
        }
    }
}
