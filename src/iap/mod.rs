//! 应用内购买扩展
//!
//! [`Iap`] 是显式构造的扩展上下文：持有命令队列、监听器登记表、
//! 脚本宿主和原生计费层。生命周期对应引擎扩展的三个阶段：
//!
//! - `Iap::new` - 初始化，创建队列
//! - `Iap::update` - 每帧调用，执行脚本请求并分发原生结果
//! - `Iap::shutdown` - 释放回调，关闭队列，停止计费连接
//!
//! 同一进程里可以存在多个实例，彼此不共享状态。

pub mod constants;
pub mod dispatcher;
pub mod gateway;
pub mod listener;

pub use constants::{BillingResponse, ErrorDescriptor, ErrorReason, ProviderId, TransactionState};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use listener::{ListenerRegistration, ListenerRegistry};

use crate::config::ProviderConfig;
use crate::platform::BillingProvider;
use crate::plugins::EnginePlugin;
use crate::relay::{Command, CommandQueue, ResultSink};
use crate::scripting::ScriptHost;
use std::sync::Arc;

/// 应用内购买扩展上下文
pub struct Iap<H: ScriptHost, B: BillingProvider> {
    // 回调句柄必须先于宿主释放
    listeners: ListenerRegistry<H::Callback, H::Instance>,
    host: H,
    billing: B,
    config: ProviderConfig,
    queue: Arc<CommandQueue>,
    /// 每帧复用的命令缓冲
    batch: Vec<Command>,
    running: bool,
}

impl<H: ScriptHost, B: BillingProvider> Iap<H, B> {
    /// 初始化扩展
    pub fn new(config: ProviderConfig, host: H, billing: B) -> Self {
        Self::with_queue(config, host, billing, Arc::new(CommandQueue::new()))
    }

    /// 使用预先创建的队列初始化
    ///
    /// 原生层需要在扩展之前拿到结果入口时使用。
    pub fn with_queue(config: ProviderConfig, host: H, billing: B, queue: Arc<CommandQueue>) -> Self {
        tracing::info!(
            target: "iap",
            "IAP extension initialized (provider: {:?}, auto finish: {})",
            config.provider,
            config.auto_finish_transactions
        );

        Self {
            listeners: ListenerRegistry::new(),
            host,
            billing,
            config,
            queue,
            batch: Vec::new(),
            running: true,
        }
    }

    /// 交给原生层的回调入口
    pub fn result_sink(&self) -> ResultSink {
        ResultSink::new(Arc::clone(&self.queue))
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn billing(&self) -> &B {
        &self.billing
    }

    pub fn listeners(&self) -> &ListenerRegistry<H::Callback, H::Instance> {
        &self.listeners
    }

    /// 队列中等待分发的命令数
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 每帧更新
    ///
    /// 先执行脚本发起的请求，再分发原生层送回的结果。
    pub fn update(&mut self) -> DispatchStats {
        if !self.running {
            return DispatchStats::default();
        }

        for request in self.host.take_requests() {
            if let Err(e) = self.apply_request(request) {
                tracing::error!(target: "iap.script", "IAP request failed: {}", e);
            }
        }

        if self.queue.is_empty() {
            return DispatchStats::default();
        }

        let mut batch = std::mem::take(&mut self.batch);
        self.queue.drain_into(&mut batch);

        let stats = Dispatcher::new(&mut self.listeners, &mut self.host).dispatch_all(batch.drain(..));
        self.batch = batch;

        tracing::trace!(target: "iap.dispatch", "dispatched {:?}", stats);
        stats
    }

    /// 关闭扩展，可重复调用
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        for listener in self.listeners.clear() {
            self.host.release(listener);
        }
        // 脚本尚未执行的请求里也可能持有回调
        for request in self.host.take_requests() {
            self.discard_request(request);
        }

        let discarded = self.queue.close();
        if discarded > 0 {
            tracing::warn!(
                target: "iap",
                "Discarded {} undelivered IAP results on shutdown",
                discarded
            );
        }

        if let Err(e) = self.billing.stop() {
            tracing::error!(target: "iap", "Failed to stop billing service: {}", e);
        }
        tracing::info!(target: "iap", "IAP extension shut down");
    }
}

impl<H: ScriptHost, B: BillingProvider> Drop for Iap<H, B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<H: ScriptHost, B: BillingProvider> EnginePlugin for Iap<H, B> {
    fn name(&self) -> &'static str {
        "IapPlugin"
    }

    fn description(&self) -> &'static str {
        "Relays native billing results to script callbacks on the engine thread"
    }

    fn update(&mut self) {
        Iap::update(self);
    }

    fn shutdown(&mut self) {
        Iap::shutdown(self);
    }
}
