//! 跨线程命令中继
//!
//! 原生计费层在自己的线程上完成请求，通过 [`ResultSink`] 把结果写入
//! [`CommandQueue`]；引擎线程每帧取走队列内容并分发给脚本回调。

pub mod command;
pub mod queue;

pub use command::{Command, CommandKind};
pub use queue::CommandQueue;

use std::sync::Arc;

/// 原生层回调入口
///
/// 可克隆、可跨线程传递。只做一次有界的加锁追加，不会长时间阻塞原生线程。
#[derive(Debug, Clone)]
pub struct ResultSink {
    queue: Arc<CommandQueue>,
}

impl ResultSink {
    pub fn new(queue: Arc<CommandQueue>) -> Self {
        Self { queue }
    }

    /// 商品列表查询完成
    pub fn product_list_completed(&self, response_code: i32, product_list: Option<String>) -> bool {
        tracing::trace!(target: "iap.relay", "product list completed with code {}", response_code);
        self.queue
            .push(Command::product_list(response_code, product_list))
    }

    /// 购买（或恢复、补发）完成
    pub fn purchase_completed(&self, response_code: i32, purchase: Option<String>) -> bool {
        tracing::trace!(target: "iap.relay", "purchase completed with code {}", response_code);
        self.queue.push(Command::purchase(response_code, purchase))
    }

    /// 扩展是否已关闭
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}
