//! 跨线程传递的计费结果命令

use crate::iap::constants::BillingResponse;

/// 命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// 商品列表查询结果，交给一次性回调
    ProductListResult,
    /// 购买/恢复结果，交给常驻监听器
    PurchaseResult,
}

/// 单条待分发的计费结果
///
/// 由原生线程创建并移交给队列；分发器按值消费，载荷随之释放。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub response_code: i32,
    /// UTF-8 JSON，原生层可能传空
    pub payload: Option<String>,
}

impl Command {
    pub fn new(kind: CommandKind, response_code: i32, payload: Option<String>) -> Self {
        Self {
            kind,
            response_code,
            payload,
        }
    }

    pub fn product_list(response_code: i32, payload: Option<String>) -> Self {
        Self::new(CommandKind::ProductListResult, response_code, payload)
    }

    pub fn purchase(response_code: i32, payload: Option<String>) -> Self {
        Self::new(CommandKind::PurchaseResult, response_code, payload)
    }

    pub fn response(&self) -> BillingResponse {
        BillingResponse::from_code(self.response_code)
    }
}
