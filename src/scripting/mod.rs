//! 脚本宿主抽象
//!
//! 分发器和请求网关只通过 [`ScriptHost`] 与脚本引擎交互：
//! 保存回调句柄和调用者实例，稍后在引擎线程上带着正确的 `self` 调用回调。
//!
//! - [`headless::HeadlessHost`] - Rust闭包作为回调（测试、无脚本环境）
//! - [`quickjs::QuickJsHost`] - QuickJS 脚本，提供 `iap` 模块

pub mod headless;
pub mod quickjs;

pub use headless::HeadlessHost;
pub use quickjs::QuickJsHost;

use crate::core::ScriptResult;
use crate::iap::constants::ErrorDescriptor;
use crate::iap::listener::ListenerRegistration;
use std::collections::HashMap;
use std::fmt;

/// 脚本值
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ScriptValue>),
    Object(HashMap<String, ScriptValue>),
}

impl ScriptValue {
    /// 读取对象字段
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        match self {
            ScriptValue::Object(fields) => fields.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ScriptValue::Object(_))
    }

    /// 从字符串键值对构造对象
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        ScriptValue::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ScriptValue::Null,
            Value::Bool(b) => ScriptValue::Bool(b),
            Value::Number(n) => ScriptValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => ScriptValue::String(s),
            Value::Array(items) => ScriptValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(fields) => {
                ScriptValue::Object(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Number(value)
    }
}

/// 回调参数 `(self, result, error)` 中 `self` 之外的部分
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackArgs {
    pub result: Option<ScriptValue>,
    pub error: Option<ErrorDescriptor>,
}

impl CallbackArgs {
    pub fn success(result: ScriptValue) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: ErrorDescriptor) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 脚本发起、等待在引擎线程上执行的网关请求
pub enum ScriptRequest<C, I> {
    List {
        product_ids: Vec<String>,
        listener: ListenerRegistration<C, I>,
    },
    Buy {
        product_id: String,
    },
    Finish {
        transaction: ScriptValue,
    },
    Restore,
    SetListener {
        listener: ListenerRegistration<C, I>,
    },
}

impl<C, I> fmt::Debug for ScriptRequest<C, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptRequest::List { product_ids, .. } => {
                f.debug_struct("List").field("product_ids", product_ids).finish()
            }
            ScriptRequest::Buy { product_id } => {
                f.debug_struct("Buy").field("product_id", product_id).finish()
            }
            ScriptRequest::Finish { transaction } => {
                f.debug_struct("Finish").field("transaction", transaction).finish()
            }
            ScriptRequest::Restore => f.write_str("Restore"),
            ScriptRequest::SetListener { .. } => f.write_str("SetListener"),
        }
    }
}

/// 宿主对应的监听器登记类型
pub type HostListener<H> =
    ListenerRegistration<<H as ScriptHost>::Callback, <H as ScriptHost>::Instance>;

/// 宿主对应的请求类型
pub type HostRequest<H> = ScriptRequest<<H as ScriptHost>::Callback, <H as ScriptHost>::Instance>;

/// 脚本引擎接口
///
/// 所有方法只在引擎线程上调用。
pub trait ScriptHost {
    /// 回调函数句柄
    type Callback;
    /// 调用者实例（脚本中的 `self`）
    type Instance: Clone + fmt::Debug;

    /// 实例是否仍然存活；登记后实例可能已被销毁
    fn is_instance_valid(&self, instance: &Self::Instance) -> bool;

    /// 以登记时的实例为 `self` 调用回调
    fn invoke(
        &mut self,
        listener: &ListenerRegistration<Self::Callback, Self::Instance>,
        args: CallbackArgs,
    ) -> ScriptResult<()>;

    /// 释放回调和实例句柄，按值消费保证只释放一次
    fn release(&mut self, listener: ListenerRegistration<Self::Callback, Self::Instance>);

    /// 取走脚本自上一帧以来发起的请求
    fn take_requests(&mut self) -> Vec<ScriptRequest<Self::Callback, Self::Instance>> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion() {
        let value: ScriptValue = json!({"id": "coins_100", "price": 0.99, "tags": [true, null]}).into();

        assert_eq!(value.get("id").and_then(ScriptValue::as_str), Some("coins_100"));
        assert_eq!(value.get("price").and_then(ScriptValue::as_number), Some(0.99));
        assert_eq!(
            value.get("tags"),
            Some(&ScriptValue::Array(vec![ScriptValue::Bool(true), ScriptValue::Null]))
        );
        assert!(value.get("missing").is_none());
        assert!(ScriptValue::Null.get("id").is_none());
    }

    #[test]
    fn test_object_builder() {
        let value = ScriptValue::object([("receipt", ScriptValue::from("r-1"))]);
        assert!(value.is_object());
        assert_eq!(value.get("receipt").and_then(ScriptValue::as_str), Some("r-1"));
    }
}
