//! 无脚本引擎的宿主
//!
//! 回调是 Rust 闭包，实例只是编号。记录每次调用和释放，
//! 适合测试以及不带脚本运行时的构建。

use super::{CallbackArgs, HostListener, HostRequest, ScriptHost, ScriptRequest};
use crate::core::{ScriptError, ScriptResult};
use crate::iap::listener::ListenerRegistration;
use std::collections::{HashMap, HashSet};

/// 回调编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// 实例编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

type HeadlessCallback = Box<dyn FnMut(&InstanceId, &CallbackArgs) -> Result<(), String>>;

/// 一次回调调用的记录
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub callback: CallbackId,
    pub instance: InstanceId,
    pub args: CallbackArgs,
}

/// 闭包宿主
#[derive(Default)]
pub struct HeadlessHost {
    callbacks: HashMap<CallbackId, HeadlessCallback>,
    live_instances: HashSet<InstanceId>,
    next_id: u64,
    invocations: Vec<Invocation>,
    released: Vec<CallbackId>,
    pending: Vec<ScriptRequest<CallbackId, InstanceId>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// 创建一个存活的实例
    pub fn create_instance(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id());
        self.live_instances.insert(id);
        id
    }

    /// 销毁实例；之后登记在它名下的回调不再被调用
    pub fn destroy_instance(&mut self, instance: InstanceId) {
        self.live_instances.remove(&instance);
    }

    /// 注册回调闭包
    pub fn register_callback<F>(&mut self, callback: F) -> CallbackId
    where
        F: FnMut(&InstanceId, &CallbackArgs) -> Result<(), String> + 'static,
    {
        let id = CallbackId(self.next_id());
        self.callbacks.insert(id, Box::new(callback));
        id
    }

    /// 模拟脚本发起的请求，下一帧由扩展执行
    pub fn request(&mut self, request: ScriptRequest<CallbackId, InstanceId>) {
        self.pending.push(request);
    }

    /// 便捷方法：以 `instance` 身份发起商品列表查询
    pub fn request_list(
        &mut self,
        instance: InstanceId,
        product_ids: &[&str],
        callback: CallbackId,
    ) {
        self.request(ScriptRequest::List {
            product_ids: product_ids.iter().map(|id| id.to_string()).collect(),
            listener: ListenerRegistration::new(callback, instance),
        });
    }

    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    pub fn released(&self) -> &[CallbackId] {
        &self.released
    }

    /// 回调是否仍然可用（未释放）
    pub fn is_callback_live(&self, callback: CallbackId) -> bool {
        self.callbacks.contains_key(&callback)
    }
}

impl ScriptHost for HeadlessHost {
    type Callback = CallbackId;
    type Instance = InstanceId;

    fn is_instance_valid(&self, instance: &InstanceId) -> bool {
        self.live_instances.contains(instance)
    }

    fn invoke(&mut self, listener: &HostListener<Self>, args: CallbackArgs) -> ScriptResult<()> {
        if !self.is_instance_valid(&listener.instance) {
            return Err(ScriptError::InstanceDestroyed);
        }
        let callback = self.callbacks.get_mut(&listener.callback).ok_or_else(|| {
            ScriptError::InvalidBinding(format!("callback {:?} was released", listener.callback))
        })?;

        let outcome = callback(&listener.instance, &args);
        self.invocations.push(Invocation {
            callback: listener.callback,
            instance: listener.instance,
            args,
        });
        outcome.map_err(ScriptError::Runtime)
    }

    fn release(&mut self, listener: HostListener<Self>) {
        self.callbacks.remove(&listener.callback);
        self.released.push(listener.callback);
    }

    fn take_requests(&mut self) -> Vec<HostRequest<Self>> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iap::constants::ErrorDescriptor;

    #[test]
    fn test_invoke_and_release() {
        let mut host = HeadlessHost::new();
        let instance = host.create_instance();
        let callback = host.register_callback(|_, _| Ok(()));
        let listener = ListenerRegistration::new(callback, instance);

        host.invoke(&listener, CallbackArgs::failure(ErrorDescriptor::unspecified("x")))
            .unwrap();
        assert_eq!(host.invocations().len(), 1);

        host.release(listener);
        assert!(!host.is_callback_live(callback));
        assert_eq!(host.released(), &[callback]);

        let stale = ListenerRegistration::new(callback, instance);
        assert!(matches!(
            host.invoke(&stale, CallbackArgs::failure(ErrorDescriptor::unspecified("x"))),
            Err(ScriptError::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_destroyed_instance_is_rejected() {
        let mut host = HeadlessHost::new();
        let instance = host.create_instance();
        let callback = host.register_callback(|_, _| Ok(()));
        host.destroy_instance(instance);

        assert!(!host.is_instance_valid(&instance));
        let listener = ListenerRegistration::new(callback, instance);
        assert_eq!(
            host.invoke(&listener, CallbackArgs::failure(ErrorDescriptor::unspecified("x"))),
            Err(ScriptError::InstanceDestroyed)
        );
    }

    #[test]
    fn test_take_requests_drains() {
        let mut host = HeadlessHost::new();
        let instance = host.create_instance();
        let callback = host.register_callback(|_, _| Ok(()));
        host.request_list(instance, &["coins_100"], callback);
        host.request(ScriptRequest::Restore);

        assert_eq!(host.take_requests().len(), 2);
        assert!(host.take_requests().is_empty());
    }
}
