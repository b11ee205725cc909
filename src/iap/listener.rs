//! 监听器登记表
//!
//! 最多一个一次性回调（商品列表查询）和一个常驻监听器（购买/恢复结果）。
//! 登记表只在引擎线程上访问，不需要加锁。被替换下来的登记按值返回，
//! 由调用方交给脚本宿主释放。

use std::fmt;

/// 回调句柄和调用者实例
pub struct ListenerRegistration<C, I> {
    pub callback: C,
    pub instance: I,
}

impl<C, I> ListenerRegistration<C, I> {
    pub fn new(callback: C, instance: I) -> Self {
        Self { callback, instance }
    }
}

impl<C, I: fmt::Debug> fmt::Debug for ListenerRegistration<C, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

/// 监听器登记表
pub struct ListenerRegistry<C, I> {
    one_shot: Option<ListenerRegistration<C, I>>,
    durable: Option<ListenerRegistration<C, I>>,
}

impl<C, I> Default for ListenerRegistry<C, I> {
    fn default() -> Self {
        Self {
            one_shot: None,
            durable: None,
        }
    }
}

impl<C, I> ListenerRegistry<C, I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一次性回调
    ///
    /// 已有未触发的一次性回调属于误用：记录警告并返回旧登记，旧回调不会再触发。
    pub fn set_one_shot(
        &mut self,
        listener: ListenerRegistration<C, I>,
    ) -> Option<ListenerRegistration<C, I>> {
        let previous = self.one_shot.replace(listener);
        if previous.is_some() {
            tracing::warn!(
                target: "iap",
                "Unexpected callback set: discarding the pending product list callback"
            );
        }
        previous
    }

    /// 取走一次性回调
    pub fn consume_one_shot(&mut self) -> Option<ListenerRegistration<C, I>> {
        self.one_shot.take()
    }

    pub fn has_one_shot(&self) -> bool {
        self.one_shot.is_some()
    }

    /// 登记常驻监听器，返回被替换的旧登记
    pub fn set_durable(
        &mut self,
        listener: ListenerRegistration<C, I>,
    ) -> Option<ListenerRegistration<C, I>> {
        self.durable.replace(listener)
    }

    /// 读取常驻监听器，不会清除
    pub fn durable(&self) -> Option<&ListenerRegistration<C, I>> {
        self.durable.as_ref()
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// 清空登记表，返回所有仍需释放的登记
    pub fn clear(&mut self) -> Vec<ListenerRegistration<C, I>> {
        self.one_shot
            .take()
            .into_iter()
            .chain(self.durable.take())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Registry = ListenerRegistry<&'static str, u32>;

    #[test]
    fn test_one_shot_fires_once() {
        let mut registry = Registry::new();
        assert!(registry.set_one_shot(ListenerRegistration::new("cb", 1)).is_none());
        assert!(registry.has_one_shot());

        let listener = registry.consume_one_shot().unwrap();
        assert_eq!(listener.callback, "cb");
        assert!(registry.consume_one_shot().is_none());
    }

    #[test]
    fn test_one_shot_superseded() {
        let mut registry = Registry::new();
        registry.set_one_shot(ListenerRegistration::new("first", 1));
        let replaced = registry
            .set_one_shot(ListenerRegistration::new("second", 2))
            .unwrap();
        assert_eq!(replaced.callback, "first");
        assert_eq!(registry.consume_one_shot().unwrap().callback, "second");
    }

    #[test]
    fn test_durable_is_not_consumed() {
        let mut registry = Registry::new();
        assert!(registry.set_durable(ListenerRegistration::new("listener", 7)).is_none());
        assert_eq!(registry.durable().unwrap().instance, 7);
        assert_eq!(registry.durable().unwrap().instance, 7);

        let old = registry
            .set_durable(ListenerRegistration::new("listener2", 8))
            .unwrap();
        assert_eq!(old.callback, "listener");
        assert_eq!(registry.durable().unwrap().callback, "listener2");
    }

    #[test]
    fn test_clear_returns_everything() {
        let mut registry = Registry::new();
        registry.set_one_shot(ListenerRegistration::new("list", 1));
        registry.set_durable(ListenerRegistration::new("buy", 1));

        let released = registry.clear();
        assert_eq!(released.len(), 2);
        assert!(!registry.has_one_shot());
        assert!(!registry.has_durable());
        assert!(registry.clear().is_empty());
    }
}
