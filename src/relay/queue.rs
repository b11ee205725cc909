//! 命令队列
//!
//! 多生产者（原生回调线程）/ 单消费者（引擎线程）。临界区只做追加或整体交换，
//! 回调永远在锁外执行，回调里再次发起请求不会死锁。

use super::command::Command;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 互斥锁保护的命令缓冲区
#[derive(Debug, Default)]
pub struct CommandQueue {
    buffer: Mutex<Vec<Command>>,
    /// 锁外可读的长度，只用于快速判空
    len: AtomicUsize,
    closed: AtomicBool,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(capacity)),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Command>> {
        // 缓冲区只是普通数据，持锁线程 panic 后依然一致
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 追加一条命令，可从任意线程调用
    ///
    /// 队列关闭后命令被丢弃，返回 `false`。
    pub fn push(&self, command: Command) -> bool {
        let mut buffer = self.lock();
        // 在锁内检查，关闭之后不会再有命令进入缓冲区
        if self.closed.load(Ordering::Acquire) {
            drop(buffer);
            tracing::warn!(
                target: "iap.relay",
                "Dropping {:?} (code {}) received after shutdown",
                command.kind,
                command.response_code
            );
            return false;
        }

        buffer.push(command);
        self.len.store(buffer.len(), Ordering::Release);
        true
    }

    /// 锁外判空；可能短暂滞后，漏掉的命令在下一帧处理
    pub fn is_empty(&self) -> bool {
        self.len.load(Ordering::Acquire) == 0
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// 取走全部命令并清空队列
    pub fn drain_all(&self) -> Vec<Command> {
        let mut out = Vec::new();
        self.drain_into(&mut out);
        out
    }

    /// 把全部命令按到达顺序追加到 `out`
    ///
    /// 队列缓冲区保留容量；调用方复用 `out` 可避免每帧分配。
    pub fn drain_into(&self, out: &mut Vec<Command>) -> usize {
        if self.is_empty() {
            return 0;
        }

        let mut buffer = self.lock();
        let drained = buffer.len();
        out.append(&mut buffer);
        self.len.store(0, Ordering::Release);
        drained
    }

    /// 关闭队列，返回被丢弃的待处理命令数
    pub fn close(&self) -> usize {
        let mut buffer = self.lock();
        self.closed.store(true, Ordering::Release);
        let discarded = buffer.len();
        buffer.clear();
        self.len.store(0, Ordering::Release);
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::command::CommandKind;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_drain_is_noop() {
        let queue = CommandQueue::new();
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let queue = CommandQueue::new();
        queue.push(Command::product_list(0, Some("{}".to_string())));
        queue.push(Command::purchase(1, None));
        queue.push(Command::purchase(0, Some("[]".to_string())));
        assert_eq!(queue.len(), 3);

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].kind, CommandKind::ProductListResult);
        assert_eq!(drained[1].response_code, 1);
        assert_eq!(drained[2].payload.as_deref(), Some("[]"));
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_drain_keeps_buffer_capacity() {
        let queue = CommandQueue::with_capacity(4);
        for code in 0..16 {
            queue.push(Command::purchase(code, None));
        }
        let mut out = Vec::new();
        assert_eq!(queue.drain_into(&mut out), 16);
        assert!(queue.lock().capacity() >= 16);
    }

    #[test]
    fn test_push_after_close_is_dropped() {
        let queue = CommandQueue::new();
        queue.push(Command::purchase(0, None));
        assert_eq!(queue.close(), 1);
        assert!(!queue.push(Command::purchase(0, None)));
        assert!(queue.is_empty());
        assert!(queue.is_closed());
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(CommandQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.push(Command::purchase(t * 1000 + i, None));
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while seen.len() < 1000 {
            seen.extend(queue.drain_all());
            thread::yield_now();
        }
        for producer in producers {
            producer.join().unwrap();
        }
        seen.extend(queue.drain_all());

        assert_eq!(seen.len(), 1000);
        // 同一生产者的命令保持推入顺序
        for t in 0..4 {
            let codes: Vec<i32> = seen
                .iter()
                .map(|c| c.response_code)
                .filter(|code| code / 1000 == t)
                .collect();
            let mut sorted = codes.clone();
            sorted.sort();
            assert_eq!(codes, sorted);
            assert_eq!(codes.len(), 250);
        }
    }
}
