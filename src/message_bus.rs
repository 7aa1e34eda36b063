//! MessageBus - ordered cross-component message passing
//!
//! ## Responsibilities
//!
//! - FIFO delivery from producers to one consumer loop
//! - Blocking and timed pops
//! - Cooperative shutdown: remaining items drain in order, then the bus
//!   reports closed and never blocks again

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Outcome of a timed pop
#[derive(Debug, PartialEq, Eq)]
pub enum TryPop<T> {
    /// An item was dequeued
    Message(T),
    /// Nothing arrived within the timeout
    Empty,
    /// Shutdown was requested and the queue is drained
    Closed,
}

/// Generic FIFO bus with drain-then-close shutdown
pub struct MessageBus<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

struct Inner<T> {
    queue: VecDeque<T>,
    shutdown: bool,
}

impl<T> MessageBus<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                shutdown: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue a message and wake one waiter. Never blocks; enqueuing after
    /// shutdown is allowed (the consumer may or may not drain it).
    pub fn push(&self, message: T) {
        {
            let mut inner = self.inner.lock().expect("message bus lock poisoned");
            inner.queue.push_back(message);
        }
        self.notify.notify_one();
    }

    /// Dequeue the next message, waiting if the bus is empty.
    ///
    /// Returns `None` once shutdown has been requested and every queued
    /// item has been handed out.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a push between the
            // check and the await cannot be lost.
            notified.as_mut().enable();

            match self.take() {
                Some(step) => return step,
                None => notified.await,
            }
        }
    }

    /// Dequeue with a bounded wait, distinguishing timeout from shutdown.
    pub async fn try_pop(&self, timeout: Duration) -> TryPop<T> {
        match tokio::time::timeout(timeout, self.pop()).await {
            Ok(Some(message)) => TryPop::Message(message),
            Ok(None) => TryPop::Closed,
            Err(_) => TryPop::Empty,
        }
    }

    /// Close the bus: queued items remain poppable, waiters wake up.
    pub fn request_shutdown(&self) {
        {
            let mut inner = self.inner.lock().expect("message bus lock poisoned");
            inner.shutdown = true;
        }
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("message bus lock poisoned").queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One dequeue attempt: `Some(Some(m))` item, `Some(None)` closed and
    /// drained, `None` keep waiting.
    fn take(&self) -> Option<Option<T>> {
        let mut inner = self.inner.lock().expect("message bus lock poisoned");
        if let Some(message) = inner.queue.pop_front() {
            return Some(Some(message));
        }
        if inner.shutdown {
            return Some(None);
        }
        None
    }
}

impl<T> Default for MessageBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fifo_order_preserved() {
        let bus = MessageBus::new();
        bus.push(1);
        bus.push(2);
        bus.push(3);

        assert_eq!(bus.pop().await, Some(1));
        assert_eq!(bus.pop().await, Some(2));
        assert_eq!(bus.pop().await, Some(3));
    }

    #[tokio::test]
    async fn shutdown_drains_then_closes() {
        let bus = MessageBus::new();
        bus.push('a');
        bus.push('b');
        bus.push('c');
        bus.request_shutdown();

        assert_eq!(bus.pop().await, Some('a'));
        assert_eq!(bus.pop().await, Some('b'));
        assert_eq!(bus.pop().await, Some('c'));
        assert_eq!(bus.pop().await, None);
        // Stays closed
        assert_eq!(bus.pop().await, None);
    }

    #[tokio::test]
    async fn push_after_shutdown_does_not_deadlock() {
        let bus = MessageBus::new();
        bus.request_shutdown();
        bus.push(42);

        // Must resolve promptly either way
        let result = bus.try_pop(Duration::from_millis(100)).await;
        assert!(matches!(result, TryPop::Message(42) | TryPop::Closed));
    }

    #[tokio::test]
    async fn try_pop_times_out_on_open_empty_bus() {
        let bus: MessageBus<u8> = MessageBus::new();
        let result = bus.try_pop(Duration::from_millis(20)).await;
        assert_eq!(result, TryPop::Empty);
    }

    #[tokio::test]
    async fn try_pop_reports_closed() {
        let bus: MessageBus<u8> = MessageBus::new();
        bus.request_shutdown();
        let result = bus.try_pop(Duration::from_millis(20)).await;
        assert_eq!(result, TryPop::Closed);
    }

    #[tokio::test]
    async fn pop_wakes_on_push_from_other_task() {
        let bus = Arc::new(MessageBus::new());
        let producer = bus.clone();

        let consumer = tokio::spawn(async move { bus.pop().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        producer.push(7u8);

        assert_eq!(consumer.await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn len_tracks_queue_depth() {
        let bus = MessageBus::new();
        assert!(bus.is_empty());
        bus.push(1);
        bus.push(2);
        assert_eq!(bus.len(), 2);
        bus.pop().await;
        assert_eq!(bus.len(), 1);
    }
}
