//! Multi-producer, single-consumer wait queue.
//!
//! Producers hold a cloneable [`Enqueuer`]; the single consumer owns the
//! [`WaitQueue`]. `dequeue` blocks until an item arrives or the timeout
//! elapses, `drain_all` picks up whatever accumulated without blocking.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

/// Returned by [`Enqueuer::enqueue`] once the consumer has gone away.
/// Carries the rejected item back to the caller.
#[derive(Debug)]
pub struct QueueClosed<T>(pub T);

impl<T> fmt::Display for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("wait queue consumer is gone")
    }
}

impl<T: fmt::Debug> std::error::Error for QueueClosed<T> {}

/// Result of a blocking dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued<T> {
    /// Oldest item not yet returned.
    Item(T),
    /// The timeout elapsed with nothing queued.
    TimedOut,
    /// Every producer handle was dropped and the queue is empty.
    Closed,
}

/// Producer side. Never blocks.
#[derive(Debug)]
pub struct Enqueuer<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for Enqueuer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Enqueuer<T> {
    /// Append an item and wake the consumer if it is waiting.
    pub fn enqueue(&self, item: T) -> Result<(), QueueClosed<T>> {
        self.tx.send(item).map_err(|e| QueueClosed(e.0))
    }

    /// True once the consumer side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side. Owned by exactly one task.
#[derive(Debug)]
pub struct WaitQueue<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

/// Create a connected producer/consumer pair.
pub fn wait_queue<T>() -> (Enqueuer<T>, WaitQueue<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Enqueuer { tx }, WaitQueue { rx })
}

impl<T> WaitQueue<T> {
    /// Wait for the next item, at most `timeout`.
    ///
    /// Cancel-safe: dropping the returned future never loses an item.
    pub async fn dequeue(&mut self, timeout: Duration) -> Dequeued<T> {
        match time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(item)) => Dequeued::Item(item),
            Ok(None) => Dequeued::Closed,
            Err(_) => Dequeued::TimedOut,
        }
    }

    /// Remove and return every item currently queued, oldest first.
    pub fn drain_all(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.rx.len());
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut queue) = wait_queue();
        for i in 0..3 {
            tx.enqueue(i).unwrap();
        }
        assert_eq!(queue.dequeue(Duration::from_secs(1)).await, Dequeued::Item(0));
        assert_eq!(queue.drain_all(), vec![1, 2]);
        assert!(queue.drain_all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_times_out() {
        let (_tx, mut queue) = wait_queue::<u32>();
        let res = queue.dequeue(Duration::from_secs(3600)).await;
        assert_eq!(res, Dequeued::TimedOut);
    }

    #[tokio::test]
    async fn test_enqueue_wakes_waiter() {
        let (tx, mut queue) = wait_queue();
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.enqueue("wake").unwrap();
        });

        assert_eq!(queue.dequeue(Duration::from_secs(30)).await, Dequeued::Item("wake"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_closed_after_producers_dropped() {
        let (tx, mut queue) = wait_queue();
        tx.enqueue(7).unwrap();
        drop(tx);
        assert_eq!(queue.dequeue(Duration::from_secs(1)).await, Dequeued::Item(7));
        assert_eq!(queue.dequeue(Duration::from_secs(1)).await, Dequeued::Closed);
    }

    #[tokio::test]
    async fn test_enqueue_after_consumer_dropped() {
        let (tx, queue) = wait_queue();
        drop(queue);
        assert!(tx.is_closed());
        let err = tx.enqueue(42).unwrap_err();
        assert_eq!(err.0, 42);
    }

    #[tokio::test]
    async fn test_concurrent_producers_lose_nothing() {
        let (tx, mut queue) = wait_queue();
        let mut tasks = Vec::new();
        for p in 0..8u32 {
            let tx = tx.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..100u32 {
                    tx.enqueue(p * 1000 + i).unwrap();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let mut all = queue.drain_all();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
        assert!(queue.is_empty());
    }
}
