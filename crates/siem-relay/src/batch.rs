//! Batch Scheduler
//!
//! Collects events from the delivery queue into windows bounded by size and
//! time. The remaining window time is recomputed before every pull.

use crate::error::QueueError;
use crate::event::Event;
use crate::queue::DeliveryQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Why a collection window ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClose {
    /// Size cap reached
    Full,
    /// Window duration elapsed
    Deadline,
    /// Queue failed while waiting
    Failed(QueueError),
}

/// One collection window
#[derive(Debug)]
pub struct Window {
    /// Collected events, in enqueue order
    pub events: Vec<Event>,
    pub closed_by: WindowClose,
}

pub struct BatchScheduler {
    queue: Arc<DeliveryQueue>,
    max_batch_size: usize,
    window: Duration,
}

impl BatchScheduler {
    pub fn new(queue: Arc<DeliveryQueue>, max_batch_size: usize, window: Duration) -> Self {
        Self {
            queue,
            max_batch_size: max_batch_size.max(1),
            window,
        }
    }

    /// Collect one window.
    ///
    /// Returns as soon as the size cap is reached, the deadline passes, or
    /// the queue fails. Events collected before a failure are kept.
    pub async fn collect(&self) -> Window {
        let deadline = Instant::now() + self.window;
        let mut events = Vec::with_capacity(self.max_batch_size);

        while events.len() < self.max_batch_size {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Window { events, closed_by: WindowClose::Deadline };
            }

            match self.queue.pop_timeout(remaining).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => return Window { events, closed_by: WindowClose::Deadline },
                Err(e) => return Window { events, closed_by: WindowClose::Failed(e) },
            }
        }

        Window { events, closed_by: WindowClose::Full }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverflowPolicy;

    fn event(id: usize) -> Event {
        Event::threat("t", "u@corp.com", 0.5, "m").id(format!("e{}", id)).build()
    }

    fn setup(cap: usize, window: Duration) -> (Arc<DeliveryQueue>, BatchScheduler) {
        let queue = Arc::new(DeliveryQueue::new(1000, OverflowPolicy::DropNewest));
        let scheduler = BatchScheduler::new(queue.clone(), cap, window);
        (queue, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_closes_on_size_cap() {
        let (queue, scheduler) = setup(10, Duration::from_secs(30));
        for i in 0..12 {
            queue.push(event(i));
        }

        let start = Instant::now();
        let window = scheduler.collect().await;

        assert_eq!(window.closed_by, WindowClose::Full);
        assert_eq!(window.events.len(), 10);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closes_on_deadline() {
        let (queue, scheduler) = setup(10, Duration::from_secs(2));
        for i in 0..3 {
            queue.push(event(i));
        }

        let start = Instant::now();
        let window = scheduler.collect().await;

        assert_eq!(window.closed_by, WindowClose::Deadline);
        assert_eq!(window.events.len(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_window() {
        let (_queue, scheduler) = setup(10, Duration::from_secs(2));

        let window = scheduler.collect().await;

        assert!(window.events.is_empty());
        assert_eq!(window.closed_by, WindowClose::Deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preserves_enqueue_order_across_waits() {
        let (queue, scheduler) = setup(5, Duration::from_secs(10));
        let producer = queue.clone();
        tokio::spawn(async move {
            for i in 0..5 {
                producer.push(event(i));
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        });

        let window = scheduler.collect().await;

        let ids: Vec<&str> = window.events.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["e0", "e1", "e2", "e3", "e4"]);
        assert_eq!(window.closed_by, WindowClose::Full);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_failure_keeps_collected_events() {
        let (queue, scheduler) = setup(10, Duration::from_secs(30));
        queue.push(event(0));
        queue.push(event(1));
        queue.close();

        let window = scheduler.collect().await;

        assert_eq!(window.events.len(), 2);
        assert_eq!(window.closed_by, WindowClose::Failed(QueueError::Closed));
    }
}
