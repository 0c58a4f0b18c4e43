//! Delivery Queue
//!
//! Bounded FIFO between producers and the batch scheduler. `push` is
//! synchronous and never waits on the consumer; the consumer pulls with a
//! timeout.

use crate::config::OverflowPolicy;
use crate::error::QueueError;
use crate::event::Event;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;

/// Result of offering an event to the queue
#[derive(Debug)]
pub enum Admission {
    Accepted,
    /// Accepted after evicting the returned (oldest) event
    Evicted(Event),
    /// Not queued: queue full or closed
    Rejected(Event),
}

pub struct DeliveryQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
    policy: OverflowPolicy,
}

struct QueueInner {
    events: VecDeque<Event>,
    closed: bool,
}

impl DeliveryQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(QueueInner {
                events: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            policy,
        }
    }

    /// Append an event, applying the overflow policy when full.
    pub fn push(&self, event: Event) -> Admission {
        let admission = {
            let mut inner = self.inner.lock();
            if inner.closed {
                Admission::Rejected(event)
            } else if inner.events.len() < self.capacity {
                inner.events.push_back(event);
                Admission::Accepted
            } else {
                match self.policy {
                    OverflowPolicy::DropNewest => Admission::Rejected(event),
                    OverflowPolicy::DropOldest => {
                        let evicted = inner.events.pop_front();
                        inner.events.push_back(event);
                        match evicted {
                            Some(old) => Admission::Evicted(old),
                            None => Admission::Accepted,
                        }
                    }
                }
            }
        };

        if !matches!(admission, Admission::Rejected(_)) {
            self.notify.notify_one();
        }
        admission
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// `Ok(None)` means the timeout elapsed. A closed queue still yields its
    /// remaining events before failing with [`QueueError::Closed`].
    pub async fn pop_timeout(&self, timeout: Duration) -> Result<Option<Event>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(event) = inner.events.pop_front() {
                    return Ok(Some(event));
                }
                if inner.closed {
                    return Err(QueueError::Closed);
                }
            }

            // A push between the unlock above and this await leaves a permit
            // behind, so the wakeup is not lost.
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    /// Stop accepting events and wake the consumer.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
