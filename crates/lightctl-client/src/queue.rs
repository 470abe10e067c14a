//! Outbound write queue
//!
//! At most one write is in flight. Sends issued meanwhile wait in FIFO
//! order and are discarded without being sent once their timeout has
//! elapsed.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// A queued, not yet sent frame
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub data: Bytes,
    pub enqueued_at: Instant,
    pub timeout: Duration,
}

impl PendingMessage {
    pub fn new(data: Bytes, enqueued_at: Instant, timeout: Duration) -> Self {
        Self {
            data,
            enqueued_at,
            timeout,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.enqueued_at + self.timeout
    }
}

/// What the caller of [`OutboundQueue::submit`] has to do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submit {
    /// Nothing was in flight: write these bytes now
    WriteNow(Bytes),
    /// A write is in flight, the message waits in the backlog
    Queued,
}

#[derive(Debug, Default)]
struct QueueInner {
    in_flight: bool,
    pending: VecDeque<PendingMessage>,
    expired: u64,
}

/// Single in-flight write plus a bounded FIFO backlog
#[derive(Debug)]
pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            capacity,
        }
    }

    /// Claim the write slot, or append to the backlog if it is taken
    pub fn submit(&self, data: Bytes, timeout: Duration, now: Instant) -> Result<Submit> {
        let mut inner = self.inner.lock();

        if !inner.in_flight {
            inner.in_flight = true;
            return Ok(Submit::WriteNow(data));
        }

        if inner.pending.len() >= self.capacity {
            warn!(
                "Outbound queue full, rejecting {} byte message",
                data.len()
            );
            return Err(ClientError::QueueFull {
                capacity: self.capacity,
            });
        }

        inner
            .pending
            .push_back(PendingMessage::new(data, now, timeout));
        Ok(Submit::Queued)
    }

    /// Release the write slot and hand out the next live message, if any
    pub fn complete(&self, now: Instant) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        inner.in_flight = false;

        while let Some(message) = inner.pending.pop_front() {
            if message.is_expired(now) {
                debug!(
                    "Discarding {} byte message, waited longer than {:?}",
                    message.data.len(),
                    message.timeout
                );
                inner.expired += 1;
                continue;
            }
            inner.in_flight = true;
            return Some(message.data);
        }

        None
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.lock().in_flight
    }

    /// Number of messages waiting behind the in-flight write
    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    /// Messages discarded because they timed out while waiting
    pub fn expired_count(&self) -> u64 {
        self.inner.lock().expired
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
