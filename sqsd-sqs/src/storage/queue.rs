//! A single queue: pending FIFO, in-flight pool and long-poll wakeups

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::SqsError;
use super::message::Message;

/// Default bound on the number of pending messages per queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// A message handed to a receiver, with the handle minted for this delivery
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub receipt_handle: String,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Message>,
    /// Delivered, not yet deleted; keyed by delivery order
    in_flight: BTreeMap<u64, Message>,
    /// Receipt handle -> key in `in_flight`
    handles: HashMap<String, u64>,
    next_seq: u64,
}

impl QueueState {
    fn take_front(&mut self) -> Result<Option<Delivery>, SqsError> {
        self.take_front_with(Message::add_handle)
    }

    /// Deliver the head of pending, minting its handle with `mint`
    ///
    /// If `mint` fails the message goes back to the head of pending.
    fn take_front_with<F>(&mut self, mint: F) -> Result<Option<Delivery>, SqsError>
    where
        F: FnOnce(&mut Message) -> Result<String, SqsError>,
    {
        let Some(mut message) = self.pending.pop_front() else {
            return Ok(None);
        };

        let receipt_handle = match mint(&mut message) {
            Ok(handle) => handle,
            Err(e) => {
                self.pending.push_front(message);
                return Err(e);
            }
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.handles.insert(receipt_handle.clone(), seq);

        let delivery = Delivery {
            message: message.clone(),
            receipt_handle,
        };
        self.in_flight.insert(seq, message);
        Ok(Some(delivery))
    }

    fn remove_by_handle(&mut self, handle: &str) -> Option<Message> {
        let seq = self.handles.get(handle).copied()?;
        let message = self.in_flight.remove(&seq)?;
        for h in message.handles() {
            self.handles.remove(h);
        }
        Some(message)
    }
}

/// An in-memory queue
///
/// All message state sits behind one lock. Receivers blocked in
/// [`Queue::front_wait`] are woken through a [`Notify`] on every enqueue.
#[derive(Debug)]
pub struct Queue {
    name: String,
    url: String,
    capacity: usize,
    state: Mutex<QueueState>,
    available: Notify,
}

impl Queue {
    pub fn new(name: impl Into<String>, url: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            capacity,
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages awaiting first delivery
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of delivered messages not yet deleted
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Wrap `body` in a new message and append it; returns the message id
    pub fn enqueue(&self, body: impl Into<Bytes>) -> Result<String, SqsError> {
        self.push(Message::new(body))
    }

    /// Append an already built message
    ///
    /// Fails with [`SqsError::CapacityExceeded`] instead of blocking when the
    /// pending collection is full.
    pub fn push(&self, message: Message) -> Result<String, SqsError> {
        let id = message.id().to_string();
        {
            let mut state = self.state.lock();
            if state.pending.len() >= self.capacity {
                warn!(queue = %self.name, capacity = self.capacity, "Queue full, rejecting message");
                return Err(SqsError::CapacityExceeded {
                    queue: self.name.clone(),
                    capacity: self.capacity,
                });
            }
            state.pending.push_back(message);
        }
        self.available.notify_waiters();

        info!(queue = %self.name, message_id = %id, "Enqueued message");
        Ok(id)
    }

    /// Take the next pending message without waiting
    pub fn front(&self) -> Result<Option<Delivery>, SqsError> {
        let delivery = self.state.lock().take_front()?;
        if let Some(d) = &delivery {
            info!(queue = %self.name, message_id = %d.message.id(), "Delivered message");
        }
        Ok(delivery)
    }

    /// Take the next pending message, waiting up to `timeout` for one to arrive
    ///
    /// Dropping the returned future releases the wait registration. A timeout
    /// too large to express as an instant waits without a deadline.
    pub async fn front_wait(&self, timeout: Duration) -> Result<Option<Delivery>, SqsError> {
        let deadline = Instant::now().checked_add(timeout);

        loop {
            // Register before checking so an enqueue between the check and the
            // await still wakes us.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.front()? {
                return Ok(Some(delivery));
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        debug!(queue = %self.name, ?timeout, "Wait expired");
                        return self.front();
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Acknowledge the in-flight message owning `handle`
    pub fn delete(&self, handle: &str) -> Result<(), SqsError> {
        let removed = self.state.lock().remove_by_handle(handle);
        match removed {
            Some(message) => {
                info!(queue = %self.name, message_id = %message.id(), "Deleted message");
                Ok(())
            }
            None => {
                warn!(queue = %self.name, receipt = %handle, "Invalid receipt handle");
                Err(SqsError::InvalidReceiptHandle(handle.to_string()))
            }
        }
    }

    /// Delete every handle in order, reporting one result per handle.
    ///
    /// A failed entry does not stop the rest; earlier deletions stay applied.
    pub fn delete_batch<S: AsRef<str>>(&self, handles: &[S]) -> Vec<Result<(), SqsError>> {
        handles.iter().map(|h| self.delete(h.as_ref())).collect()
    }
}
