//! Name-keyed queue registry

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::error::SqsError;
use super::queue::{Queue, DEFAULT_QUEUE_CAPACITY};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:9324";
pub const DEFAULT_ACCOUNT_ID: &str = "123";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Longest queue name SQS accepts, `.fifo` suffix included
pub const MAX_QUEUE_NAME_LEN: usize = 80;

/// Check that `name` is 1 to 80 characters of `[A-Za-z0-9_-]`, optionally
/// ending in `.fifo`
///
/// Only such names survive the round trip through a queue URL.
pub fn validate_queue_name(name: &str) -> Result<(), SqsError> {
    let base = name.strip_suffix(".fifo").unwrap_or(name);
    let valid = !base.is_empty()
        && name.len() <= MAX_QUEUE_NAME_LEN
        && base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(SqsError::InvalidQueueName(name.to_string()))
    }
}

/// Recover a queue name from a queue URL or request path
///
/// The name is the last non-empty `/` segment, so
/// `http://localhost:9324/123/jobs`, `/123/jobs` and `jobs` all map to `jobs`.
pub fn queue_name_from_url(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

/// All queues known to one server instance
///
/// Queues are handed out as `Arc<Queue>`; the registry lock only guards the
/// name map and is never held while a queue is being used.
#[derive(Debug)]
pub struct Registry {
    endpoint: String,
    account_id: String,
    capacity: usize,
    queues: RwLock<HashMap<String, Arc<Queue>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_ACCOUNT_ID)
    }
}

impl Registry {
    pub fn new(endpoint: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self::with_capacity(endpoint, account_id, DEFAULT_QUEUE_CAPACITY)
    }

    /// Registry whose queues hold at most `capacity` pending messages each
    pub fn with_capacity(
        endpoint: impl Into<String>,
        account_id: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            account_id: account_id.into(),
            capacity,
            queues: RwLock::new(HashMap::new()),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// External URL for a queue name
    pub fn queue_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.account_id, name)
    }

    pub fn queue_arn(&self, name: &str) -> String {
        format!("arn:aws:sqs:{}:{}:{}", DEFAULT_REGION, self.account_id, name)
    }

    /// Create an empty queue, replacing any existing queue of that name
    pub fn create(&self, name: &str) -> Result<Arc<Queue>, SqsError> {
        validate_queue_name(name)?;

        let queue = Arc::new(Queue::new(name, self.queue_url(name), self.capacity));
        let replaced = self
            .queues
            .write()
            .insert(name.to_string(), Arc::clone(&queue))
            .is_some();

        info!(name = %name, url = %queue.url(), replaced, "Created queue");
        Ok(queue)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<Queue>, SqsError> {
        self.queues
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SqsError::QueueNotFound(name.to_string()))
    }

    /// Look a queue up by its URL (or any path ending in its name)
    pub fn resolve(&self, url: &str) -> Result<Arc<Queue>, SqsError> {
        self.lookup(queue_name_from_url(url))
    }

    /// Snapshot of all queues, ordered by name
    pub fn list(&self) -> Vec<Arc<Queue>> {
        let mut queues: Vec<Arc<Queue>> = self.queues.read().values().cloned().collect();
        queues.sort_by(|a, b| a.name().cmp(b.name()));
        queues
    }

    pub fn len(&self) -> usize {
        self.queues.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.read().is_empty()
    }

    /// Discard every queue, returning how many were dropped
    pub fn reset(&self) -> usize {
        let dropped = std::mem::take(&mut *self.queues.write());
        info!(count = dropped.len(), "Reset queue registry");
        dropped.len()
    }
}
