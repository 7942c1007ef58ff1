//! Shared service state for the SQS handlers

use std::time::Duration;

use tracing::{info, warn};

use crate::storage::{Registry, DEFAULT_ACCOUNT_ID, DEFAULT_ENDPOINT, DEFAULT_QUEUE_CAPACITY};

/// Longest `WaitTimeSeconds` SQS accepts; also the cap on the configured wait
pub const DEFAULT_MAX_WAIT_SECONDS: u64 = 20;

/// Service settings, built by the server from flags and config
#[derive(Debug, Clone)]
pub struct SqsConfig {
    /// Scheme, host and port used in queue URLs
    pub endpoint: String,
    pub account_id: String,
    /// Pending message bound per queue
    pub queue_capacity: usize,
    /// Extra delay before every sent message becomes visible
    pub delay: Duration,
    /// Upper bound applied to `WaitTimeSeconds`, itself capped at
    /// [`DEFAULT_MAX_WAIT_SECONDS`]
    pub max_wait: Duration,
    /// Queues created at startup
    pub queues: Vec<String>,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            delay: Duration::ZERO,
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECONDS),
            queues: Vec::new(),
        }
    }
}

/// State for SQS handlers
#[derive(Debug)]
pub struct SqsState {
    pub registry: Registry,
    pub delay: Duration,
    pub max_wait: Duration,
}

impl Default for SqsState {
    fn default() -> Self {
        Self::new(SqsConfig::default())
    }
}

impl SqsState {
    pub fn new(config: SqsConfig) -> Self {
        let registry =
            Registry::with_capacity(config.endpoint, config.account_id, config.queue_capacity);

        for name in config.queues.iter().filter(|n| !n.is_empty()) {
            info!(name = %name, "Creating startup queue");
            if let Err(e) = registry.create(name) {
                warn!(name = %name, error = %e, "Skipping startup queue");
            }
        }

        let limit = Duration::from_secs(DEFAULT_MAX_WAIT_SECONDS);
        if config.max_wait > limit {
            warn!(
                max_wait = ?config.max_wait,
                limit = ?limit,
                "Maximum wait exceeds the SQS limit; clamping"
            );
        }

        Self {
            registry,
            delay: config.delay,
            max_wait: config.max_wait.min(limit),
        }
    }
}
