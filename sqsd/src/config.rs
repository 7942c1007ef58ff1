//! Configuration management
//!
//! Settings come from three layers, highest precedence first: command-line
//! flags (and their `SQSD_*` environment fallbacks), an optional `sqsd.toml`
//! file (or `SQSD_SERVER__*` / `SQSD_SQS__*` environment keys), then defaults.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use sqsd_sqs::SqsConfig;

/// File / environment configuration
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sqs: QueueConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Host name written into queue URLs
    #[serde(default = "default_public_host")]
    pub public_host: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_host: default_public_host(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_account_id")]
    pub account_id: String,

    #[serde(default)]
    pub queues: Vec<String>,

    #[serde(default)]
    pub delay_ms: u64,

    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            account_id: default_account_id(),
            queues: Vec::new(),
            delay_ms: 0,
            max_wait_seconds: default_max_wait_seconds(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9324
}

fn default_public_host() -> String {
    "localhost".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_account_id() -> String {
    sqsd_sqs::storage::DEFAULT_ACCOUNT_ID.to_string()
}

fn default_max_wait_seconds() -> u64 {
    sqsd_sqs::state::DEFAULT_MAX_WAIT_SECONDS
}

fn default_queue_capacity() -> usize {
    sqsd_sqs::storage::DEFAULT_QUEUE_CAPACITY
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Without an explicit path, `sqsd.toml` in the working directory is read
    /// if it exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name("sqsd").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("SQSD").separator("__"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }

    /// Queue-service settings derived from this configuration
    pub fn sqs_config(&self) -> SqsConfig {
        SqsConfig {
            endpoint: format!("http://{}:{}", self.server.public_host, self.server.port),
            account_id: self.sqs.account_id.clone(),
            queue_capacity: self.sqs.queue_capacity,
            delay: Duration::from_millis(self.sqs.delay_ms),
            max_wait: Duration::from_secs(
                self.sqs
                    .max_wait_seconds
                    .min(sqsd_sqs::state::DEFAULT_MAX_WAIT_SECONDS),
            ),
            queues: self.sqs.queues.clone(),
        }
    }
}
