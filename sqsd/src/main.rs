//! sqsd - in-memory SQS emulator
//!
//! Serves the SQS Query API from memory so tests can create queues, send,
//! receive (with long polling) and delete messages without AWS.

mod config;
mod router;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sqsd_sqs::SqsState;

#[derive(Parser, Debug)]
#[command(name = "sqsd")]
#[command(about = "In-memory SQS emulator for local testing", long_about = None)]
struct Args {
    /// Configuration file (defaults to ./sqsd.toml if present)
    #[arg(short, long, env = "SQSD_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "SQSD_PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "SQSD_HOST")]
    host: Option<String>,

    /// Host name used in queue URLs
    #[arg(long, env = "SQSD_PUBLIC_HOST")]
    public_host: Option<String>,

    /// Account id used in queue URLs
    #[arg(long, env = "SQSD_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Queues to create on startup, comma-separated
    #[arg(long, env = "SQSD_QUEUES", value_delimiter = ',')]
    queues: Vec<String>,

    /// Delay in milliseconds before each sent message becomes visible
    #[arg(long, env = "SQSD_DELAY")]
    delay: Option<u64>,

    /// Upper bound on ReceiveMessage WaitTimeSeconds
    #[arg(long, env = "SQSD_MAX_WAIT_SECONDS")]
    max_wait_seconds: Option<u64>,

    /// Maximum pending messages per queue
    #[arg(long, env = "SQSD_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SQSD_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    /// Layer command-line values over the loaded configuration
    fn apply(self, mut config: config::Config) -> config::Config {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(public_host) = self.public_host {
            config.server.public_host = public_host;
        }
        if let Some(log_level) = self.log_level {
            config.server.log_level = log_level;
        }
        if let Some(account_id) = self.account_id {
            config.sqs.account_id = account_id;
        }
        if !self.queues.is_empty() {
            config.sqs.queues = self.queues;
        }
        if let Some(delay) = self.delay {
            config.sqs.delay_ms = delay;
        }
        if let Some(max_wait) = self.max_wait_seconds {
            config.sqs.max_wait_seconds = max_wait;
        }
        if let Some(capacity) = self.queue_capacity {
            config.sqs.queue_capacity = capacity;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::Config::load(args.config.as_deref())?;
    let config = args.apply(config);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "sqsd={level},sqsd_sqs={level},tower_http=debug",
                    level = config.server.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("sqs memory server starting");

    let sqs_config = config.sqs_config();
    info!(
        endpoint = %sqs_config.endpoint,
        account_id = %sqs_config.account_id,
        delay = ?sqs_config.delay,
        max_wait = ?sqs_config.max_wait,
        capacity = sqs_config.queue_capacity,
        "Queue service settings"
    );

    let state = Arc::new(SqsState::new(sqs_config));
    let app = router::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
