//! Test server management

use portpicker::pick_unused_port;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use sqsd_sqs::{SqsConfig, SqsState, RESET_PATH};

/// How long to wait for the listener to accept connections
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A queue service running inside the test process
pub struct TestServer {
    state: Arc<SqsState>,
    port: u16,
    base_url: String,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Start a server with default settings on a random available port
    pub async fn start() -> Result<Self, TestError> {
        Self::start_with(SqsConfig::default()).await
    }

    /// Start a server with custom settings on a random available port
    ///
    /// The endpoint in `config` is replaced so queue URLs point at this server.
    pub async fn start_with(mut config: SqsConfig) -> Result<Self, TestError> {
        let port = pick_unused_port().ok_or(TestError::NoPortAvailable)?;
        let base_url = format!("http://127.0.0.1:{}", port);
        config.endpoint = base_url.clone();

        let state = Arc::new(SqsState::new(config));
        let app = sqsd_sqs::router(Arc::clone(&state));

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TestError::StartFailed(e.to_string()))?;

        info!(port = port, "Starting sqsd test server");
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Test server stopped");
            }
        });

        let server = Self {
            state,
            port,
            base_url,
            task,
        };
        server.wait_ready().await?;
        Ok(server)
    }

    async fn wait_ready(&self) -> Result<(), TestError> {
        let start = std::time::Instant::now();
        while start.elapsed() < STARTUP_TIMEOUT {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                info!(port = self.port, "sqsd test server ready");
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Err(TestError::StartupTimeout)
    }

    /// Get the base URL
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Shared state of the running service
    pub fn state(&self) -> &Arc<SqsState> {
        &self.state
    }

    /// Drop every queue through the reset endpoint
    pub async fn reset(&self) -> Result<(), TestError> {
        let response = reqwest::Client::new()
            .post(format!("{}{}", self.base_url, RESET_PATH))
            .send()
            .await
            .map_err(|e| TestError::ClientError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TestError::ClientError(format!(
                "reset returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Get a client for this server
    pub fn client(&self) -> crate::SqsdClient {
        crate::SqsdClient::new(self.base_url.clone())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Errors that can occur with the test server
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("No available port found")]
    NoPortAvailable,

    #[error("Failed to start server: {0}")]
    StartFailed(String),

    #[error("Server startup timed out")]
    StartupTimeout,

    #[error("Client error: {0}")]
    ClientError(String),
}
