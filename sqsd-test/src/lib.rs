//! Test utilities for sqsd
//!
//! Runs the queue service in-process on a random port and provides a small
//! Query API client for integration tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sqsd_test::TestServer;
//!
//! #[tokio::test]
//! async fn test_queue() {
//!     let server = TestServer::start().await.unwrap();
//!     let client = server.client();
//!
//!     let url = client.create_queue("jobs").await.unwrap();
//!     client.send_message(&url, "hello").await.unwrap();
//!
//!     // Reset state between tests
//!     server.reset().await.unwrap();
//! }
//! ```

pub mod client;
pub mod server;

pub use client::{ClientError, ReceivedMessage, SqsdClient};
pub use server::{TestError, TestServer};
