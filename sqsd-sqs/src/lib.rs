//! In-memory SQS emulation for sqsd
//!
//! Provides the queue engine and the Query API on top of it:
//! - CreateQueue, GetQueueUrl, ListQueues, GetQueueAttributes
//! - SendMessage (with optional delay), ReceiveMessage (with long polling)
//! - DeleteMessage, DeleteMessageBatch

pub mod handlers;
pub mod router;
pub mod state;
pub mod storage;
pub mod xml;

pub use handlers::{handle_request, handle_reset};
pub use router::{router, RESET_PATH};
pub use state::{SqsConfig, SqsState};
pub use storage::{Delivery, Message, Queue, Registry, SqsError};
