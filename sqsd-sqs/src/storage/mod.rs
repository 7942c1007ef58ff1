//! SQS in-memory storage

mod error;
mod message;
mod queue;
mod registry;

#[cfg(test)]
mod tests;

pub use error::SqsError;
pub use message::{md5_hex, new_receipt_handle, Message, RECEIPT_HANDLE_BYTES};
pub use queue::{Delivery, Queue, DEFAULT_QUEUE_CAPACITY};
pub use registry::{
    queue_name_from_url, validate_queue_name, Registry, DEFAULT_ACCOUNT_ID, DEFAULT_ENDPOINT,
    DEFAULT_REGION, MAX_QUEUE_NAME_LEN,
};
