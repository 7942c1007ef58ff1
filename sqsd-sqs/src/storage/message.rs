//! Messages and receipt handles

use std::borrow::Cow;

use bytes::Bytes;
use md5::{Digest, Md5};
use rand::{rngs::OsRng, RngCore};

use super::error::SqsError;

/// Random bytes per receipt handle; hex encoded to twice this length
pub const RECEIPT_HANDLE_BYTES: usize = 20;

/// A queued message and every receipt handle issued for it
#[derive(Debug, Clone)]
pub struct Message {
    id: String,
    body: Bytes,
    md5_of_body: String,
    sent_timestamp: i64,
    handles: Vec<String>,
}

impl Message {
    pub fn new(body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            md5_of_body: md5_hex(&body),
            body,
            sent_timestamp: chrono::Utc::now().timestamp_millis(),
            handles: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text; invalid UTF-8 is replaced
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn md5_of_body(&self) -> &str {
        &self.md5_of_body
    }

    /// Milliseconds since the epoch at which the message was created
    pub fn sent_timestamp(&self) -> i64 {
        self.sent_timestamp
    }

    /// Receipt handles in the order they were issued
    pub fn handles(&self) -> &[String] {
        &self.handles
    }

    pub fn receive_count(&self) -> usize {
        self.handles.len()
    }

    pub fn owns_handle(&self, handle: &str) -> bool {
        self.handles.iter().any(|h| h == handle)
    }

    /// Mint a new receipt handle for this delivery and record it.
    ///
    /// The message is left untouched if the OS random source fails.
    pub fn add_handle(&mut self) -> Result<String, SqsError> {
        let handle = new_receipt_handle()?;
        self.handles.push(handle.clone());
        Ok(handle)
    }
}

/// Generate an opaque receipt handle from the OS CSPRNG
pub fn new_receipt_handle() -> Result<String, SqsError> {
    let mut bytes = [0u8; RECEIPT_HANDLE_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SqsError::HandleGeneration(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Lowercase hex MD5 digest, as SQS reports `MD5OfBody`
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}
