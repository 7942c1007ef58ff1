//! Request ID generation

use base64::Engine;
use uuid::Uuid;

/// Request ID echoed in every response's `ResponseMetadata`
#[derive(Debug, Clone)]
pub struct RequestId {
    /// Primary request ID (x-amzn-requestid)
    pub id: String,
    /// Extended request ID, base64 encoded
    pub extended_id: String,
}

impl RequestId {
    /// Generate a new request ID pair
    pub fn new() -> Self {
        let id = Uuid::new_v4().to_string();
        let extended_id =
            base64::engine::general_purpose::STANDARD.encode(Uuid::new_v4().as_bytes());

        Self { id, extended_id }
    }

    /// Create a request ID with a specific value (for testing)
    pub fn with_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let extended_id = base64::engine::general_purpose::STANDARD.encode(id.as_bytes());
        Self { id, extended_id }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}
