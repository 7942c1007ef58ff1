//! Errors surfaced by the queue engine

use sqsd_core::{AwsError, ErrorCode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqsError {
    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),
    #[error("Receipt handle is invalid: {0}")]
    InvalidReceiptHandle(String),
    #[error("Queue {queue} is full ({capacity} pending messages)")]
    CapacityExceeded { queue: String, capacity: usize },
    #[error("Failed to generate receipt handle: {0}")]
    HandleGeneration(String),
    #[error("Invalid queue name: {0:?}")]
    InvalidQueueName(String),
}

impl From<SqsError> for AwsError {
    fn from(err: SqsError) -> Self {
        let code = match &err {
            SqsError::QueueNotFound(_) => ErrorCode::NonExistentQueue,
            SqsError::InvalidReceiptHandle(_) => ErrorCode::ReceiptHandleIsInvalid,
            SqsError::CapacityExceeded { .. } => ErrorCode::OverLimit,
            SqsError::HandleGeneration(_) => ErrorCode::InternalError,
            SqsError::InvalidQueueName(_) => ErrorCode::InvalidParameterValue,
        };
        let message = match &err {
            SqsError::QueueNotFound(_) => {
                "The specified queue does not exist for this wsdl version.".to_string()
            }
            SqsError::InvalidQueueName(name) => format!(
                "Value {} for parameter QueueName is invalid. Reason: Can only include \
                 alphanumeric characters, hyphens, or underscores. 1 to 80 in length.",
                name
            ),
            other => other.to_string(),
        };
        AwsError::new(code, message)
    }
}
