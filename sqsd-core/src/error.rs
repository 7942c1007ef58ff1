//! SQS error codes and wire formatting

use thiserror::Error;

use crate::request_id::RequestId;
use crate::xml::escape_xml;

/// Error codes returned by the SQS Query API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Request validation
    MissingParameter,
    InvalidParameterValue,
    InvalidAction,

    // Queue / message state
    NonExistentQueue,
    ReceiptHandleIsInvalid,
    InvalidMessageContents,
    OverLimit,

    // Batch requests
    EmptyBatchRequest,
    TooManyEntriesInBatchRequest,
    BatchEntryIdsNotDistinct,

    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::InvalidAction => "InvalidAction",
            Self::NonExistentQueue => "AWS.SimpleQueueService.NonExistentQueue",
            Self::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            Self::InvalidMessageContents => "InvalidMessageContents",
            Self::OverLimit => "OverLimit",
            Self::EmptyBatchRequest => "AWS.SimpleQueueService.EmptyBatchRequest",
            Self::TooManyEntriesInBatchRequest => {
                "AWS.SimpleQueueService.TooManyEntriesInBatchRequest"
            }
            Self::BatchEntryIdsNotDistinct => "AWS.SimpleQueueService.BatchEntryIdsNotDistinct",
            Self::InternalError => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingParameter
            | Self::InvalidParameterValue
            | Self::InvalidAction
            | Self::NonExistentQueue
            | Self::ReceiptHandleIsInvalid
            | Self::InvalidMessageContents
            | Self::EmptyBatchRequest
            | Self::TooManyEntriesInBatchRequest
            | Self::BatchEntryIdsNotDistinct => 400,
            Self::OverLimit => 403,
            Self::InternalError => 500,
        }
    }

    /// Fault side reported in the `<Type>` element
    pub fn fault(&self) -> &'static str {
        match self {
            Self::InternalError => "Receiver",
            _ => "Sender",
        }
    }
}

/// AWS-style error
#[derive(Debug, Error)]
#[error("{}: {}", .code.as_str(), .message)]
pub struct AwsError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
}

impl AwsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: RequestId::new().id,
        }
    }

    pub fn missing_parameter(name: &str) -> Self {
        Self::new(
            ErrorCode::MissingParameter,
            format!("The request must contain the parameter {}.", name),
        )
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Format as an SQS `ErrorResponse` document
    pub fn to_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ErrorResponse xmlns="http://queue.amazonaws.com/doc/2012-11-05/">
  <Error>
    <Type>{}</Type>
    <Code>{}</Code>
    <Message>{}</Message>
    <Detail/>
  </Error>
  <RequestId>{}</RequestId>
</ErrorResponse>"#,
            self.code.fault(),
            self.code.as_str(),
            escape_xml(&self.message),
            self.request_id
        )
    }
}
