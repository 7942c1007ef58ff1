//! Core types for sqsd
//!
//! This crate provides the error codes, request IDs and XML helpers shared by
//! the queue service and the server binary.

pub mod error;
pub mod request_id;
pub mod xml;

pub use error::{AwsError, ErrorCode};
pub use request_id::RequestId;
pub use xml::escape_xml;
