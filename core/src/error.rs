//! Error types for the network-call layer.
//!
//! # Design
//! One enum covers every failure a submitted request can end in. Variants
//! without a structured server response (`NoConnection`, `Timeout`,
//! `Unknown`) carry no message so presenters can pick canned copy for them;
//! `Status` keeps the raw status, headers and body for debugging.

use std::path::PathBuf;

use thiserror::Error;

use crate::http::Headers;

/// Errors produced while building, submitting or decoding a request.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The response text was not valid JSON or did not match the model.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The response declared a charset this layer cannot decode.
    #[error("unsupported response charset: {0}")]
    Encoding(String),

    /// A request body could not be serialized.
    #[error("failed to serialize request body: {0}")]
    Serialization(String),

    /// The layer itself was configured incorrectly.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The host could not be reached.
    #[error("no connection")]
    NoConnection,

    /// The transport gave up waiting for a response.
    #[error("request timed out")]
    Timeout,

    /// Any other transport failure that came with a description.
    #[error("{0}")]
    Transport(String),

    /// A transport failure with nothing but a kind to report.
    #[error("{kind}")]
    Unknown { kind: String },

    /// The server answered with a status of 300 or above.
    #[error("server responded with status {status}")]
    Status {
        status: u16,
        headers: Headers,
        body: String,
    },

    /// A stub referenced a fixture file that does not exist. This is a
    /// configuration fault in the test setup, not a runtime condition.
    #[error("stub fixture not found: {}", .0.display())]
    FixtureNotFound(PathBuf),
}

impl ApiError {
    /// The explicit message attached to the error, if it has one.
    ///
    /// `Status` errors report their body through `classify` instead.
    pub fn message(&self) -> Option<String> {
        match self {
            ApiError::NoConnection
            | ApiError::Timeout
            | ApiError::Unknown { .. }
            | ApiError::Status { .. } => None,
            other => Some(other.to_string()),
        }
    }

    /// Status code of the server response behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_have_no_message() {
        assert!(ApiError::NoConnection.message().is_none());
        assert!(ApiError::Timeout.message().is_none());
        assert!(ApiError::Unknown { kind: "Cancelled".into() }.message().is_none());
    }

    #[test]
    fn decode_error_message_is_its_display() {
        let err = ApiError::Decode("expected value".into());
        assert_eq!(err.message().as_deref(), Some("failed to decode response: expected value"));
    }

    #[test]
    fn status_is_exposed_only_for_server_errors() {
        let err = ApiError::Status {
            status: 404,
            headers: Vec::new(),
            body: String::new(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(ApiError::Timeout.status(), None);
    }
}
