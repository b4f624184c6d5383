//! Connector error types.

use thiserror::Error;

/// Errors raised while building test requests or reading test responses.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// The request URI could not be parsed.
    #[error("Invalid URI {uri}: {reason}")]
    InvalidUri {
        /// The URI as given.
        uri: String,
        /// Parser message.
        reason: String,
    },

    /// A request header could not be represented as a server variable.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The response body is not valid UTF-8.
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
