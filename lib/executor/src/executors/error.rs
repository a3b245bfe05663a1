use std::time::Duration;

use crate::response::graphql_error::{OPERATION_CANCELLED, SUBGRAPH_REQUEST_FAILURE};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("No transport is registered for subgraph \"{0}\"")]
    MissingTransport(String),
    #[error("Failed to parse endpoint \"{0}\" as URI: {1}")]
    EndpointParseFailure(String, String),
    #[error("Failed to build request to subgraph \"{0}\": {1}")]
    RequestBuildFailure(String, String),
    #[error("Failed to send request to subgraph \"{0}\": {1}")]
    RequestFailure(String, String),
    #[error("Subgraph \"{0}\" responded with HTTP status {1}")]
    UnexpectedStatus(String, u16),
    #[error("Subgraph \"{0}\" returned an invalid GraphQL response: {1}")]
    InvalidResponse(String, String),
    #[error("Request to subgraph \"{0}\" timed out after {1:?}")]
    RequestTimeout(String, Duration),
    #[error("Operation was cancelled")]
    Cancelled,
}

impl TransportError {
    /// Error code reported in `extensions.code` for fields the failed fetch owned.
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Cancelled => OPERATION_CANCELLED,
            _ => SUBGRAPH_REQUEST_FAILURE,
        }
    }
}
