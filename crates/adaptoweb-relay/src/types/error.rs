//! Error types and JSON-RPC error codes for the relay.

use super::message::{JsonRpcError, RequestId};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Relay-specific error codes.
pub mod relay_error_codes {
    pub const PAGE_NOT_FOUND: i32 = -32850;
    pub const ELEMENT_NOT_FOUND: i32 = -32851;
    pub const ADAPT_ERROR: i32 = -32852;
    pub const STORE_ERROR: i32 = -32853;
}

/// All errors that can occur in the relay.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("Adaptation error: {0}")]
    Adapt(#[from] adaptoweb::AdaptError),

    #[error("Settings store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        use relay_error_codes::*;
        match self {
            RelayError::ParseError(_) => PARSE_ERROR,
            RelayError::InvalidRequest(_) => INVALID_REQUEST,
            RelayError::MethodNotFound(_) => METHOD_NOT_FOUND,
            RelayError::InvalidParams(_) => INVALID_PARAMS,
            RelayError::InternalError(_) | RelayError::Io(_) => INTERNAL_ERROR,
            RelayError::PageNotFound(_) => PAGE_NOT_FOUND,
            RelayError::ElementNotFound(_) => ELEMENT_NOT_FOUND,
            RelayError::Adapt(adaptoweb::AdaptError::InvalidSelector(_)) => INVALID_PARAMS,
            RelayError::Adapt(_) => ADAPT_ERROR,
            RelayError::Store(_) => STORE_ERROR,
            RelayError::Json(_) => PARSE_ERROR,
        }
    }

    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        JsonRpcError::new(id, self.code(), self.to_string())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
