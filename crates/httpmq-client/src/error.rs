//! Error types for httpmq client operations

use serde::Deserialize;
use thiserror::Error;

/// Result type alias for httpmq client operations
pub type Result<T> = std::result::Result<T, HttpmqError>;

/// Errors that can occur during httpmq client operations
#[derive(Error, Debug)]
pub enum HttpmqError {
    /// Could not establish the request (DNS, TCP, TLS, connect timeout)
    #[error("Request '{request_id}' failed to connect: {message}")]
    Connect { request_id: String, message: String },

    /// Unexpected response status, broken stream, or malformed frame
    #[error("Request '{request_id}' protocol error{}: {detail}", fmt_status(.status))]
    Protocol {
        request_id: String,
        status: Option<u16>,
        detail: String,
    },

    /// Server reported an application-level failure
    #[error(transparent)]
    Api(#[from] ApiError),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid header name or value
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpmqError {
    /// Create a protocol error without an HTTP status
    pub fn protocol(request_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Protocol {
            request_id: request_id.into(),
            status: None,
            detail: detail.into(),
        }
    }

    /// Correlation ID of the request that failed, if the error is request scoped
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Connect { request_id, .. } | Self::Protocol { request_id, .. } => {
                Some(request_id)
            }
            Self::Api(err) => Some(&err.request_id),
            _ => None,
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Failure reported by httpmq for a request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Request '{request_id}' failed with ({status_code}){}",
    fmt_reason(.message, .detail)
)]
pub struct ApiError {
    /// Request ID to match against server logs
    pub request_id: String,
    /// Status code reported by the server
    pub status_code: u16,
    pub message: Option<String>,
    /// Additional details
    pub detail: Option<String>,
}

fn fmt_reason(message: &Option<String>, detail: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(message) = message {
        out.push_str(&format!(" because of [{}]", message));
    }
    if let Some(detail) = detail {
        out.push_str(&format!(": {}", detail));
    }
    out
}

impl ApiError {
    pub fn new(request_id: impl Into<String>, status_code: u16) -> Self {
        Self {
            request_id: request_id.into(),
            status_code,
            message: None,
            detail: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Error section of the standard response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub code: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Standard response envelope returned by all non-streaming endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub request_id: String,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

impl ResponseEnvelope {
    /// Convert into the request ID on success, or the reported [`ApiError`].
    ///
    /// `http_status` is used as the status code when the server reports
    /// failure without an `error` section.
    pub fn into_result(self, http_status: u16) -> std::result::Result<String, ApiError> {
        if self.success {
            return Ok(self.request_id);
        }
        Err(self.into_api_error(http_status))
    }

    pub(crate) fn into_api_error(self, http_status: u16) -> ApiError {
        match self.error {
            Some(err) => ApiError {
                request_id: self.request_id,
                status_code: err.code,
                message: err.message,
                detail: err.detail,
            },
            None => ApiError::new(self.request_id, http_status)
                .with_message("server reported failure without error details"),
        }
    }
}
