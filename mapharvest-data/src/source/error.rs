//! Transport failures shared by every catalog request.

use serde_json::Value;
use thiserror::Error;

/// Errors raised while talking to a map service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },
    /// The request failed before a response arrived.
    #[error("network error for {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Error description.
        message: String,
    },
    /// The body could not be read or parsed as JSON.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Error description.
        message: String,
    },
    /// The service returned an ArcGIS `error` document.
    #[error("service error from {url}: {message}")]
    Service {
        /// Requested URL.
        url: String,
        /// ArcGIS error code, when present.
        code: Option<i64>,
        /// ArcGIS error message.
        message: String,
    },
}

impl TransportError {
    /// Build a [`TransportError::Service`] from the `error` member of a body.
    pub(crate) fn service(url: &str, error: &Value) -> Self {
        Self::Service {
            url: url.to_owned(),
            code: error.get("code").and_then(Value::as_i64),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), str::to_owned),
        }
    }

    /// URL of the failed request.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Http { url, .. }
            | Self::Timeout { url }
            | Self::Network { url, .. }
            | Self::Decode { url, .. }
            | Self::Service { url, .. } => url,
        }
    }
}
