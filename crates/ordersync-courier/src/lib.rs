//! OrderSync Courier - Delivery partner HTTP API client
//!
//! Provides an async client for the courier merchant API:
//! - Listing the orders visible to a merchant credential
//! - Looking up one order by its scan code / QR id
//! - Listing merchant invoices and the orders each covers
//!
//! ## Modules
//!
//! - [`client`] - Low-level HTTP client and response envelopes
//! - [`provider`] - [`ICourierApi`](ordersync_core::ports::ICourierApi) implementation

pub mod client;
pub mod provider;

use ordersync_core::ports::RemoteError;
use thiserror::Error;

/// Errors that can occur when communicating with the courier API
#[derive(Debug, Error)]
pub enum CourierError {
    /// The courier rejected the credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Too many requests")]
    TooManyRequests,

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The envelope reported `status: false` for a reason not classified above
    #[error("Rejected by courier (errNum {err_num:?}): {msg}")]
    Rejected { err_num: Option<String>, msg: String },

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The configured base URL is not a valid URL
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

impl From<CourierError> for RemoteError {
    fn from(err: CourierError) -> Self {
        match err {
            CourierError::Unauthorized(_) => RemoteError::Unauthorized,
            CourierError::NotFound(_)
            | CourierError::TooManyRequests
            | CourierError::ServerError(_)
            | CourierError::Timeout
            | CourierError::NetworkError(_)
            | CourierError::InvalidBaseUrl(_) => RemoteError::Unavailable(err.to_string()),
            CourierError::Rejected { .. } | CourierError::InvalidResponse(_) => {
                RemoteError::Malformed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_classification() {
        assert_eq!(
            RemoteError::from(CourierError::Unauthorized("bad token".into())),
            RemoteError::Unauthorized
        );
        assert!(matches!(
            RemoteError::from(CourierError::Timeout),
            RemoteError::Unavailable(_)
        ));
        assert!(matches!(
            RemoteError::from(CourierError::ServerError("502".into())),
            RemoteError::Unavailable(_)
        ));
        assert!(matches!(
            RemoteError::from(CourierError::TooManyRequests),
            RemoteError::Unavailable(_)
        ));
        assert!(matches!(
            RemoteError::from(CourierError::InvalidResponse("eof".into())),
            RemoteError::Malformed(_)
        ));
        assert!(matches!(
            RemoteError::from(CourierError::Rejected {
                err_num: Some("99".into()),
                msg: "nope".into()
            }),
            RemoteError::Malformed(_)
        ));
    }
}
