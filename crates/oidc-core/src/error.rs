//! Engine and protocol error types.
//!
//! Two kinds of failure exist here and they must not be conflated:
//!
//! - [`ProtocolError`] is *data*: an OAuth 2.0 / OpenID Connect error payload
//!   (`error`, `error_description`, `error_uri`) delivered to the client
//!   through the standard response channel (redirect parameters or a JSON
//!   body).
//! - [`EngineError`] is a Rust error for infrastructure faults (cache I/O,
//!   corrupt serialized state). It never carries request-specific detail to
//!   the client; callers translate it into a bare `server_error`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised by the engine's own machinery.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A correlation cache read or write failed.
    #[error("Cache error: {message}")]
    Cache {
        /// Description of the cache failure.
        message: String,
    },

    /// Serialized state could not be produced or parsed.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// The engine configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal fault.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl EngineError {
    /// Creates a new `Cache` error.
    #[must_use]
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// OAuth 2.0 / OpenID Connect error codes.
///
/// The vocabulary is fixed by RFC 6749 Section 5.2, OpenID Connect Core
/// Section 3.1.2.6 and the multiple-response-types addendum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is missing a required parameter, includes an invalid
    /// parameter value, or is otherwise malformed.
    InvalidRequest,

    /// Client authentication failed or the client is unknown.
    InvalidClient,

    /// The authorization grant or refresh token is invalid, expired or
    /// revoked.
    InvalidGrant,

    /// The requested scope is invalid, unknown, or malformed.
    InvalidScope,

    /// The client is not authorized to use this method.
    UnauthorizedClient,

    /// The resource owner or authorization server denied the request.
    AccessDenied,

    /// The server does not support obtaining a response using this method.
    UnsupportedResponseType,

    /// The authorization grant type is not supported by the server.
    UnsupportedGrantType,

    /// JWT-encoded request objects are not supported.
    RequestNotSupported,

    /// The `request_uri` parameter is not supported.
    RequestUriNotSupported,

    /// The server encountered an unexpected condition.
    ServerError,

    /// The server is temporarily unable to handle the request.
    TemporarilyUnavailable,
}

impl ErrorCode {
    /// Returns the wire representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidScope => "invalid_scope",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::RequestNotSupported => "request_not_supported",
            Self::RequestUriNotSupported => "request_uri_not_supported",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An OAuth 2.0 error payload delivered to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// OAuth 2.0 error code.
    pub error: ErrorCode,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// URI of a page with more information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl ProtocolError {
    /// Creates a new error with no description.
    #[must_use]
    pub fn new(error: ErrorCode) -> Self {
        Self {
            error,
            error_description: None,
            error_uri: None,
        }
    }

    /// Creates a new error with a description.
    #[must_use]
    pub fn with_description(error: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
            error_uri: None,
        }
    }

    /// Sets the error URI.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.error_uri = Some(uri.into());
        self
    }

    /// Creates an `invalid_request` error.
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::with_description(ErrorCode::InvalidRequest, description)
    }

    /// Creates an `invalid_grant` error.
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::with_description(ErrorCode::InvalidGrant, description)
    }

    /// Creates an `unsupported_response_type` error.
    #[must_use]
    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self::with_description(ErrorCode::UnsupportedResponseType, description)
    }

    /// Creates an `unsupported_grant_type` error.
    #[must_use]
    pub fn unsupported_grant_type(description: impl Into<String>) -> Self {
        Self::with_description(ErrorCode::UnsupportedGrantType, description)
    }

    /// Creates an `access_denied` error.
    #[must_use]
    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::with_description(ErrorCode::AccessDenied, description)
    }

    /// Creates a `request_not_supported` error.
    #[must_use]
    pub fn request_not_supported(description: impl Into<String>) -> Self {
        Self::with_description(ErrorCode::RequestNotSupported, description)
    }

    /// Creates a `request_uri_not_supported` error.
    #[must_use]
    pub fn request_uri_not_supported(description: impl Into<String>) -> Self {
        Self::with_description(ErrorCode::RequestUriNotSupported, description)
    }

    /// Creates a `server_error`.
    ///
    /// The description must stay generic; internal fault detail is logged,
    /// never sent to the client.
    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self::with_description(ErrorCode::ServerError, description)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::cache("backend unreachable");
        assert_eq!(err.to_string(), "Cache error: backend unreachable");

        let err = EngineError::serialization("truncated entry");
        assert_eq!(err.to_string(), "Serialization error: truncated entry");
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::InvalidRequest.as_str(), "invalid_request");
        assert_eq!(
            ErrorCode::UnsupportedResponseType.as_str(),
            "unsupported_response_type"
        );
        assert_eq!(
            ErrorCode::RequestNotSupported.as_str(),
            "request_not_supported"
        );
        assert_eq!(
            ErrorCode::RequestUriNotSupported.as_str(),
            "request_uri_not_supported"
        );
        assert_eq!(ErrorCode::ServerError.as_str(), "server_error");
    }

    #[test]
    fn test_error_code_serde() {
        let json = serde_json::to_string(&ErrorCode::UnsupportedGrantType).unwrap();
        assert_eq!(json, r#""unsupported_grant_type""#);

        let code: ErrorCode = serde_json::from_str(r#""invalid_grant""#).unwrap();
        assert_eq!(code, ErrorCode::InvalidGrant);
    }

    #[test]
    fn test_protocol_error_serialization() {
        let error = ProtocolError::invalid_request("client_id was missing");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains(r#""error":"invalid_request""#));
        assert!(json.contains(r#""error_description":"client_id was missing""#));
        assert!(!json.contains("error_uri"));
    }

    #[test]
    fn test_protocol_error_with_uri() {
        let error = ProtocolError::new(ErrorCode::AccessDenied)
            .with_uri("https://server.example.com/errors/denied");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains(r#""error_uri":"https://server.example.com/errors/denied""#));
        assert!(!json.contains("error_description"));
    }

    #[test]
    fn test_protocol_error_display() {
        let error = ProtocolError::invalid_grant("Expired token.");
        assert_eq!(error.to_string(), "invalid_grant: Expired token.");

        let error = ProtocolError::new(ErrorCode::ServerError);
        assert_eq!(error.to_string(), "server_error");
    }
}
