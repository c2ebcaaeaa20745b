//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Routing errors
//! never travel back to the peer that caused them: the registry logs them
//! where they happen and moves on. Only the HTTP surface (`/ws` upgrade)
//! turns an error into a response, using the structured JSON body below.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::ParticipantId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "participant registry is not running",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Relay error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status               |
/// |-----------|-------------------|---------------------------|
/// | 1000–1999 | Malformed input   | 400 Bad Request           |
/// | 2000–2999 | Routing           | 404 Not Found / 410 Gone  |
/// | 3000–3999 | Server            | 500 / 503                 |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A message could not be serialized for the wire.
    #[error("failed to encode message: {0}")]
    Encoding(#[source] serde_json::Error),

    /// An inbound frame is not a valid envelope.
    #[error("failed to decode message: {0}")]
    Decoding(#[source] serde_json::Error),

    /// The envelope carries a `typ` tag outside the known set.
    #[error("unknown message kind: {0}")]
    UnknownMessageKind(i64),

    /// A unicast target is not registered.
    #[error("unknown receiver: {0}")]
    UnknownReceiver(ParticipantId),

    /// A recipient's outbound queue is full or closed.
    #[error("unresponsive recipient: {0}")]
    UnresponsiveRecipient(ParticipantId),

    /// The registry task has stopped and accepts no more requests.
    #[error("participant registry is not running")]
    RegistryClosed,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Decoding(_) => 1001,
            Self::UnknownMessageKind(_) => 1002,
            Self::InvalidConfig(_) => 1003,
            Self::UnknownReceiver(_) => 2001,
            Self::UnresponsiveRecipient(_) => 2002,
            Self::Encoding(_) => 3000,
            Self::RegistryClosed => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Decoding(_) | Self::UnknownMessageKind(_) | Self::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UnknownReceiver(_) => StatusCode::NOT_FOUND,
            Self::UnresponsiveRecipient(_) => StatusCode::GONE,
            Self::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RegistryClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
