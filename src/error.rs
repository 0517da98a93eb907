//! ==============================================================================
//! error.rs - error taxonomy for the relay and its clients
//! ==============================================================================
//!
//! purpose:
//!     - ValidationError: a submitted reading was rejected (400 / `error` event)
//!     - TransportError: a producer or viewer could not reach the relay
//!     - TrackerError: the mobile tracker could not obtain a position
//!
//!     none of these are fatal to the relay process.
//!
//! ==============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

/// why a candidate reading was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("reading must be a JSON object")]
    NotAnObject,
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("field `{field}` is not numeric")]
    NotNumeric { field: &'static str },
    #[error("field `{field}` is out of range")]
    OutOfRange { field: &'static str },
    #[error("field `node` must be a string")]
    InvalidNode,
    #[error("timestamp is neither an epoch number nor an RFC 3339 string")]
    InvalidTimestamp,
    #[error("unknown reading kind `{0}`")]
    UnknownKind(String),
}

impl ValidationError {
    /// machine-readable reason, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedJson(_) => "malformed_json",
            Self::NotAnObject => "not_an_object",
            Self::MissingField { .. } => "missing_field",
            Self::NotNumeric { .. } => "not_numeric",
            Self::OutOfRange { .. } => "out_of_range",
            Self::InvalidNode => "invalid_node",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::UnknownKind(_) => "unknown_kind",
        }
    }

    /// `{"error": ..., "code": ...}` body shared by http and the live channel
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string(), "code": self.code() })
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.to_json())).into_response()
    }
}

/// client-side failure talking to the relay
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to relay failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("relay answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("live feed failed: {0}")]
    Live(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("live feed closed by relay")]
    LiveClosed,
}

/// mobile tracker failures
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("geolocation unavailable: {0}")]
    Geolocation(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
