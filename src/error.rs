//! Error types for the PTZ controller

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// A VISCA payload could not be turned into a packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid hex character {character:?} at position {index}")]
    InvalidHexCharacter { character: char, index: usize },

    #[error("payload has an odd number of hex digits")]
    OddLength,

    #[error("payload too long: {0} bytes does not fit the length field")]
    PayloadTooLong(usize),

    #[error("packet truncated: {0} bytes")]
    Truncated(usize),
}

impl From<hex::FromHexError> for EncodingError {
    fn from(err: hex::FromHexError) -> Self {
        match err {
            hex::FromHexError::InvalidHexCharacter { c, index } => {
                EncodingError::InvalidHexCharacter { character: c, index }
            }
            hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
                EncodingError::OddLength
            }
        }
    }
}

/// A command could not be delivered to the camera.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("could not resolve camera address {0}")]
    Resolve(String),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// A camera endpoint change was rejected or could not be saved.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid camera endpoint: {0}")]
    Invalid(String),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not write {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the HTTP control API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Camera unreachable: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::Config(ConfigError::Invalid(_)) => StatusCode::BAD_REQUEST,
            ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Transport(_) => StatusCode::BAD_GATEWAY,
        };

        tracing::warn!("⚠️ API error: {}", self);

        (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}
