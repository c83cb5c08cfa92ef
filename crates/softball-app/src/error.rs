// Request-level error taxonomy.

use softball_core::boxscore::ValidationError;
use softball_core::db::UpsertError;
use softball_core::model::InputError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("missing or invalid token")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("admin auth not configured")]
    Unavailable,

    /// Store or serialization failure. The detail is logged, not returned.
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl RequestError {
    /// Stable machine-readable tag for the reply's `error.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Malformed(_) => "invalid_request",
            RequestError::Validation(_) | RequestError::Input(_) => "invalid",
            RequestError::NotFound(_) => "not_found",
            RequestError::Unauthorized => "unauthorized",
            RequestError::Forbidden => "forbidden",
            RequestError::Unavailable => "unavailable",
            RequestError::Internal(_) => "internal",
        }
    }
}

impl From<UpsertError> for RequestError {
    fn from(err: UpsertError) -> Self {
        match err {
            UpsertError::PlayerNotFound(_) => RequestError::NotFound("Player"),
            UpsertError::GameNotFound(_) => RequestError::NotFound("Game"),
            UpsertError::Store(e) => RequestError::Internal(e.into()),
        }
    }
}

impl From<anyhow::Error> for RequestError {
    fn from(err: anyhow::Error) -> Self {
        RequestError::Internal(err)
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        RequestError::Internal(err.into())
    }
}
