use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SprintError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("broadcast error: {0}")]
    Broadcast(String),

    #[error("invalid access token: {0}")]
    TokenInvalid(String),

    #[error("access token expired")]
    TokenExpired,

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for SprintError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SprintError::NotFound(id),
            StoreError::Conflict(id) => SprintError::Conflict(id),
            StoreError::Backend(msg) => SprintError::Storage(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, SprintError>;
