use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("duplicate path: '{value}' collides with an existing path")]
    DuplicatePath { value: String },
    #[error("version conflict: {message}")]
    VersionConflict { message: String },
    #[error("no change in requested move: '{value}' is already the primary path")]
    NoChangeInRequestedMove { value: String },
    #[error("invalid path: {message}")]
    InvalidPath { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("too many retries: {message}")]
    TooManyRetries { message: String },
    #[error("cancelled: {message}")]
    Cancelled { message: String },
}

impl StoreError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn duplicate_path(value: impl Into<String>) -> Self {
        Self::DuplicatePath {
            value: value.into(),
        }
    }

    pub fn version_conflict(message: impl Into<String>) -> Self {
        Self::VersionConflict {
            message: message.into(),
        }
    }

    pub fn no_change(value: impl Into<String>) -> Self {
        Self::NoChangeInRequestedMove {
            value: value.into(),
        }
    }

    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn too_many_retries(message: impl Into<String>) -> Self {
        Self::TooManyRetries {
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_duplicate_path(&self) -> bool {
        matches!(self, Self::DuplicatePath { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Prefixes the message with the failing operation. Path-valued variants
    /// keep their value untouched so callers can still report it verbatim.
    pub fn context(self, op: impl fmt::Display) -> Self {
        match self {
            Self::Storage { message } => Self::Storage {
                message: format!("{op}: {message}"),
            },
            Self::NotFound { message } => Self::NotFound {
                message: format!("{op}: {message}"),
            },
            Self::VersionConflict { message } => Self::VersionConflict {
                message: format!("{op}: {message}"),
            },
            Self::InvalidPath { message } => Self::InvalidPath {
                message: format!("{op}: {message}"),
            },
            Self::Conflict { message } => Self::Conflict {
                message: format!("{op}: {message}"),
            },
            Self::Validation { message } => Self::Validation {
                message: format!("{op}: {message}"),
            },
            Self::TooManyRetries { message } => Self::TooManyRetries {
                message: format!("{op}: {message}"),
            },
            Self::Cancelled { message } => Self::Cancelled {
                message: format!("{op}: {message}"),
            },
            other @ (Self::DuplicatePath { .. } | Self::NoChangeInRequestedMove { .. }) => other,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sea_orm::DbErr> for StoreError {
    fn from(value: sea_orm::DbErr) -> Self {
        match value {
            sea_orm::DbErr::RecordNotFound(message) => StoreError::not_found(message),
            other => StoreError::storage(other.to_string()),
        }
    }
}
