use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;

use crate::node::NodeId;

/// Errors returned by the nested-set APIs.
#[derive(Debug, Error)]
pub enum NestedSetError {
    #[error("nested-set currently supports PostgreSQL connections only")]
    UnsupportedBackend,

    #[error("node {0} does not exist or has been deleted")]
    NotFound(NodeId),

    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("nested-set invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, NestedSetError>;

impl NestedSetError {
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::Invariant(detail.into())
    }

    pub fn invalid_move(detail: impl Into<String>) -> Self {
        Self::InvalidMove(detail.into())
    }

    pub fn invalid_operation(detail: impl Into<String>) -> Self {
        Self::InvalidOperation(detail.into())
    }

    /// True for failures raised by the underlying store rather than by the engine.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Sqlx(_))
    }

    /// True when the failure is a transient conflict (serialization failure or
    /// deadlock) that the caller may retry. The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        let sqlx_err = match self {
            Self::Sqlx(err) => Some(err),
            Self::Database(DbErr::Exec(RuntimeErr::SqlxError(err)))
            | Self::Database(DbErr::Query(RuntimeErr::SqlxError(err)))
            | Self::Database(DbErr::Conn(RuntimeErr::SqlxError(err))) => Some(err),
            _ => None,
        };

        match sqlx_err {
            Some(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}
