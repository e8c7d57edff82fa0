//! Error types for harvestgrid

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(DieselError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    pub fn transition(from: &str, to: &str) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<DieselError> for MarketError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => MarketError::NotFound("Record not found".into()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                MarketError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                MarketError::InvalidInput(format!("Referenced record does not exist ({})", info.message()))
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                MarketError::InvalidInput(info.message().to_string())
            }
            other => MarketError::Database(other),
        }
    }
}

impl From<diesel::r2d2::PoolError> for MarketError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        MarketError::Pool(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diesel_not_found_maps_to_not_found() {
        let err: MarketError = DieselError::NotFound.into();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[test]
    fn test_transition_message() {
        let err = MarketError::transition("cancelled", "active");
        assert_eq!(err.to_string(), "Invalid status transition: cancelled -> active");
    }
}
