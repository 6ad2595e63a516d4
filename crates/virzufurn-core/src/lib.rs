//! Virzufurn Core - Domain models, configuration and datastores
//!
//! This crate defines the shared building blocks of the marketplace backend:
//! - User and product models
//! - Common error types
//! - Datastore traits for users and products
//! - In-memory and PostgreSQL store implementations
//! - Configuration management

pub mod config;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use config::{
    AppConfig, AssetConfig, AuthConfig, ConfigError, DatabaseConfig, Environment, LoggingConfig,
    ServerConfig,
};
pub use memory::InMemoryStore;
pub use models::{
    Category, NewProduct, NewUser, Product, ProductUpdate, User, UserPublic, UserRole,
};
pub use postgres::PgStore;
pub use store::{ProductStore, UserStore};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for marketplace operations
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MarketError>;

impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => MarketError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                MarketError::Conflict(db.message().to_string())
            }
            other => MarketError::DatabaseError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MarketError::Conflict("Username or email already exists".to_string());
        assert_eq!(err.to_string(), "Conflict: Username or email already exists");

        let err = MarketError::NotFound("User".to_string());
        assert!(err.to_string().contains("User"));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = MarketError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, MarketError::NotFound(_)));
    }
}
