use thiserror::Error;

/// Error type for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SeaORM
    #[error("Database error: {0}")]
    SeaOrm(#[from] sea_orm::DbErr),
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),
    /// Query error
    #[error("Query error: {0}")]
    Query(String),
    /// Stored value cannot be mapped back onto a domain type
    #[error("Integrity error: {0}")]
    Integrity(String),
}
