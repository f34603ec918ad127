//! Repository Module
//!
//! Plain async functions over sqlx executors. Single-statement helpers are
//! generic over [`sqlx::Executor`] so they run against the pool or inside an
//! open transaction (`&mut *tx`). Multi-statement units are owned by the
//! orders/inventory services, never by the repositories.

pub mod inventory;
pub mod order;
pub mod payment;
pub mod product;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation, message names the constraint
    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl RepoError {
    /// Whether this is a unique violation on the given `table.column`
    pub fn is_duplicate_on(&self, column: &str) -> bool {
        matches!(self, RepoError::Duplicate(msg) if msg.contains(column))
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound("row not found".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate(db.message().to_string())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Render enum values as a SQL `IN` list body: `'A','B'`
///
/// Only ever fed with `as_str()` of closed enums, never user input.
pub(crate) fn sql_in_list<I>(values: I) -> String
where
    I: IntoIterator<Item = &'static str>,
{
    values
        .into_iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_in_list() {
        assert_eq!(sql_in_list(["PAID", "READY"]), "'PAID','READY'");
        assert_eq!(sql_in_list(Vec::<&'static str>::new()), "");
    }

    #[test]
    fn test_is_duplicate_on() {
        let err = RepoError::Duplicate("UNIQUE constraint failed: orders.order_number".into());
        assert!(err.is_duplicate_on("orders.order_number"));
        assert!(!err.is_duplicate_on("payments.order_id"));
        assert!(!RepoError::Database("x".into()).is_duplicate_on("orders.order_number"));
    }
}
