//! The seam between compiled statements and a database.

pub mod sqlite;

use async_trait::async_trait;
use query_engine_metadata::metadata::DialectName;
use query_engine_sql::sql::execution_plan::CompiledStatement;
use query_engine_sql::sql::string::WireValue;
use thiserror::Error;

pub use sqlite::SqliteDriver;

/// Runs compiled statements against a database speaking one dialect.
///
/// Rows are returned as wire values in select-list order; decoding them to
/// logical values is left to the caller.
#[async_trait]
pub trait Driver: Send + Sync {
    fn dialect_name(&self) -> DialectName;

    /// Bind the parameters, execute, and fetch every row.
    async fn fetch_all(
        &self,
        statement: &CompiledStatement,
    ) -> Result<Vec<Vec<WireValue>>, DriverError>;

    /// Bind the parameters and execute, returning the number of rows affected.
    async fn execute(&self, statement: &CompiledStatement) -> Result<u64, DriverError>;
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Other(String),
}
