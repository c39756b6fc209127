//! A driver for SQLite, through sqlx.

use async_trait::async_trait;
use query_engine_metadata::metadata::DialectName;
use query_engine_sql::sql::execution_plan::CompiledStatement;
use query_engine_sql::sql::string::WireValue;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tracing::{info_span, Instrument};

use super::{Driver, DriverError};

#[derive(Debug, Clone)]
pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool with a single connection that is never recycled, so that an
    /// in-memory database lives as long as the driver.
    pub async fn connect(uri: &str) -> Result<Self, DriverError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(uri)
            .instrument(info_span!("Connect to SQLite"))
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect_name(&self) -> DialectName {
        DialectName::Sqlite
    }

    async fn fetch_all(
        &self,
        statement: &CompiledStatement,
    ) -> Result<Vec<Vec<WireValue>>, DriverError> {
        let rows = build_query_with_params(statement)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|index| decode_column(row, index))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(DriverError::from)
            })
            .collect()
    }

    async fn execute(&self, statement: &CompiledStatement) -> Result<u64, DriverError> {
        let result = build_query_with_params(statement)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Create a SQLx query based on our SQL query and bind our parameters to it.
fn build_query_with_params(
    statement: &CompiledStatement,
) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, param| match &param.value {
            WireValue::Null => query.bind(None::<String>),
            WireValue::Bool(value) => query.bind(*value),
            WireValue::Integer(value) => query.bind(*value),
            WireValue::Real(value) => query.bind(*value),
            WireValue::Text(value) => query.bind(value.as_str()),
            WireValue::Blob(value) => query.bind(value.as_slice()),
        })
}

/// Read a column by the storage class of its value.
fn decode_column(row: &SqliteRow, index: usize) -> Result<WireValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(WireValue::Null);
    }
    let storage_class = raw.type_info().name().to_string();
    match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => Ok(WireValue::Integer(row.try_get_unchecked(index)?)),
        "REAL" => Ok(WireValue::Real(row.try_get_unchecked(index)?)),
        "BLOB" => Ok(WireValue::Blob(row.try_get_unchecked(index)?)),
        _ => Ok(WireValue::Text(row.try_get_unchecked(index)?)),
    }
}
