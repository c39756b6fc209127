//! A live in-memory SQLite database holding the fixture rows.

use query_engine_execution::driver::{Driver, SqliteDriver};
use query_engine_execution::metrics::Metrics;
use query_engine_sql::sql::execution_plan::CompiledStatement;

const FIXTURE_SQL: &str = include_str!("../../../../static/fixtures/fixture.sql");

/// Initialise test logging. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Open a fresh in-memory database and load the fixture into it.
pub async fn create_fixture_driver() -> anyhow::Result<SqliteDriver> {
    init_logging();
    let driver = SqliteDriver::connect("sqlite::memory:").await?;
    for statement in FIXTURE_SQL
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
    {
        driver
            .execute(&CompiledStatement {
                sql: statement.to_string(),
                params: vec![],
                columns: vec![],
            })
            .await?;
    }
    tracing::debug!("fixture database loaded");
    Ok(driver)
}

/// Metrics registered with a registry of their own.
pub fn fresh_metrics() -> anyhow::Result<Metrics> {
    let mut registry = prometheus::Registry::new();
    Ok(Metrics::initialize(&mut registry)?)
}
