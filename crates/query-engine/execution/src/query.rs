//! Execute statements against a driver.

use indexmap::IndexMap;
use query_engine_metadata::metadata::Capabilities;
use query_engine_models as models;
use query_engine_models::Value;
use query_engine_sql::sql::execution_plan::CompiledStatement;
use query_engine_translation::translation::helpers::Env;
use query_engine_translation::translation::{coercion, eager, query};
use tracing::{info_span, Instrument};

use crate::driver::Driver;
use crate::eager::{EagerLoadSettings, EagerLoader, Entity};
use crate::error::Error;
use crate::metrics;

/// A decoded row, keyed by output column.
pub type Row = IndexMap<String, Value>;

/// Compile a statement, run it, and load the associations it asks for.
pub async fn execute(
    driver: &dyn Driver,
    metrics: &metrics::Metrics,
    env: &Env<'_>,
    settings: &EagerLoadSettings,
    statement: &models::Statement,
) -> Result<Vec<Entity>, Error> {
    check_dialect(driver, env)?;
    let plan = eager::plan(env, statement)?;
    let mut loader = EagerLoader::new(driver, *env, settings, metrics);
    loader.load(&plan).await
}

/// Count the rows a statement returns.
pub async fn count(
    driver: &dyn Driver,
    metrics: &metrics::Metrics,
    env: &Env<'_>,
    statement: &models::Statement,
) -> Result<i64, Error> {
    check_dialect(driver, env)?;
    let compiled = query::compile_count(env, statement)?;
    let rows = fetch_rows(driver, metrics, env.capabilities(), &compiled, "", 0).await?;
    match rows.first().and_then(|row| row.get("count")) {
        Some(Value::Int(count)) => Ok(*count),
        _ => Ok(0),
    }
}

/// Insert a row, returning the number of rows written.
pub async fn insert(
    driver: &dyn Driver,
    metrics: &metrics::Metrics,
    env: &Env<'_>,
    insert: &models::Insert,
) -> Result<u64, Error> {
    check_dialect(driver, env)?;
    let compiled = query::compile_insert(env, insert)?;

    let timer = metrics.statement_duration.start_timer();
    let result = driver
        .execute(&compiled)
        .instrument(info_span!(
            "Execute insert",
            collection = %insert.collection,
            params = compiled.params.len()
        ))
        .await;
    timer.observe_duration();

    let written = result.map_err(|source| {
        tracing::error!(sql = %compiled.sql, collection = %insert.collection, error = %source, "insert failed");
        Error::Write {
            collection: insert.collection.clone(),
            source,
        }
    })?;
    metrics.statements_total.inc();
    Ok(written)
}

/// Run a compiled statement and decode its rows.
///
/// `path` and `depth` locate the statement in an eager load, for errors.
pub async fn fetch_rows(
    driver: &dyn Driver,
    metrics: &metrics::Metrics,
    capabilities: &Capabilities,
    statement: &CompiledStatement,
    path: &str,
    depth: usize,
) -> Result<Vec<Row>, Error> {
    let timer = metrics.statement_duration.start_timer();
    let result = driver
        .fetch_all(statement)
        .instrument(info_span!(
            "Execute statement",
            path = path,
            depth = depth,
            params = statement.params.len()
        ))
        .await;
    timer.observe_duration();

    let rows = result.map_err(|source| {
        tracing::error!(sql = %statement.sql, path, depth, error = %source, "statement failed");
        Error::Fetch {
            path: path.to_string(),
            depth,
            source,
        }
    })?;
    metrics.statements_total.inc();

    rows.into_iter()
        .map(|row| coercion::decode_row(capabilities, &statement.columns, row).map_err(Error::from))
        .collect()
}

fn check_dialect(driver: &dyn Driver, env: &Env) -> Result<(), Error> {
    if driver.dialect_name() == env.dialect.name {
        Ok(())
    } else {
        Err(Error::DialectMismatch {
            dialect: env.dialect.name,
            driver: driver.dialect_name(),
        })
    }
}
