//! Translate a statement of the query model to SQL for a dialect.

pub mod fields;
pub mod filtering;
pub mod functions;
pub mod insert;
pub mod root;
pub mod set_operations;
pub mod sorting;
pub mod values;

use query_engine_metadata::metadata::ScalarType;
use query_engine_models as models;
use query_engine_sql::sql;
use query_engine_sql::sql::execution_plan::{CompiledStatement, OutputColumn};

use crate::translation::error::Error;
use crate::translation::helpers::{Env, Scope};

/// Compile a statement to SQL text and parameters.
///
/// Associations requested on the root query are not loaded here; see
/// [`crate::translation::eager`].
pub fn compile(env: &Env, statement: &models::Statement) -> Result<CompiledStatement, Error> {
    if let models::Statement::Insert(insert) = statement {
        return compile_insert(env, insert);
    }
    let (statement, columns) = translate_statement(env, None, statement)?;
    let compiled = CompiledStatement::new(&statement, env.capabilities(), columns);
    tracing::debug!(
        dialect = %env.dialect.name,
        sql = %compiled.sql,
        params = compiled.params.len(),
        "compiled statement"
    );
    Ok(compiled)
}

/// Compile an insert of a single row.
pub fn compile_insert(env: &Env, insert: &models::Insert) -> Result<CompiledStatement, Error> {
    let insert = insert::translate_insert(env, insert)?;
    let compiled = CompiledStatement::insert(&insert, env.capabilities());
    tracing::debug!(
        dialect = %env.dialect.name,
        sql = %compiled.sql,
        params = compiled.params.len(),
        "compiled insert"
    );
    Ok(compiled)
}

/// Compile a statement counting the rows another statement returns.
pub fn compile_count(
    env: &Env,
    statement: &models::Statement,
) -> Result<CompiledStatement, Error> {
    let (statement, _) = translate_statement(env, None, statement)?;
    let count = sql::ast::Statement::Select(Box::new(sql::helpers::count_select(statement)));
    let compiled = CompiledStatement::new(
        &count,
        env.capabilities(),
        vec![OutputColumn {
            name: "count".to_string(),
            scalar_type: Some(ScalarType::Integer),
        }],
    );
    tracing::debug!(
        dialect = %env.dialect.name,
        sql = %compiled.sql,
        "compiled count"
    );
    Ok(compiled)
}

/// Translate a statement, returning it with the columns it produces.
///
/// `parent` is the scope of the enclosing query, when the statement is nested.
pub fn translate_statement(
    env: &Env,
    parent: Option<&Scope>,
    statement: &models::Statement,
) -> Result<(sql::ast::Statement, Vec<OutputColumn>), Error> {
    match statement {
        models::Statement::Query(query) => {
            let (select, columns) = root::translate_query(env, parent, query)?;
            Ok((sql::ast::Statement::Select(Box::new(select)), columns))
        }
        models::Statement::Union(union) => set_operations::translate_union(env, parent, union),
        models::Statement::Insert(_) => Err(env.unsupported("an insert in place of a query")),
    }
}

/// Translate a statement nested in another one: a derived source, a subquery,
/// or the query of an IN or EXISTS predicate.
pub(crate) fn translate_nested_statement(
    env: &Env,
    parent: Option<&Scope>,
    statement: &models::Statement,
) -> Result<(sql::ast::Statement, Vec<OutputColumn>), Error> {
    if let models::Statement::Query(query) = statement {
        if !query.contain.is_empty() {
            return Err(env.unsupported("eager loading inside a nested query"));
        }
    }
    translate_statement(env, parent, statement)
}
