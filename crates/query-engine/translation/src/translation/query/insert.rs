//! Translate an insert of a single row.

use query_engine_models as models;
use query_engine_sql::sql;

use super::{filtering, root};
use crate::translation::error::Error;
use crate::translation::helpers::{Env, Scope};

/// Translate an insert. Each value is typed by the column it is written to.
pub fn translate_insert(env: &Env, insert: &models::Insert) -> Result<sql::ast::Insert, Error> {
    let info = env.lookup_collection(&insert.collection)?;
    if insert.values.is_empty() {
        return Err(Error::EmptyInsert(insert.collection.clone()));
    }

    // Values cannot refer to the row being inserted, only to bindings.
    let scope = Scope::new(vec![], &insert.bindings, None);

    let mut columns = Vec::with_capacity(insert.values.len());
    let mut values = Vec::with_capacity(insert.values.len());
    for (name, value) in &insert.values {
        let column = info.column(name).ok_or_else(|| Error::ColumnNotFound {
            column: name.clone(),
            collection: insert.collection.clone(),
        })?;
        let (value, _) = filtering::translate_expression(env, &scope, value, Some(column.r#type))?;
        columns.push(sql::ast::ColumnName(column.name.clone()));
        values.push(value);
    }

    Ok(sql::ast::Insert {
        table: root::table_name(info),
        columns,
        values,
    })
}
