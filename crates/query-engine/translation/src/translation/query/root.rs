//! Handle the translation of a single query.

use query_engine_metadata::metadata;
use query_engine_models as models;
use query_engine_sql::sql;
use query_engine_sql::sql::execution_plan::OutputColumn;

use super::{fields, filtering, sorting, translate_nested_statement};
use crate::translation::error::Error;
use crate::translation::helpers::{Env, Scope, SourceInfo};

/// Translate a query to a SELECT, returning the columns it produces.
pub fn translate_query(
    env: &Env,
    parent: Option<&Scope>,
    query: &models::Query,
) -> Result<(sql::ast::Select, Vec<OutputColumn>), Error> {
    let (from, sources) = match &query.source {
        None => (None, vec![]),
        Some(models::Source::Collection { name, alias }) => {
            let info = env.lookup_collection(name)?;
            let alias = sql::helpers::make_table_alias(alias.as_deref().unwrap_or(name));
            let from = sql::ast::From::Table {
                name: table_name(info),
                alias: alias.clone(),
            };
            (
                Some(from),
                vec![SourceInfo::Table {
                    alias,
                    collection: name.clone(),
                    info,
                }],
            )
        }
        Some(models::Source::Derived { statement, alias }) => {
            // A derived table cannot see the query selecting from it, only its bindings.
            let derived_scope = Scope::new(vec![], &query.bindings, parent);
            let (statement, columns) =
                translate_nested_statement(env, Some(&derived_scope), statement)?;
            let alias = sql::helpers::make_table_alias(alias);
            (
                Some(sql::helpers::derived_from(statement, alias.clone())),
                vec![SourceInfo::Derived { alias, columns }],
            )
        }
    };

    let scope = Scope::new(sources, &query.bindings, parent);

    let (select_list, columns) = fields::translate_fields(env, &scope, query.fields.as_ref())?;

    let predicate = filtering::translate_predicate(env, &scope, query.predicate.as_ref())?;

    let group_by = query
        .group_by
        .iter()
        .map(|expression| {
            filtering::translate_expression(env, &scope, expression, None)
                .map(|(expression, _)| expression)
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let order_by = sorting::translate_order_by(env, &scope, &query.order_by)?;

    let select = sql::ast::Select {
        select_list: sql::ast::SelectList::SelectList(select_list),
        from,
        joins: vec![],
        where_: sql::ast::Where(predicate),
        group_by: sql::ast::GroupBy { elements: group_by },
        order_by,
        limit: sql::ast::Limit {
            limit: query.limit,
            offset: query.offset,
        },
    };

    Ok((select, columns))
}

/// The database name of a collection.
pub fn table_name(info: &metadata::TableInfo) -> sql::ast::TableName {
    sql::ast::TableName {
        schema: info.schema_name.clone(),
        table: info.table_name.clone(),
    }
}
