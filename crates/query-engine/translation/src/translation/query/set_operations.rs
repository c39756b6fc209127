//! Compile UNION and UNION ALL over several queries.
//!
//! Each branch is compiled on its own. Branches that order or limit their rows are
//! wrapped in a derived table where the dialect does not accept those clauses
//! inside a branch, and ordering of the combined rows is applied to a derived table
//! where it cannot be applied to the set operation itself.

use std::collections::BTreeMap;

use query_engine_metadata::metadata::ScalarType;
use query_engine_models as models;
use query_engine_sql::sql;
use query_engine_sql::sql::execution_plan::OutputColumn;

use super::{functions, root, sorting};
use crate::translation::error::Error;
use crate::translation::helpers::{Env, Scope, SourceInfo};

/// Translate a set operation, returning it with the columns it produces. Column
/// names come from the first branch.
pub fn translate_union(
    env: &Env,
    parent: Option<&Scope>,
    union: &models::Union,
) -> Result<(sql::ast::Statement, Vec<OutputColumn>), Error> {
    if union.queries.len() < 2 {
        return Err(Error::NotEnoughBranches(union.queries.len()));
    }

    let capabilities = env.capabilities();
    let mut branches = Vec::with_capacity(union.queries.len());
    let mut columns: Option<Vec<OutputColumn>> = None;

    for (index, query) in union.queries.iter().enumerate() {
        if !query.contain.is_empty() {
            return Err(env.unsupported("eager loading inside a set operation"));
        }

        let (mut select, mut branch_columns) = root::translate_query(env, parent, query)?;

        if let Some(expected) = &columns {
            if expected.len() != branch_columns.len() {
                return Err(Error::ProjectionMismatch {
                    branch: index,
                    expected: expected.len(),
                    found: branch_columns.len(),
                });
            }
        }

        if union.operator == models::SetOperator::Union && !capabilities.large_object_comparison {
            compare_large_objects_as_text(env, &mut select, &mut branch_columns)?;
        }

        let ordered_or_limited = !select.order_by.elements.is_empty()
            || select.limit != sql::helpers::empty_limit();
        let select = if ordered_or_limited && !capabilities.order_by_in_set_operation_branch {
            sql::helpers::star_select(sql::ast::From::Select {
                select: Box::new(select),
                alias: sql::helpers::make_table_alias(&format!("branch_{index}")),
            })
        } else {
            select
        };
        branches.push(select);

        columns = Some(match columns {
            None => branch_columns,
            Some(expected) => merge_types(expected, branch_columns),
        });
    }
    let columns = columns.unwrap_or_default();

    let mut set_operation = sql::ast::SetOperation {
        operator: match union.operator {
            models::SetOperator::Union => sql::ast::SetOperator::Union,
            models::SetOperator::UnionAll => sql::ast::SetOperator::UnionAll,
        },
        branches,
        order_by: sql::helpers::empty_order_by(),
        limit: sql::helpers::empty_limit(),
    };
    let limit = sql::ast::Limit {
        limit: union.limit,
        offset: union.offset,
    };

    if union.order_by.is_empty() && limit == sql::helpers::empty_limit() {
        return Ok((
            sql::ast::Statement::SetOperation(Box::new(set_operation)),
            columns,
        ));
    }

    if capabilities.set_operation_order_by {
        if let Some(order_by) = order_by_output_columns(env, &union.order_by, &columns) {
            set_operation.order_by = order_by;
            set_operation.limit = limit;
            return Ok((
                sql::ast::Statement::SetOperation(Box::new(set_operation)),
                columns,
            ));
        }
    }

    // Order and limit the combined rows from outside.
    let alias = sql::helpers::make_table_alias("union_result");
    let bindings = BTreeMap::new();
    let scope = Scope::new(
        vec![SourceInfo::Derived {
            alias: alias.clone(),
            columns: columns.clone(),
        }],
        &bindings,
        parent,
    );
    let order_by = sorting::translate_order_by(env, &scope, &union.order_by)?;

    let mut select = sql::helpers::star_select(sql::ast::From::SetOperation {
        set_operation: Box::new(set_operation),
        alias,
    });
    select.order_by = order_by;
    select.limit = limit;

    Ok((sql::ast::Statement::Select(Box::new(select)), columns))
}

/// Distinct set operations compare every column. Large objects are converted to
/// text where the dialect cannot compare them.
fn compare_large_objects_as_text(
    env: &Env,
    select: &mut sql::ast::Select,
    columns: &mut [OutputColumn],
) -> Result<(), Error> {
    let sql::ast::SelectList::SelectList(select_list) = &mut select.select_list else {
        return Ok(());
    };
    for ((_, expression), column) in select_list.iter_mut().zip(columns.iter_mut()) {
        if column.scalar_type.is_some_and(ScalarType::is_large_object) {
            let text = functions::wrap(env, "to_string", expression.clone())?;
            *expression = text;
            column.scalar_type = Some(ScalarType::String);
        }
    }
    Ok(())
}

/// Fill in the types the first branch leaves unknown.
fn merge_types(expected: Vec<OutputColumn>, branch: Vec<OutputColumn>) -> Vec<OutputColumn> {
    expected
        .into_iter()
        .zip(branch)
        .map(|(column, other)| OutputColumn {
            scalar_type: column.scalar_type.or(other.scalar_type),
            name: column.name,
        })
        .collect()
}

/// Order by output columns directly, when every element is a plain output column
/// that can be compared.
fn order_by_output_columns(
    env: &Env,
    order_by: &[models::OrderByElement],
    columns: &[OutputColumn],
) -> Option<sql::ast::OrderBy> {
    let elements = order_by
        .iter()
        .map(|element| {
            let models::Expression::Column { name, table: None } = &element.expression else {
                return None;
            };
            let column = columns.iter().find(|column| &column.name == name)?;
            if column.scalar_type.is_some_and(ScalarType::is_large_object)
                && !env.capabilities().large_object_comparison
            {
                return None;
            }
            Some(sql::ast::OrderByElement {
                target: sql::ast::Expression::ColumnReference(
                    sql::ast::ColumnReference::OutputColumn(sql::helpers::make_column_alias(name)),
                ),
                direction: sorting::translate_direction(element.direction),
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(sql::ast::OrderBy { elements })
}
