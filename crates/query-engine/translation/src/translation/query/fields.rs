//! Handle the translation of the select list.

use indexmap::IndexMap;
use query_engine_models as models;
use query_engine_sql::sql;
use query_engine_sql::sql::execution_plan::OutputColumn;

use super::filtering;
use crate::translation::error::Error;
use crate::translation::helpers::{Env, Scope, SourceInfo};

/// Translate the field selection of a query. Without fields, every column of the
/// source is selected.
pub fn translate_fields(
    env: &Env,
    scope: &Scope,
    fields: Option<&IndexMap<String, models::Field>>,
) -> Result<(Vec<(sql::ast::ColumnAlias, sql::ast::Expression)>, Vec<OutputColumn>), Error> {
    let translated = match fields {
        None => scope
            .sources
            .first()
            .map(SourceInfo::all_columns)
            .ok_or(Error::NoFields)?,
        Some(fields) if fields.is_empty() => return Err(Error::NoFields),
        Some(fields) => fields
            .iter()
            .map(|(alias, field)| {
                translate_field(env, scope, field)
                    .map(|(expression, scalar_type)| (alias.clone(), expression, scalar_type))
            })
            .collect::<Result<Vec<_>, Error>>()?,
    };

    Ok(translated
        .into_iter()
        .map(|(alias, expression, scalar_type)| {
            (
                (sql::helpers::make_column_alias(&alias), expression),
                OutputColumn {
                    name: alias,
                    scalar_type,
                },
            )
        })
        .unzip())
}

fn translate_field(
    env: &Env,
    scope: &Scope,
    field: &models::Field,
) -> Result<(sql::ast::Expression, Option<query_engine_metadata::metadata::ScalarType>), Error> {
    match field {
        models::Field::Column { column, table } => scope.lookup_column(column, table.as_deref()),
        models::Field::Expression {
            expression,
            scalar_type,
        } => {
            if !env.capabilities().select_list_subquery && contains_subquery(expression) {
                return Err(env.unsupported("subquery in a select list"));
            }
            let (expression, inferred) =
                filtering::translate_expression(env, scope, expression, None)?;
            Ok((expression, scalar_type.or(inferred)))
        }
    }
}

/// Whether an expression nests a query anywhere inside it.
fn contains_subquery(expression: &models::Expression) -> bool {
    match expression {
        models::Expression::Subquery { .. }
        | models::Expression::Exists { .. }
        | models::Expression::InSubquery { .. } => true,
        models::Expression::Column { .. }
        | models::Expression::Literal { .. }
        | models::Expression::Binding { .. } => false,
        models::Expression::BinaryComparison { left, right, .. } => {
            contains_subquery(left) || contains_subquery(right)
        }
        models::Expression::And { expressions } | models::Expression::Or { expressions } => {
            expressions.iter().any(contains_subquery)
        }
        models::Expression::Not { expression } | models::Expression::IsNull { expression } => {
            contains_subquery(expression)
        }
        models::Expression::In { expression, values } => {
            contains_subquery(expression) || values.iter().any(contains_subquery)
        }
        models::Expression::Function { arguments, .. } => arguments.iter().any(contains_subquery),
    }
}
