//! Translate an order by clause.

use query_engine_metadata::metadata::ScalarType;
use query_engine_models as models;
use query_engine_sql::sql;

use super::{filtering, functions};
use crate::translation::error::Error;
use crate::translation::helpers::{Env, Scope};

/// Convert the order by fields of a query to the SQL ORDER BY clause.
pub fn translate_order_by(
    env: &Env,
    scope: &Scope,
    order_by: &[models::OrderByElement],
) -> Result<sql::ast::OrderBy, Error> {
    let elements = order_by
        .iter()
        .map(|element| {
            let (target, scalar_type) =
                filtering::translate_expression(env, scope, &element.expression, None)?;
            // Large objects are sorted by their text where they cannot be compared.
            let target = if scalar_type.is_some_and(ScalarType::is_large_object)
                && !env.capabilities().large_object_comparison
            {
                functions::wrap(env, "to_string", target)?
            } else {
                target
            };
            Ok(sql::ast::OrderByElement {
                target,
                direction: translate_direction(element.direction),
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(sql::ast::OrderBy { elements })
}

pub fn translate_direction(direction: models::OrderDirection) -> sql::ast::OrderByDirection {
    match direction {
        models::OrderDirection::Asc => sql::ast::OrderByDirection::Asc,
        models::OrderDirection::Desc => sql::ast::OrderByDirection::Desc,
    }
}
