//! Handle the translation of literal values.

use query_engine_metadata::metadata::ScalarType;
use query_engine_models::Value;
use query_engine_sql::sql;

use super::functions;
use crate::translation::coercion;
use crate::translation::error::Error;
use crate::translation::helpers::Env;

/// Translate a value to a bound parameter of the given type. Without a type, the
/// type follows the kind of the value.
///
/// Dates and datetimes are passed through the dialect's parameter conversion
/// function, when it has one.
pub fn translate_value(
    env: &Env,
    value: &Value,
    scalar_type: Option<ScalarType>,
) -> Result<(sql::ast::Expression, Option<ScalarType>), Error> {
    let Some(scalar_type) = scalar_type.or_else(|| type_of_value(value)) else {
        return Ok((sql::ast::Expression::Value(sql::ast::Value::Null), None));
    };

    let wire = coercion::encode(env.capabilities(), scalar_type, value)?;
    let parameter = sql::helpers::parameter(wire, Some(scalar_type));

    let conversion = match scalar_type {
        ScalarType::DateTime => Some("timestamp_param"),
        ScalarType::Date => Some("date_param"),
        _ => None,
    };
    let expression = match conversion {
        Some(function) if !value.is_null() && env.dialect.functions.get(function).is_some() => {
            functions::wrap(env, function, parameter)?
        }
        _ => parameter,
    };
    Ok((expression, Some(scalar_type)))
}

/// The type a value has on its own.
pub fn type_of_value(value: &Value) -> Option<ScalarType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(ScalarType::Boolean),
        Value::Int(_) => Some(ScalarType::Integer),
        Value::Float(_) => Some(ScalarType::Float),
        Value::String(_) => Some(ScalarType::String),
        Value::Date(_) => Some(ScalarType::Date),
        Value::DateTime(_) => Some(ScalarType::DateTime),
        Value::Binary(_) => Some(ScalarType::Binary),
    }
}
