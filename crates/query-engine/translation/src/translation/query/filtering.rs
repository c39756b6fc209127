//! Translate expressions, and the predicates built from them.

use query_engine_metadata::metadata::{ComparisonOperator, ScalarType};
use query_engine_models as models;
use query_engine_sql::sql;

use super::{functions, translate_nested_statement, values};
use crate::translation::error::Error;
use crate::translation::helpers::{Env, Scope};

/// Translate an expression, returning it with its type when that is known.
///
/// `expected` is the type of the expression on the other side of a comparison;
/// literals and bindings without a type of their own take it.
pub fn translate_expression(
    env: &Env,
    scope: &Scope,
    expression: &models::Expression,
    expected: Option<ScalarType>,
) -> Result<(sql::ast::Expression, Option<ScalarType>), Error> {
    match expression {
        models::Expression::Column { name, table } => scope.lookup_column(name, table.as_deref()),
        models::Expression::Literal { value } => values::translate_value(env, value, expected),
        models::Expression::Binding { name } => {
            let bound = scope.lookup_binding(name)?;
            values::translate_value(env, &bound.value, bound.scalar_type.or(expected))
        }
        models::Expression::BinaryComparison {
            left,
            operator,
            right,
        } => translate_comparison(env, scope, left, *operator, right),
        models::Expression::And { expressions } => {
            let mut result = sql::helpers::true_expr();
            for expression in expressions {
                let (predicate, _) = translate_expression(env, scope, expression, None)?;
                result = sql::helpers::and(result, predicate);
            }
            Ok((result, Some(ScalarType::Boolean)))
        }
        models::Expression::Or { expressions } => {
            let mut result = sql::helpers::false_expr();
            for expression in expressions {
                let (predicate, _) = translate_expression(env, scope, expression, None)?;
                result = sql::helpers::or(result, predicate);
            }
            Ok((result, Some(ScalarType::Boolean)))
        }
        models::Expression::Not { expression } => {
            let (predicate, _) = translate_expression(env, scope, expression, None)?;
            Ok((
                sql::ast::Expression::Not(Box::new(predicate)),
                Some(ScalarType::Boolean),
            ))
        }
        models::Expression::IsNull { expression } => {
            let (expression, _) = translate_expression(env, scope, expression, None)?;
            Ok((
                sql::ast::Expression::UnaryOperation {
                    expression: Box::new(expression),
                    operator: sql::ast::UnaryOperator::IsNull,
                },
                Some(ScalarType::Boolean),
            ))
        }
        models::Expression::In { expression, values } => {
            let (expression, scalar_type) = translate_expression(env, scope, expression, None)?;
            let values = values
                .iter()
                .map(|value| {
                    translate_expression(env, scope, value, scalar_type).map(|(value, _)| value)
                })
                .collect::<Result<Vec<_>, Error>>()?;
            Ok((
                in_list(env, expression, values),
                Some(ScalarType::Boolean),
            ))
        }
        models::Expression::InSubquery {
            expression,
            query,
            negated,
        } => {
            let (expression, _) = translate_expression(env, scope, expression, None)?;
            let (statement, _) = translate_single_column_statement(env, scope, query)?;
            let operator = if *negated {
                sql::ast::BinaryArrayOperator::NotIn
            } else {
                sql::ast::BinaryArrayOperator::In
            };
            Ok((
                sql::ast::Expression::SubqueryOperation {
                    left: Box::new(expression),
                    operator,
                    statement: Box::new(statement),
                },
                Some(ScalarType::Boolean),
            ))
        }
        models::Expression::Exists { query } => {
            let (statement, _) = translate_nested_statement(env, Some(scope), query)?;
            Ok((
                sql::ast::Expression::Exists {
                    statement: Box::new(statement),
                },
                Some(ScalarType::Boolean),
            ))
        }
        models::Expression::Function { name, arguments } => {
            functions::translate_function(env, scope, name, arguments)
        }
        models::Expression::Subquery { query } => {
            let (statement, scalar_type) = translate_single_column_statement(env, scope, query)?;
            Ok((
                sql::ast::Expression::CorrelatedSubSelect(Box::new(statement)),
                scalar_type,
            ))
        }
    }
}

/// Translate a predicate. A missing predicate is always true.
pub fn translate_predicate(
    env: &Env,
    scope: &Scope,
    predicate: Option<&models::Expression>,
) -> Result<sql::ast::Expression, Error> {
    match predicate {
        None => Ok(sql::helpers::true_expr()),
        Some(predicate) => translate_expression(env, scope, predicate, None).map(|(p, _)| p),
    }
}

/// Whether an expression is a value whose type depends on what it is compared with.
fn is_untyped_value(expression: &models::Expression) -> bool {
    matches!(
        expression,
        models::Expression::Literal { .. } | models::Expression::Binding { .. }
    )
}

fn translate_comparison(
    env: &Env,
    scope: &Scope,
    left: &models::Expression,
    operator: ComparisonOperator,
    right: &models::Expression,
) -> Result<(sql::ast::Expression, Option<ScalarType>), Error> {
    // Translate the typed side first, so that a value on the other side takes its type.
    let (left, right, scalar_type) = if is_untyped_value(left) && !is_untyped_value(right) {
        let (right, scalar_type) = translate_expression(env, scope, right, None)?;
        let (left, _) = translate_expression(env, scope, left, scalar_type)?;
        (left, right, scalar_type)
    } else {
        let (left, scalar_type) = translate_expression(env, scope, left, None)?;
        let (right, _) = translate_expression(env, scope, right, scalar_type)?;
        (left, right, scalar_type)
    };

    let (left, right) = match scalar_type {
        Some(scalar_type) => {
            if !scalar_type.comparison_operators().contains(&operator) {
                return Err(Error::UnsupportedOperator {
                    operator,
                    scalar_type,
                });
            }
            // Large objects can only be matched with LIKE where they cannot be compared.
            if scalar_type.is_large_object()
                && !env.capabilities().large_object_comparison
                && !matches!(
                    operator,
                    ComparisonOperator::Like | ComparisonOperator::NotLike
                )
            {
                (
                    functions::wrap(env, "to_string", left)?,
                    functions::wrap(env, "to_string", right)?,
                )
            } else {
                (left, right)
            }
        }
        None => (left, right),
    };

    Ok((
        sql::ast::Expression::BinaryOperation {
            left: Box::new(left),
            operator: sql::ast::BinaryOperator(operator_syntax(operator).to_string()),
            right: Box::new(right),
        },
        Some(ScalarType::Boolean),
    ))
}

fn operator_syntax(operator: ComparisonOperator) -> &'static str {
    match operator {
        ComparisonOperator::Equals => "=",
        ComparisonOperator::NotEquals => "<>",
        ComparisonOperator::LessThan => "<",
        ComparisonOperator::LessThanOrEqualTo => "<=",
        ComparisonOperator::GreaterThan => ">",
        ComparisonOperator::GreaterThanOrEqualTo => ">=",
        ComparisonOperator::Like => "LIKE",
        ComparisonOperator::NotLike => "NOT LIKE",
    }
}

/// `expression IN (values)`, split into several lists joined by OR when the dialect
/// limits the size of a list. An empty list matches nothing.
pub fn in_list(
    env: &Env,
    expression: sql::ast::Expression,
    values: Vec<sql::ast::Expression>,
) -> sql::ast::Expression {
    if values.is_empty() {
        return sql::helpers::false_expr();
    }
    let chunk_size = env
        .capabilities()
        .max_in_list_size
        .unwrap_or(values.len())
        .max(1);

    let mut result = sql::helpers::false_expr();
    for chunk in values.chunks(chunk_size) {
        result = sql::helpers::or(
            result,
            sql::ast::Expression::BinaryArrayOperation {
                left: Box::new(expression.clone()),
                operator: sql::ast::BinaryArrayOperator::In,
                right: chunk.to_vec(),
            },
        );
    }
    result
}

/// Translate a subquery that has to produce a single column.
fn translate_single_column_statement(
    env: &Env,
    scope: &Scope,
    statement: &models::Statement,
) -> Result<(sql::ast::Statement, Option<ScalarType>), Error> {
    let (statement, columns) = translate_nested_statement(env, Some(scope), statement)?;
    match columns.as_slice() {
        [column] => Ok((statement, column.scalar_type)),
        _ => Err(Error::ProjectionMismatch {
            branch: 0,
            expected: 1,
            found: columns.len(),
        }),
    }
}
