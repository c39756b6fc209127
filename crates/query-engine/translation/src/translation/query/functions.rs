//! Translate generic function calls through the dialect's function table.

use query_engine_metadata::metadata::{FunctionTemplate, ReturnType, ScalarType, TemplatePart};
use query_engine_models as models;
use query_engine_sql::sql;

use super::filtering;
use crate::translation::error::Error;
use crate::translation::helpers::{Env, Scope};

/// Translate a call to a generic function.
pub fn translate_function(
    env: &Env,
    scope: &Scope,
    name: &str,
    arguments: &[models::Expression],
) -> Result<(sql::ast::Expression, Option<ScalarType>), Error> {
    let template = env.lookup_function(name)?;
    let arguments = arguments
        .iter()
        .map(|argument| filtering::translate_expression(env, scope, argument, None))
        .collect::<Result<Vec<_>, Error>>()?;
    apply_template(name, template, arguments)
}

/// Wrap an expression in a call to a single-argument function.
pub fn wrap(
    env: &Env,
    function: &str,
    expression: sql::ast::Expression,
) -> Result<sql::ast::Expression, Error> {
    let template = env.lookup_function(function)?;
    apply_template(function, template, vec![(expression, None)]).map(|(expression, _)| expression)
}

/// Substitute translated arguments into a template, checking their number.
pub fn apply_template(
    name: &str,
    template: &FunctionTemplate,
    arguments: Vec<(sql::ast::Expression, Option<ScalarType>)>,
) -> Result<(sql::ast::Expression, Option<ScalarType>), Error> {
    let invalid = |error| Error::InvalidTemplate {
        function: name.to_string(),
        error,
    };
    let arity = template.arity().map_err(invalid)?;
    if !arity.accepts(arguments.len()) {
        return Err(Error::ArgumentCount {
            function: name.to_string(),
            expected: arity,
            found: arguments.len(),
        });
    }

    let return_type = match template.returns {
        ReturnType::Fixed(scalar_type) => Some(scalar_type),
        ReturnType::Argument(index) => arguments
            .get(index - 1)
            .and_then(|(_, scalar_type)| *scalar_type),
        ReturnType::Unknown => None,
    };

    let arguments: Vec<sql::ast::Expression> = arguments
        .into_iter()
        .map(|(expression, _)| expression)
        .collect();
    let separator = template.separator.clone().unwrap_or_default();

    let mut pieces = vec![];
    for part in template.parts().map_err(invalid)? {
        match part {
            TemplatePart::Text(text) => pieces.push(sql::ast::TemplatePiece::Text(text)),
            TemplatePart::Argument(index) => {
                let argument = arguments.get(index).ok_or_else(|| Error::ArgumentCount {
                    function: name.to_string(),
                    expected: arity,
                    found: arguments.len(),
                })?;
                pieces.push(sql::ast::TemplatePiece::Argument(argument.clone()));
            }
            TemplatePart::Variadic => {
                for (index, argument) in arguments.iter().enumerate() {
                    if index > 0 {
                        pieces.push(sql::ast::TemplatePiece::Text(separator.clone()));
                    }
                    pieces.push(sql::ast::TemplatePiece::Argument(argument.clone()));
                }
            }
        }
    }

    Ok((sql::ast::Expression::Template(pieces), return_type))
}
