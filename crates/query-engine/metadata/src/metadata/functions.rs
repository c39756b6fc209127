//! Function templates, mapping a generic function name onto the syntax of a dialect.
//!
//! A template is plain SQL text with placeholders for the arguments:
//! `$1`, `$2`, ... stand for positional arguments and `$*` stands for every argument,
//! joined with the template's separator. A template uses either positional or
//! variadic placeholders, never both.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::database::ScalarType;
use super::dialect::DialectName;

/// The logical type of a function's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ReturnType {
    /// Always the given type.
    Fixed(ScalarType),
    /// The type of the argument at this (1-based) position.
    Argument(usize),
    /// Not known. The result is decoded from whatever the database returns.
    Unknown,
}

/// A dialect-specific spelling of a generic function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunctionTemplate {
    pub template: String,
    pub returns: ReturnType,
    /// Placed between arguments substituted for `$*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

/// A parsed piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Text(String),
    /// 0-based argument index.
    Argument(usize),
    Variadic,
}

/// How many arguments a template accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(expected) => count == expected,
            Arity::AtLeast(minimum) => count >= minimum,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Arity::Exactly(expected) => write!(f, "exactly {expected}"),
            Arity::AtLeast(minimum) => write!(f, "at least {minimum}"),
        }
    }
}

/// A template that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("invalid placeholder at byte {position} of template '{template}'")]
    InvalidPlaceholder { template: String, position: usize },
    #[error("template '{0}' mixes positional and variadic arguments")]
    MixedArguments(String),
    #[error("variadic template '{0}' has no separator")]
    MissingSeparator(String),
    #[error("template '{template}' returns the type of argument {index}, which it does not take")]
    InvalidReturnArgument { template: String, index: usize },
}

impl FunctionTemplate {
    pub fn new(template: &str, returns: ReturnType) -> FunctionTemplate {
        FunctionTemplate {
            template: template.to_string(),
            returns,
            separator: None,
        }
    }

    pub fn variadic(template: &str, separator: &str, returns: ReturnType) -> FunctionTemplate {
        FunctionTemplate {
            template: template.to_string(),
            returns,
            separator: Some(separator.to_string()),
        }
    }

    /// Split the template into literal text and argument placeholders.
    pub fn parts(&self) -> Result<Vec<TemplatePart>, TemplateError> {
        let mut parts = vec![];
        let mut text = String::new();
        let mut chars = self.template.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            if c != '$' {
                text.push(c);
                continue;
            }
            let invalid = || TemplateError::InvalidPlaceholder {
                template: self.template.clone(),
                position,
            };
            let part = match chars.peek() {
                Some((_, '*')) => {
                    chars.next();
                    TemplatePart::Variadic
                }
                Some((_, d)) if d.is_ascii_digit() => {
                    let mut index = 0usize;
                    while let Some((_, d)) = chars.peek() {
                        let Some(digit) = d.to_digit(10) else { break };
                        index = index
                            .checked_mul(10)
                            .and_then(|i| i.checked_add(digit as usize))
                            .ok_or_else(invalid)?;
                        chars.next();
                    }
                    if index == 0 {
                        return Err(invalid());
                    }
                    TemplatePart::Argument(index - 1)
                }
                _ => return Err(invalid()),
            };
            if !text.is_empty() {
                parts.push(TemplatePart::Text(std::mem::take(&mut text)));
            }
            parts.push(part);
        }
        if !text.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Ok(parts)
    }

    /// The number of arguments this template takes, after checking that it is well formed.
    pub fn arity(&self) -> Result<Arity, TemplateError> {
        let parts = self.parts()?;
        let variadic = parts.iter().any(|p| *p == TemplatePart::Variadic);
        let positional = parts
            .iter()
            .filter_map(|p| match p {
                TemplatePart::Argument(index) => Some(index + 1),
                _ => None,
            })
            .max();

        let arity = match (variadic, positional) {
            (true, Some(_)) => return Err(TemplateError::MixedArguments(self.template.clone())),
            (true, None) => {
                if self.separator.is_none() {
                    return Err(TemplateError::MissingSeparator(self.template.clone()));
                }
                Arity::AtLeast(1)
            }
            (false, count) => Arity::Exactly(count.unwrap_or(0)),
        };

        if let ReturnType::Argument(index) = self.returns {
            let in_range = match arity {
                Arity::Exactly(count) => index >= 1 && index <= count,
                Arity::AtLeast(_) => index >= 1,
            };
            if !in_range {
                return Err(TemplateError::InvalidReturnArgument {
                    template: self.template.clone(),
                    index,
                });
            }
        }
        Ok(arity)
    }
}

/// The function templates of a dialect, keyed by generic function name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FunctionTable(pub BTreeMap<String, FunctionTemplate>);

impl FunctionTable {
    pub fn get(&self, name: &str) -> Option<&FunctionTemplate> {
        self.0.get(name)
    }

    /// Add new functions, replacing any existing ones with the same name.
    pub fn extend(&mut self, overrides: &BTreeMap<String, FunctionTemplate>) {
        self.0
            .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Check every template, returning the name of the first broken one.
    pub fn validate(&self) -> Result<(), (String, TemplateError)> {
        for (name, template) in &self.0 {
            template.arity().map_err(|err| (name.clone(), err))?;
        }
        Ok(())
    }

    pub fn for_dialect(name: DialectName) -> FunctionTable {
        let mut table = common_functions();
        let specific = match name {
            DialectName::Oracle => oracle_functions(),
            DialectName::Sqlite => sqlite_functions(),
            DialectName::Postgres => postgres_functions(),
        };
        table.extend(specific);
        FunctionTable(table)
    }
}

fn common_functions() -> BTreeMap<String, FunctionTemplate> {
    use ScalarType::{Float, Integer, String};
    BTreeMap::from([
        ("lower".into(), FunctionTemplate::new("LOWER($1)", ReturnType::Fixed(String))),
        ("upper".into(), FunctionTemplate::new("UPPER($1)", ReturnType::Fixed(String))),
        ("length".into(), FunctionTemplate::new("LENGTH($1)", ReturnType::Fixed(Integer))),
        (
            "substring".into(),
            FunctionTemplate::new("SUBSTR($1, $2, $3)", ReturnType::Fixed(String)),
        ),
        (
            "coalesce".into(),
            FunctionTemplate::variadic("COALESCE($*)", ", ", ReturnType::Argument(1)),
        ),
        ("count".into(), FunctionTemplate::new("COUNT($1)", ReturnType::Fixed(Integer))),
        ("count_all".into(), FunctionTemplate::new("COUNT(*)", ReturnType::Fixed(Integer))),
        ("sum".into(), FunctionTemplate::new("SUM($1)", ReturnType::Argument(1))),
        ("max".into(), FunctionTemplate::new("MAX($1)", ReturnType::Argument(1))),
        ("min".into(), FunctionTemplate::new("MIN($1)", ReturnType::Argument(1))),
        ("avg".into(), FunctionTemplate::new("AVG($1)", ReturnType::Fixed(Float))),
    ])
}

fn oracle_functions() -> BTreeMap<String, FunctionTemplate> {
    use ScalarType::{Date, DateTime, String};
    BTreeMap::from([
        (
            "concat".into(),
            FunctionTemplate::variadic("($*)", " || ", ReturnType::Fixed(String)),
        ),
        ("ifnull".into(), FunctionTemplate::new("NVL($1, $2)", ReturnType::Argument(1))),
        ("to_string".into(), FunctionTemplate::new("TO_CHAR($1)", ReturnType::Fixed(String))),
        ("now".into(), FunctionTemplate::new("SYSTIMESTAMP", ReturnType::Fixed(DateTime))),
        (
            "timestamp_param".into(),
            FunctionTemplate::new(
                "TO_TIMESTAMP($1, 'YYYY-MM-DD HH24:MI:SS.FF6')",
                ReturnType::Fixed(DateTime),
            ),
        ),
        (
            "date_param".into(),
            FunctionTemplate::new("TO_DATE($1, 'YYYY-MM-DD')", ReturnType::Fixed(Date)),
        ),
    ])
}

fn sqlite_functions() -> BTreeMap<String, FunctionTemplate> {
    use ScalarType::{Date, DateTime, String};
    BTreeMap::from([
        (
            "concat".into(),
            FunctionTemplate::variadic("($*)", " || ", ReturnType::Fixed(String)),
        ),
        ("ifnull".into(), FunctionTemplate::new("IFNULL($1, $2)", ReturnType::Argument(1))),
        (
            "to_string".into(),
            FunctionTemplate::new("CAST($1 AS TEXT)", ReturnType::Fixed(String)),
        ),
        ("now".into(), FunctionTemplate::new("CURRENT_TIMESTAMP", ReturnType::Fixed(DateTime))),
        // datetimes are stored as text
        ("timestamp_param".into(), FunctionTemplate::new("$1", ReturnType::Fixed(DateTime))),
        ("date_param".into(), FunctionTemplate::new("$1", ReturnType::Fixed(Date))),
    ])
}

fn postgres_functions() -> BTreeMap<String, FunctionTemplate> {
    use ScalarType::{Date, DateTime, String};
    BTreeMap::from([
        (
            "concat".into(),
            FunctionTemplate::variadic("CONCAT($*)", ", ", ReturnType::Fixed(String)),
        ),
        ("ifnull".into(), FunctionTemplate::new("COALESCE($1, $2)", ReturnType::Argument(1))),
        (
            "to_string".into(),
            FunctionTemplate::new("CAST($1 AS TEXT)", ReturnType::Fixed(String)),
        ),
        (
            "substring".into(),
            FunctionTemplate::new("SUBSTRING($1 FROM $2 FOR $3)", ReturnType::Fixed(String)),
        ),
        ("now".into(), FunctionTemplate::new("NOW()", ReturnType::Fixed(DateTime))),
        (
            "timestamp_param".into(),
            FunctionTemplate::new("CAST($1 AS TIMESTAMP)", ReturnType::Fixed(DateTime)),
        ),
        (
            "date_param".into(),
            FunctionTemplate::new("CAST($1 AS DATE)", ReturnType::Fixed(Date)),
        ),
    ])
}
