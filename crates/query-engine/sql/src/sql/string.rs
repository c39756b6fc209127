//! Type definitions of a low-level SQL string representation.

use std::fmt;

use query_engine_metadata::metadata::{
    Capabilities, IdentifierCase, PlaceholderStyle, ScalarType,
};
use serde::Serialize;

/// SQL text under construction, together with the parameters it refers to.
#[derive(Debug, PartialEq)]
pub struct SQL {
    pub sql: String,
    pub params: Vec<Param>,
    /// The dialect the text is written for.
    pub capabilities: Capabilities,
}

/// A value in the representation sent to, and received from, the database driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Null => write!(f, "NULL"),
            WireValue::Bool(b) => write!(f, "{b}"),
            WireValue::Integer(i) => write!(f, "{i}"),
            WireValue::Real(r) => write!(f, "{r}"),
            WireValue::Text(s) => write!(f, "'{s}'"),
            WireValue::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// A bound parameter of a parameterized query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    /// Unique within a statement: `p1`, `p2`, ..., in placeholder order.
    pub name: String,
    pub value: WireValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalar_type: Option<ScalarType>,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scalar_type {
            Some(scalar_type) => write!(f, "{} = {} ({scalar_type})", self.name, self.value),
            None => write!(f, "{} = {}", self.name, self.value),
        }
    }
}

impl SQL {
    pub fn new(capabilities: &Capabilities) -> SQL {
        SQL {
            sql: String::new(),
            params: vec![],
            capabilities: capabilities.clone(),
        }
    }

    pub fn append_syntax(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Append an alias we created or were given. Aliases keep their case.
    pub fn append_identifier(&mut self, identifier: &str) {
        let quote = self.capabilities.identifier_quote;
        self.sql.push(quote);
        for c in identifier.chars() {
            if c == quote {
                self.sql.push(quote);
            }
            self.sql.push(c);
        }
        self.sql.push(quote);
    }

    /// Append the name of a schema object, folded to the case the database stores it in.
    pub fn append_object_name(&mut self, name: &str) {
        let folded = match self.capabilities.identifier_case {
            IdentifierCase::Preserve => name.to_string(),
            IdentifierCase::Upper => name.to_uppercase(),
            IdentifierCase::Lower => name.to_lowercase(),
        };
        self.append_identifier(&folded);
    }

    /// Append a placeholder and record the value bound to it.
    pub fn append_param(&mut self, value: WireValue, scalar_type: Option<ScalarType>) {
        let index = self.params.len() + 1;
        let name = format!("p{index}");
        match self.capabilities.placeholder_style {
            PlaceholderStyle::Colon => {
                self.sql.push(':');
                self.sql.push_str(&name);
            }
            PlaceholderStyle::Question => self.sql.push('?'),
            PlaceholderStyle::Dollar => self.sql.push_str(&format!("${index}")),
        }
        self.params.push(Param {
            name,
            value,
            scalar_type,
        });
    }

    /// Append the keyword placed between a table expression and its alias.
    pub fn append_table_alias_keyword(&mut self) {
        if self.capabilities.table_alias_keyword {
            self.sql.push_str(" AS ");
        } else {
            self.sql.push(' ');
        }
    }
}
