//! The result of compiling a statement: everything a driver needs to run it
//! and to decode what comes back.

use query_engine_metadata::metadata::{Capabilities, ScalarType};
use serde::Serialize;

use super::ast;
use super::string::{Param, SQL};

/// A column of the result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub name: String,
    /// The logical type to decode the column as. When unknown, values are decoded
    /// from whatever the database returns.
    pub scalar_type: Option<ScalarType>,
}

/// SQL text, its bound parameters in placeholder order, and the shape of its rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<Param>,
    pub columns: Vec<OutputColumn>,
}

impl CompiledStatement {
    /// Render a statement for a dialect.
    pub fn new(
        statement: &ast::Statement,
        capabilities: &Capabilities,
        columns: Vec<OutputColumn>,
    ) -> CompiledStatement {
        let mut sql = SQL::new(capabilities);
        statement.to_sql(&mut sql);
        CompiledStatement {
            sql: sql.sql,
            params: sql.params,
            columns,
        }
    }

    /// Render an insert for a dialect. It produces no rows.
    pub fn insert(insert: &ast::Insert, capabilities: &Capabilities) -> CompiledStatement {
        let mut sql = SQL::new(capabilities);
        insert.to_sql(&mut sql);
        CompiledStatement {
            sql: sql.sql,
            params: sql.params,
            columns: vec![],
        }
    }

    /// The SQL text laid out for humans, followed by the parameters.
    pub fn pretty(&self) -> String {
        let pretty = sqlformat::format(
            &self.sql,
            &sqlformat::QueryParams::None,
            sqlformat::FormatOptions::default(),
        );
        let params = self
            .params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        format!("{pretty}\n\n{params}")
    }
}
