//! Helpers for processing the query model and building SQL.

use std::collections::BTreeMap;

use query_engine_metadata::metadata::{self, Capabilities, Dialect, FunctionTemplate, ScalarType};
use query_engine_models::BoundValue;
use query_engine_sql::sql;
use query_engine_sql::sql::execution_plan::OutputColumn;

use super::error::Error;

/// Static information from the query and metadata.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a> {
    pub metadata: &'a metadata::Metadata,
    pub dialect: &'a Dialect,
}

impl<'a> Env<'a> {
    pub fn new(metadata: &'a metadata::Metadata, dialect: &'a Dialect) -> Env<'a> {
        Env { metadata, dialect }
    }

    pub fn capabilities(&self) -> &'a Capabilities {
        &self.dialect.capabilities
    }

    /// Lookup a collection's information in the metadata.
    pub fn lookup_collection(&self, collection_name: &str) -> Result<&'a metadata::TableInfo, Error> {
        self.metadata
            .table(collection_name)
            .ok_or_else(|| Error::CollectionNotFound(collection_name.to_string()))
    }

    /// Lookup the dialect's spelling of a generic function.
    pub fn lookup_function(&self, name: &str) -> Result<&'a FunctionTemplate, Error> {
        self.dialect
            .functions
            .get(name)
            .ok_or_else(|| self.unsupported(format!("function '{name}'")))
    }

    pub fn unsupported(&self, construct: impl Into<String>) -> Error {
        Error::UnsupportedConstruct {
            dialect: self.dialect.name,
            construct: construct.into(),
        }
    }
}

/// A relation a query selects from, and the columns it offers.
#[derive(Debug, Clone)]
pub enum SourceInfo<'a> {
    Table {
        alias: sql::ast::TableAlias,
        collection: String,
        info: &'a metadata::TableInfo,
    },
    Derived {
        alias: sql::ast::TableAlias,
        columns: Vec<OutputColumn>,
    },
}

impl SourceInfo<'_> {
    pub fn alias(&self) -> &sql::ast::TableAlias {
        match self {
            SourceInfo::Table { alias, .. } | SourceInfo::Derived { alias, .. } => alias,
        }
    }

    /// Find a column of this source, returning the expression referencing it and its type.
    pub fn column(&self, name: &str) -> Option<(sql::ast::Expression, Option<ScalarType>)> {
        match self {
            SourceInfo::Table { alias, info, .. } => info.column(name).map(|column| {
                (
                    sql::helpers::table_column(alias.clone(), &column.name),
                    Some(column.r#type),
                )
            }),
            SourceInfo::Derived { alias, columns } => columns
                .iter()
                .find(|column| column.name == name)
                .map(|column| {
                    (
                        sql::helpers::aliased_column(alias.clone(), &column.name),
                        column.scalar_type,
                    )
                }),
        }
    }

    /// Every column of this source, in order.
    pub fn all_columns(&self) -> Vec<(String, sql::ast::Expression, Option<ScalarType>)> {
        match self {
            SourceInfo::Table { alias, info, .. } => info
                .columns
                .iter()
                .map(|(key, column)| {
                    (
                        key.clone(),
                        sql::helpers::table_column(alias.clone(), &column.name),
                        Some(column.r#type),
                    )
                })
                .collect(),
            SourceInfo::Derived { alias, columns } => columns
                .iter()
                .map(|column| {
                    (
                        column.name.clone(),
                        sql::helpers::aliased_column(alias.clone(), &column.name),
                        column.scalar_type,
                    )
                })
                .collect(),
        }
    }

    fn describe(&self) -> String {
        match self {
            SourceInfo::Table { collection, .. } => collection.clone(),
            SourceInfo::Derived { alias, .. } => alias.name.clone(),
        }
    }
}

/// What a query can see while it is translated: its own sources and bindings,
/// then those of the queries enclosing it.
#[derive(Debug)]
pub struct Scope<'a> {
    pub sources: Vec<SourceInfo<'a>>,
    pub bindings: &'a BTreeMap<String, BoundValue>,
    pub parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(
        sources: Vec<SourceInfo<'a>>,
        bindings: &'a BTreeMap<String, BoundValue>,
        parent: Option<&'a Scope<'a>>,
    ) -> Scope<'a> {
        Scope {
            sources,
            bindings,
            parent,
        }
    }

    /// Resolve a named binding, innermost query first.
    pub fn lookup_binding(&self, name: &str) -> Result<&'a BoundValue, Error> {
        match self.bindings.get(name) {
            Some(bound) => Ok(bound),
            None => match self.parent {
                Some(parent) => parent.lookup_binding(name),
                None => Err(Error::BindingNotFound(name.to_string())),
            },
        }
    }

    /// Resolve a column. A qualified column may belong to an enclosing query;
    /// an unqualified one must belong to this query's sources.
    pub fn lookup_column(
        &self,
        name: &str,
        table: Option<&str>,
    ) -> Result<(sql::ast::Expression, Option<ScalarType>), Error> {
        match table {
            None => self
                .sources
                .iter()
                .find_map(|source| source.column(name))
                .ok_or_else(|| Error::ColumnNotFound {
                    column: name.to_string(),
                    collection: self
                        .sources
                        .first()
                        .map_or_else(String::new, SourceInfo::describe),
                }),
            Some(table) => match self.sources.iter().find(|s| s.alias().name == table) {
                Some(source) => source.column(name).ok_or_else(|| Error::ColumnNotFound {
                    column: name.to_string(),
                    collection: source.describe(),
                }),
                None => match self.parent {
                    Some(parent) => parent.lookup_column(name, Some(table)),
                    None => Err(Error::CollectionNotFound(table.to_string())),
                },
            },
        }
    }
}
