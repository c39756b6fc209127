//! The query tree.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use query_engine_metadata::metadata::{ComparisonOperator, LoadStrategy, ScalarType};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A complete statement: a single query, a set operation over several, or an
/// insert of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    Query(Box<Query>),
    Union(Box<Union>),
    Insert(Box<Insert>),
}

/// An INSERT of a single row into a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub collection: String,
    /// The value of each column, keyed by column name. A value may be any
    /// expression, including a subquery selecting a single value.
    pub values: IndexMap<String, Expression>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, BoundValue>,
}

/// A SELECT over a single source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    /// Where rows come from. A query without a source selects expressions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// The output columns, keyed by alias. `None` selects every column of the
    /// source collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<IndexMap<String, Field>>,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderByElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Associations to eager load, keyed by association name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub contain: IndexMap<String, Contain>,
    /// Values for the named bindings used by this query and the queries it encloses.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, BoundValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    /// A collection named in the metadata.
    Collection {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    /// A nested statement, selected from as a derived table.
    Derived {
        statement: Box<Statement>,
        alias: String,
    },
}

/// An output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Field {
    Column {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
    },
    Expression {
        expression: Expression,
        /// The type to decode the column as, when it cannot be inferred.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scalar_type: Option<ScalarType>,
    },
}

/// A scalar or boolean expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expression {
    /// A column of the source. `table` names the source alias, if there is more than one
    /// candidate.
    Column {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
    },
    Literal {
        value: Value,
    },
    /// A value declared in the `bindings` of this query or of an enclosing query.
    Binding {
        name: String,
    },
    BinaryComparison {
        left: Box<Expression>,
        operator: ComparisonOperator,
        right: Box<Expression>,
    },
    And {
        expressions: Vec<Expression>,
    },
    Or {
        expressions: Vec<Expression>,
    },
    Not {
        expression: Box<Expression>,
    },
    IsNull {
        expression: Box<Expression>,
    },
    In {
        expression: Box<Expression>,
        values: Vec<Expression>,
    },
    InSubquery {
        expression: Box<Expression>,
        query: Box<Statement>,
        #[serde(default)]
        negated: bool,
    },
    Exists {
        query: Box<Statement>,
    },
    /// A call to a generic function, translated through the dialect's function table.
    Function {
        name: String,
        #[serde(default)]
        arguments: Vec<Expression>,
    },
    /// A scalar subquery.
    Subquery {
        query: Box<Statement>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByElement {
    pub expression: Expression,
    #[serde(default)]
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOperator {
    /// Distinct rows only.
    Union,
    UnionAll,
}

/// A set operation over two or more queries with the same number of output columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Union {
    pub operator: SetOperator,
    pub queries: Vec<Query>,
    /// Ordering of the combined rows. Expressions refer to the output columns by alias.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderByElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

/// A request to eager load an association of the parent query's rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contain {
    /// Overrides the strategy declared on the association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<LoadStrategy>,
    /// The columns to load. Key columns needed to merge the rows are always loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderByElement>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub contain: IndexMap<String, Contain>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, BoundValue>,
}

/// The value of a named binding. Without an explicit type, the type is taken from
/// the column the binding is compared with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundValue {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar_type: Option<ScalarType>,
}

impl From<Query> for Statement {
    fn from(query: Query) -> Self {
        Statement::Query(Box::new(query))
    }
}

impl From<Union> for Statement {
    fn from(union: Union) -> Self {
        Statement::Union(Box::new(union))
    }
}

impl From<Insert> for Statement {
    fn from(insert: Insert) -> Self {
        Statement::Insert(Box::new(insert))
    }
}
