//! Type definitions of a SQL AST representation.

use super::string::WireValue;
use query_engine_metadata::metadata::ScalarType;

/// A complete statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<Select>),
    SetOperation(Box<SetOperation>),
}

/// A SELECT clause
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub select_list: SelectList,
    pub from: Option<From>,
    pub joins: Vec<Join>,
    pub where_: Where,
    pub group_by: GroupBy,
    pub order_by: OrderBy,
    pub limit: Limit,
}

/// An INSERT of a single row
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: TableName,
    pub columns: Vec<ColumnName>,
    pub values: Vec<Expression>,
}

/// Branches combined with UNION or UNION ALL, optionally ordered and limited as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    pub operator: SetOperator,
    pub branches: Vec<Select>,
    pub order_by: OrderBy,
    pub limit: Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
}

/// A select list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectList {
    SelectList(Vec<(ColumnAlias, Expression)>),
    SelectStar,
}

/// A FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum From {
    /// Select from a table
    Table { name: TableName, alias: TableAlias },
    /// Select from a subquery
    Select {
        select: Box<Select>,
        alias: TableAlias,
    },
    /// Select from a set operation
    SetOperation {
        set_operation: Box<SetOperation>,
        alias: TableAlias,
    },
}

/// A JOIN clause
#[derive(Debug, Clone, PartialEq)]
pub enum Join {
    /// INNER JOIN
    InnerJoin(InnerJoin),
}

/// An INNER JOIN clause
#[derive(Debug, Clone, PartialEq)]
pub struct InnerJoin {
    pub name: TableName,
    pub alias: TableAlias,
    pub on: Expression,
}

/// A WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct Where(pub Expression);

/// A GROUP BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub elements: Vec<Expression>,
}

/// An ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub elements: Vec<OrderByElement>,
}

/// A single element in an ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByElement {
    pub target: Expression,
    pub direction: OrderByDirection,
}

/// A direction for a single ORDER BY element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderByDirection {
    Asc,
    Desc,
}

/// LIMIT and OFFSET clauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// A scalar expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// AND clause
    And {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// OR clause
    Or {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// NOT clause
    Not(Box<Expression>),
    /// A binary operation on two scalar expression
    BinaryOperation {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
    /// A binary operation on a scalar expression and an array of scalar expressions
    BinaryArrayOperation {
        left: Box<Expression>,
        operator: BinaryArrayOperator,
        right: Vec<Expression>,
    },
    /// A binary operation on a scalar expression and a subquery
    SubqueryOperation {
        left: Box<Expression>,
        operator: BinaryArrayOperator,
        statement: Box<Statement>,
    },
    /// An unary operation on a scalar expression
    UnaryOperation {
        expression: Box<Expression>,
        operator: UnaryOperator,
    },
    /// A function call, already spelled out for the dialect
    Template(Vec<TemplatePiece>),
    /// An EXISTS clause
    Exists { statement: Box<Statement> },
    /// A column reference
    ColumnReference(ColumnReference),
    /// An irreducible value
    Value(Value),
    /// A COUNT clause
    Count(CountType),
    /// A subquery returning a single value
    CorrelatedSubSelect(Box<Statement>),
}

/// Text and arguments of an expanded function template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePiece {
    Text(String),
    Argument(Expression),
}

/// An unary operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnaryOperator {
    IsNull,
}

/// Represents the name of a binary operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryOperator(pub String);

/// A binary operator when the rhs is an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryArrayOperator {
    In,
    NotIn,
}

/// COUNT clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountType {
    Star,
}

/// Value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A boolean in predicate position
    Bool(bool),
    Null,
    /// A value sent as a bound parameter
    Parameter {
        value: WireValue,
        scalar_type: Option<ScalarType>,
    },
}

/// The name of a database table, optionally qualified by its schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub schema: Option<String>,
    pub table: String,
}

/// A database table's column name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnName(pub String);

/// A reference to a column. Used when we want to query it,
/// for example in a SELECT list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnReference {
    /// refers to a db column object name
    TableColumn { table: TableAlias, name: ColumnName },
    /// refers to an alias we created
    AliasedColumn {
        table: TableAlias,
        column: ColumnAlias,
    },
    /// refers to an output column of the statement being ordered
    OutputColumn(ColumnAlias),
}

/// aliases that we give to relations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableAlias {
    pub name: String,
}

/// aliases that we give to columns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnAlias {
    pub name: String,
}
