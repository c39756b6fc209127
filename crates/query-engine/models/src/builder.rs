//! Functions for building queries in Rust.
//!
//! ```
//! use query_engine_models::{col, lit, table};
//!
//! let query = table("articles")
//!     .select(["id", "title"])
//!     .filter(col("published").equals(lit("Y")))
//!     .order_asc(col("id"));
//! ```

use indexmap::IndexMap;
use query_engine_metadata::metadata::{ComparisonOperator, LoadStrategy, ScalarType};

use crate::query::*;
use crate::value::Value;

/// Select every column of a collection.
pub fn table(name: &str) -> Query {
    Query {
        source: Some(Source::Collection {
            name: name.to_string(),
            alias: None,
        }),
        ..Query::default()
    }
}

/// Select from a collection under an alias.
pub fn aliased_table(name: &str, alias: &str) -> Query {
    Query {
        source: Some(Source::Collection {
            name: name.to_string(),
            alias: Some(alias.to_string()),
        }),
        ..Query::default()
    }
}

/// Select from a nested statement.
pub fn derived(statement: impl Into<Statement>, alias: &str) -> Query {
    Query {
        source: Some(Source::Derived {
            statement: Box::new(statement.into()),
            alias: alias.to_string(),
        }),
        ..Query::default()
    }
}

/// A query without a source, selecting expressions only.
pub fn values() -> Query {
    Query::default()
}

pub fn col(name: &str) -> Expression {
    Expression::Column {
        name: name.to_string(),
        table: None,
    }
}

/// A column of a specific source alias.
pub fn col_of(table: &str, name: &str) -> Expression {
    Expression::Column {
        name: name.to_string(),
        table: Some(table.to_string()),
    }
}

pub fn lit(value: impl Into<Value>) -> Expression {
    Expression::Literal {
        value: value.into(),
    }
}

pub fn binding(name: &str) -> Expression {
    Expression::Binding {
        name: name.to_string(),
    }
}

pub fn func(name: &str, arguments: Vec<Expression>) -> Expression {
    Expression::Function {
        name: name.to_string(),
        arguments,
    }
}

pub fn and(expressions: Vec<Expression>) -> Expression {
    Expression::And { expressions }
}

pub fn or(expressions: Vec<Expression>) -> Expression {
    Expression::Or { expressions }
}

pub fn not(expression: Expression) -> Expression {
    Expression::Not {
        expression: Box::new(expression),
    }
}

pub fn exists(query: impl Into<Statement>) -> Expression {
    Expression::Exists {
        query: Box::new(query.into()),
    }
}

pub fn subquery(query: impl Into<Statement>) -> Expression {
    Expression::Subquery {
        query: Box::new(query.into()),
    }
}

impl Expression {
    fn compare(self, operator: ComparisonOperator, right: Expression) -> Expression {
        Expression::BinaryComparison {
            left: Box::new(self),
            operator,
            right: Box::new(right),
        }
    }

    pub fn equals(self, right: Expression) -> Expression {
        self.compare(ComparisonOperator::Equals, right)
    }

    pub fn not_equals(self, right: Expression) -> Expression {
        self.compare(ComparisonOperator::NotEquals, right)
    }

    pub fn gt(self, right: Expression) -> Expression {
        self.compare(ComparisonOperator::GreaterThan, right)
    }

    pub fn gte(self, right: Expression) -> Expression {
        self.compare(ComparisonOperator::GreaterThanOrEqualTo, right)
    }

    pub fn lt(self, right: Expression) -> Expression {
        self.compare(ComparisonOperator::LessThan, right)
    }

    pub fn lte(self, right: Expression) -> Expression {
        self.compare(ComparisonOperator::LessThanOrEqualTo, right)
    }

    pub fn like(self, right: Expression) -> Expression {
        self.compare(ComparisonOperator::Like, right)
    }

    pub fn not_like(self, right: Expression) -> Expression {
        self.compare(ComparisonOperator::NotLike, right)
    }

    pub fn is_null(self) -> Expression {
        Expression::IsNull {
            expression: Box::new(self),
        }
    }

    pub fn in_list(self, values: Vec<Expression>) -> Expression {
        Expression::In {
            expression: Box::new(self),
            values,
        }
    }

    pub fn in_query(self, query: impl Into<Statement>) -> Expression {
        Expression::InSubquery {
            expression: Box::new(self),
            query: Box::new(query.into()),
            negated: false,
        }
    }

    pub fn not_in_query(self, query: impl Into<Statement>) -> Expression {
        Expression::InSubquery {
            expression: Box::new(self),
            query: Box::new(query.into()),
            negated: true,
        }
    }
}

impl Field {
    pub fn column(name: &str) -> Field {
        Field::Column {
            column: name.to_string(),
            table: None,
        }
    }

    pub fn expression(expression: Expression) -> Field {
        Field::Expression {
            expression,
            scalar_type: None,
        }
    }

    pub fn typed(expression: Expression, scalar_type: ScalarType) -> Field {
        Field::Expression {
            expression,
            scalar_type: Some(scalar_type),
        }
    }
}

fn and_with(existing: Option<Expression>, predicate: Expression) -> Expression {
    match existing {
        None => predicate,
        Some(Expression::And { mut expressions }) => {
            expressions.push(predicate);
            Expression::And { expressions }
        }
        Some(other) => Expression::And {
            expressions: vec![other, predicate],
        },
    }
}

impl Query {
    /// Select the given columns, each under its own name.
    pub fn select<'a>(mut self, columns: impl IntoIterator<Item = &'a str>) -> Query {
        let fields = self.fields.get_or_insert_with(IndexMap::new);
        for column in columns {
            fields.insert(column.to_string(), Field::column(column));
        }
        self
    }

    /// Add an output column.
    pub fn field(mut self, alias: &str, field: Field) -> Query {
        self.fields
            .get_or_insert_with(IndexMap::new)
            .insert(alias.to_string(), field);
        self
    }

    /// Add a predicate, combined with any existing one by AND.
    pub fn filter(mut self, predicate: Expression) -> Query {
        self.predicate = Some(and_with(self.predicate.take(), predicate));
        self
    }

    pub fn order_asc(mut self, expression: Expression) -> Query {
        self.order_by.push(OrderByElement {
            expression,
            direction: OrderDirection::Asc,
        });
        self
    }

    pub fn order_desc(mut self, expression: Expression) -> Query {
        self.order_by.push(OrderByElement {
            expression,
            direction: OrderDirection::Desc,
        });
        self
    }

    pub fn group_by(mut self, expression: Expression) -> Query {
        self.group_by.push(expression);
        self
    }

    pub fn limit(mut self, limit: u32) -> Query {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Query {
        self.offset = Some(offset);
        self
    }

    pub fn contain(mut self, association: &str, contain: Contain) -> Query {
        self.contain.insert(association.to_string(), contain);
        self
    }

    /// Declare the value of a named binding.
    pub fn bind(mut self, name: &str, value: impl Into<Value>, scalar_type: Option<ScalarType>) -> Query {
        self.bindings.insert(
            name.to_string(),
            BoundValue {
                value: value.into(),
                scalar_type,
            },
        );
        self
    }

    pub fn union(self, other: Query) -> Union {
        Union::new(SetOperator::Union, vec![self, other])
    }

    pub fn union_all(self, other: Query) -> Union {
        Union::new(SetOperator::UnionAll, vec![self, other])
    }
}

impl Union {
    pub fn new(operator: SetOperator, queries: Vec<Query>) -> Union {
        Union {
            operator,
            queries,
            order_by: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Add another branch.
    pub fn with(mut self, query: Query) -> Union {
        self.queries.push(query);
        self
    }

    pub fn order_asc(mut self, expression: Expression) -> Union {
        self.order_by.push(OrderByElement {
            expression,
            direction: OrderDirection::Asc,
        });
        self
    }

    pub fn order_desc(mut self, expression: Expression) -> Union {
        self.order_by.push(OrderByElement {
            expression,
            direction: OrderDirection::Desc,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Union {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Union {
        self.offset = Some(offset);
        self
    }
}

/// Insert a row into a collection. Add its column values with [`Insert::value`].
pub fn insert_into(collection: &str) -> Insert {
    Insert {
        collection: collection.to_string(),
        values: IndexMap::new(),
        bindings: Default::default(),
    }
}

impl Insert {
    pub fn value(mut self, column: &str, value: Expression) -> Insert {
        self.values.insert(column.to_string(), value);
        self
    }

    pub fn bind(mut self, name: &str, value: impl Into<Value>, scalar_type: Option<ScalarType>) -> Insert {
        self.bindings.insert(
            name.to_string(),
            BoundValue {
                value: value.into(),
                scalar_type,
            },
        );
        self
    }
}

impl Contain {
    pub fn new() -> Contain {
        Contain::default()
    }

    pub fn strategy(mut self, strategy: LoadStrategy) -> Contain {
        self.strategy = Some(strategy);
        self
    }

    pub fn select<'a>(mut self, columns: impl IntoIterator<Item = &'a str>) -> Contain {
        let fields = self.fields.get_or_insert_with(Vec::new);
        fields.extend(columns.into_iter().map(str::to_string));
        self
    }

    pub fn filter(mut self, predicate: Expression) -> Contain {
        self.predicate = Some(and_with(self.predicate.take(), predicate));
        self
    }

    pub fn order_asc(mut self, expression: Expression) -> Contain {
        self.order_by.push(OrderByElement {
            expression,
            direction: OrderDirection::Asc,
        });
        self
    }

    pub fn order_desc(mut self, expression: Expression) -> Contain {
        self.order_by.push(OrderByElement {
            expression,
            direction: OrderDirection::Desc,
        });
        self
    }

    pub fn contain(mut self, association: &str, contain: Contain) -> Contain {
        self.contain.insert(association.to_string(), contain);
        self
    }

    pub fn bind(mut self, name: &str, value: impl Into<Value>, scalar_type: Option<ScalarType>) -> Contain {
        self.bindings.insert(
            name.to_string(),
            BoundValue {
                value: value.into(),
                scalar_type,
            },
        );
        self
    }
}
