//! Helpers for building sql::ast types in certain shapes and patterns.

use super::ast::*;

/// An empty `GROUP BY` clause.
pub fn empty_group_by() -> GroupBy {
    GroupBy { elements: vec![] }
}

/// An empty `ORDER BY` clause.
pub fn empty_order_by() -> OrderBy {
    OrderBy { elements: vec![] }
}

/// Empty `LIMIT` and `OFFSET` clauses.
pub fn empty_limit() -> Limit {
    Limit {
        limit: None,
        offset: None,
    }
}

/// A `true` expression.
pub fn true_expr() -> Expression {
    Expression::Value(Value::Bool(true))
}

/// A `false` expression.
pub fn false_expr() -> Expression {
    Expression::Value(Value::Bool(false))
}

/// Combine two predicates with AND, skipping trivially true ones.
pub fn and(left: Expression, right: Expression) -> Expression {
    if left == true_expr() {
        right
    } else if right == true_expr() {
        left
    } else {
        Expression::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Combine two predicates with OR, skipping trivially false ones.
pub fn or(left: Expression, right: Expression) -> Expression {
    if left == false_expr() {
        right
    } else if right == false_expr() {
        left
    } else {
        Expression::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

// Aliasing //

/// Generate a column expression refering to a specific table.
pub fn make_column(table: TableAlias, name: &str, alias: ColumnAlias) -> (ColumnAlias, Expression) {
    (alias, table_column(table, name))
}

/// A column of a database table, referenced through the table's alias.
pub fn table_column(table: TableAlias, name: &str) -> Expression {
    Expression::ColumnReference(ColumnReference::TableColumn {
        table,
        name: ColumnName(name.to_string()),
    })
}

/// A column of a derived table, referenced through the derived table's alias.
pub fn aliased_column(table: TableAlias, column: &str) -> Expression {
    Expression::ColumnReference(ColumnReference::AliasedColumn {
        table,
        column: make_column_alias(column),
    })
}

/// Create column aliases using this function so we build everything in one place.
pub fn make_column_alias(name: &str) -> ColumnAlias {
    ColumnAlias {
        name: name.to_string(),
    }
}

/// Create table aliases using this function so we build everything in one place.
pub fn make_table_alias(name: &str) -> TableAlias {
    TableAlias {
        name: name.to_string(),
    }
}

/// A bound parameter.
pub fn parameter(
    value: super::string::WireValue,
    scalar_type: Option<query_engine_metadata::metadata::ScalarType>,
) -> Expression {
    Expression::Value(Value::Parameter { value, scalar_type })
}

// SELECTs //

/// Build a simple select with a select list and the rest are empty.
pub fn simple_select(select_list: Vec<(ColumnAlias, Expression)>) -> Select {
    Select {
        select_list: SelectList::SelectList(select_list),
        from: None,
        joins: vec![],
        where_: Where(true_expr()),
        group_by: empty_group_by(),
        order_by: empty_order_by(),
        limit: empty_limit(),
    }
}

/// Build a simple select *
pub fn star_select(from: From) -> Select {
    Select {
        select_list: SelectList::SelectStar,
        from: Some(from),
        joins: vec![],
        where_: Where(true_expr()),
        group_by: empty_group_by(),
        order_by: empty_order_by(),
        limit: empty_limit(),
    }
}

/// Select from a statement as a derived table.
pub fn derived_from(statement: Statement, alias: TableAlias) -> From {
    match statement {
        Statement::Select(select) => From::Select { select, alias },
        Statement::SetOperation(set_operation) => From::SetOperation {
            set_operation,
            alias,
        },
    }
}

/// `SELECT COUNT(*) AS "count" FROM (<statement>) "count_source"`
pub fn count_select(statement: Statement) -> Select {
    simple_select_from(
        vec![(
            make_column_alias("count"),
            Expression::Count(CountType::Star),
        )],
        derived_from(statement, make_table_alias("count_source")),
    )
}

/// Build a select with a select list over a source, and the rest empty.
pub fn simple_select_from(select_list: Vec<(ColumnAlias, Expression)>, from: From) -> Select {
    Select {
        from: Some(from),
        ..simple_select(select_list)
    }
}
