//! Convert a SQL AST to a low-level SQL string.

use query_engine_metadata::metadata::PaginationStyle;

use super::ast::*;
use super::helpers;
use super::string::SQL;

// Convert to SQL strings

impl Statement {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            Statement::Select(select) => select.to_sql(sql),
            Statement::SetOperation(set_operation) => set_operation.to_sql(sql),
        }
    }
}

impl Insert {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax("INSERT INTO ");
        self.table.to_sql(sql);
        sql.append_syntax(" (");
        for (index, column) in self.columns.iter().enumerate() {
            if index > 0 {
                sql.append_syntax(", ");
            }
            column.to_sql(sql);
        }
        sql.append_syntax(") VALUES (");
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                sql.append_syntax(", ");
            }
            value.to_sql(sql);
        }
        sql.append_syntax(")");
    }
}

impl SelectList {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            SelectList::SelectList(select_list) => {
                for (index, (col, expr)) in select_list.iter().enumerate() {
                    expr.to_sql(sql);
                    sql.append_syntax(" AS ");
                    col.to_sql(sql);
                    if index < (select_list.len() - 1) {
                        sql.append_syntax(", ");
                    }
                }
            }
            SelectList::SelectStar => {
                sql.append_syntax("*");
            }
        }
    }
}

impl Select {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax("SELECT ");

        self.select_list.to_sql(sql);

        match &self.from {
            Some(from) => from.to_sql(sql),
            None => {
                if let Some(dual) = sql.capabilities.dual_table.clone() {
                    sql.append_syntax(" FROM ");
                    sql.append_syntax(&dual);
                }
            }
        }

        for join in &self.joins {
            join.to_sql(sql);
        }

        self.where_.to_sql(sql);

        self.group_by.to_sql(sql);

        self.order_by.to_sql(sql);

        self.limit.to_sql(sql);
    }
}

impl SetOperation {
    pub fn to_sql(&self, sql: &mut SQL) {
        let parenthesize = sql.capabilities.parenthesized_set_operation_branches;
        for (index, branch) in self.branches.iter().enumerate() {
            if index > 0 {
                self.operator.to_sql(sql);
            }
            if parenthesize {
                sql.append_syntax("(");
                branch.to_sql(sql);
                sql.append_syntax(")");
            } else {
                branch.to_sql(sql);
            }
        }

        self.order_by.to_sql(sql);

        self.limit.to_sql(sql);
    }
}

impl SetOperator {
    pub fn to_sql(self, sql: &mut SQL) {
        match self {
            SetOperator::Union => sql.append_syntax(" UNION "),
            SetOperator::UnionAll => sql.append_syntax(" UNION ALL "),
        }
    }
}

impl From {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax(" FROM ");
        match &self {
            From::Table { name, alias } => {
                name.to_sql(sql);
                sql.append_table_alias_keyword();
                alias.to_sql(sql);
            }
            From::Select { select, alias } => {
                sql.append_syntax("(");
                select.to_sql(sql);
                sql.append_syntax(")");
                sql.append_table_alias_keyword();
                alias.to_sql(sql);
            }
            From::SetOperation {
                set_operation,
                alias,
            } => {
                sql.append_syntax("(");
                set_operation.to_sql(sql);
                sql.append_syntax(")");
                sql.append_table_alias_keyword();
                alias.to_sql(sql);
            }
        }
    }
}

impl Join {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            Join::InnerJoin(join) => {
                sql.append_syntax(" INNER JOIN ");
                join.name.to_sql(sql);
                sql.append_table_alias_keyword();
                join.alias.to_sql(sql);
                sql.append_syntax(" ON ");
                join.on.to_sql(sql);
            }
        }
    }
}

impl Where {
    pub fn to_sql(&self, sql: &mut SQL) {
        let Where(expression) = self;
        if *expression != helpers::true_expr() {
            sql.append_syntax(" WHERE ");
            expression.to_sql(sql);
        }
    }
}

impl GroupBy {
    pub fn to_sql(&self, sql: &mut SQL) {
        if !self.elements.is_empty() {
            sql.append_syntax(" GROUP BY ");
            for (index, element) in self.elements.iter().enumerate() {
                element.to_sql(sql);
                if index < (self.elements.len() - 1) {
                    sql.append_syntax(", ");
                }
            }
        }
    }
}

// scalars
impl Expression {
    pub fn to_sql(&self, sql: &mut SQL) {
        match &self {
            Expression::ColumnReference(column_reference) => column_reference.to_sql(sql),
            Expression::Value(value) => value.to_sql(sql),
            Expression::And { left, right } => {
                sql.append_syntax("(");
                left.to_sql(sql);
                sql.append_syntax(" AND ");
                right.to_sql(sql);
                sql.append_syntax(")");
            }
            Expression::Or { left, right } => {
                sql.append_syntax("(");
                left.to_sql(sql);
                sql.append_syntax(" OR ");
                right.to_sql(sql);
                sql.append_syntax(")");
            }
            Expression::Not(expr) => {
                sql.append_syntax("NOT (");
                expr.to_sql(sql);
                sql.append_syntax(")");
            }
            Expression::BinaryOperation {
                left,
                operator,
                right,
            } => {
                sql.append_syntax("(");
                left.to_sql(sql);
                operator.to_sql(sql);
                right.to_sql(sql);
                sql.append_syntax(")");
            }
            Expression::BinaryArrayOperation {
                left,
                operator,
                right,
            } => {
                sql.append_syntax("(");
                left.to_sql(sql);
                operator.to_sql(sql);
                sql.append_syntax("(");
                for (index, item) in right.iter().enumerate() {
                    item.to_sql(sql);
                    if index < (right.len() - 1) {
                        sql.append_syntax(", ");
                    }
                }
                sql.append_syntax("))");
            }
            Expression::SubqueryOperation {
                left,
                operator,
                statement,
            } => {
                sql.append_syntax("(");
                left.to_sql(sql);
                operator.to_sql(sql);
                sql.append_syntax("(");
                statement.to_sql(sql);
                sql.append_syntax("))");
            }
            Expression::UnaryOperation {
                expression,
                operator,
            } => {
                sql.append_syntax("(");
                expression.to_sql(sql);
                operator.to_sql(sql);
                sql.append_syntax(")");
            }
            Expression::Template(pieces) => {
                for piece in pieces {
                    match piece {
                        TemplatePiece::Text(text) => sql.append_syntax(text),
                        TemplatePiece::Argument(argument) => argument.to_sql(sql),
                    }
                }
            }
            Expression::Exists { statement } => {
                sql.append_syntax("EXISTS (");
                statement.to_sql(sql);
                sql.append_syntax(")");
            }
            Expression::Count(count_type) => {
                sql.append_syntax("COUNT(");
                count_type.to_sql(sql);
                sql.append_syntax(")");
            }
            Expression::CorrelatedSubSelect(statement) => {
                sql.append_syntax("(");
                statement.to_sql(sql);
                sql.append_syntax(")");
            }
        }
    }
}

impl UnaryOperator {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            UnaryOperator::IsNull => sql.append_syntax(" IS NULL"),
        }
    }
}

impl BinaryOperator {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax(" ");
        sql.append_syntax(&self.0);
        sql.append_syntax(" ");
    }
}

impl BinaryArrayOperator {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            BinaryArrayOperator::In => sql.append_syntax(" IN "),
            BinaryArrayOperator::NotIn => sql.append_syntax(" NOT IN "),
        }
    }
}

impl CountType {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            CountType::Star => sql.append_syntax("*"),
        }
    }
}

impl Value {
    pub fn to_sql(&self, sql: &mut SQL) {
        match &self {
            Value::Bool(true) => {
                if sql.capabilities.boolean_literals {
                    sql.append_syntax("TRUE");
                } else {
                    sql.append_syntax("1 = 1");
                }
            }
            Value::Bool(false) => {
                if sql.capabilities.boolean_literals {
                    sql.append_syntax("FALSE");
                } else {
                    sql.append_syntax("1 = 0");
                }
            }
            Value::Null => sql.append_syntax("NULL"),
            Value::Parameter { value, scalar_type } => {
                sql.append_param(value.clone(), *scalar_type);
            }
        }
    }
}

impl OrderBy {
    pub fn to_sql(&self, sql: &mut SQL) {
        if !self.elements.is_empty() {
            sql.append_syntax(" ORDER BY ");
            for (index, order_by_item) in self.elements.iter().enumerate() {
                order_by_item.to_sql(sql);
                if index < (self.elements.len() - 1) {
                    sql.append_syntax(", ");
                }
            }
        }
    }
}

impl OrderByElement {
    pub fn to_sql(&self, sql: &mut SQL) {
        self.target.to_sql(sql);
        self.direction.to_sql(sql);
    }
}

impl OrderByDirection {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            OrderByDirection::Asc => sql.append_syntax(" ASC"),
            OrderByDirection::Desc => sql.append_syntax(" DESC"),
        }
    }
}

impl Limit {
    pub fn to_sql(&self, sql: &mut SQL) {
        match sql.capabilities.pagination {
            PaginationStyle::LimitOffset => {
                match (self.limit, self.offset) {
                    (Some(limit), _) => sql.append_syntax(&format!(" LIMIT {limit}")),
                    (None, Some(_)) if sql.capabilities.offset_requires_limit => {
                        sql.append_syntax(" LIMIT -1");
                    }
                    (None, _) => {}
                }
                if let Some(offset) = self.offset {
                    sql.append_syntax(&format!(" OFFSET {offset}"));
                }
            }
            PaginationStyle::OffsetFetch => {
                if let Some(offset) = self.offset {
                    sql.append_syntax(&format!(" OFFSET {offset} ROWS"));
                }
                if let Some(limit) = self.limit {
                    sql.append_syntax(&format!(" FETCH NEXT {limit} ROWS ONLY"));
                }
            }
        }
    }
}

// names
impl TableName {
    pub fn to_sql(&self, sql: &mut SQL) {
        if let Some(schema) = &self.schema {
            sql.append_object_name(schema);
            sql.append_syntax(".");
        }
        sql.append_object_name(&self.table);
    }
}

impl ColumnReference {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            ColumnReference::TableColumn { table, name } => {
                table.to_sql(sql);
                sql.append_syntax(".");
                name.to_sql(sql);
            }
            ColumnReference::AliasedColumn { table, column } => {
                table.to_sql(sql);
                sql.append_syntax(".");
                column.to_sql(sql);
            }
            ColumnReference::OutputColumn(column) => column.to_sql(sql),
        }
    }
}

impl ColumnName {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_object_name(&self.0);
    }
}

impl TableAlias {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_identifier(&self.name);
    }
}

impl ColumnAlias {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_identifier(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_metadata::metadata::{Capabilities, DialectName};

    fn render(dialect: DialectName, select: &Select) -> String {
        let mut sql = SQL::new(&Capabilities::for_dialect(dialect));
        select.to_sql(&mut sql);
        sql.sql
    }

    fn articles_select() -> Select {
        let alias = helpers::make_table_alias("articles");
        let mut select = helpers::simple_select(vec![helpers::make_column(
            alias.clone(),
            "id",
            helpers::make_column_alias("id"),
        )]);
        select.from = Some(From::Table {
            name: TableName {
                schema: None,
                table: "articles".to_string(),
            },
            alias,
        });
        select
    }

    #[test]
    fn oracle_folds_names_and_omits_the_alias_keyword() {
        assert_eq!(
            render(DialectName::Oracle, &articles_select()),
            "SELECT \"articles\".\"ID\" AS \"id\" FROM \"ARTICLES\" \"articles\""
        );
        assert_eq!(
            render(DialectName::Sqlite, &articles_select()),
            "SELECT \"articles\".\"id\" AS \"id\" FROM \"articles\" AS \"articles\""
        );
    }

    #[test]
    fn pagination_follows_the_dialect() {
        let mut select = articles_select();
        select.limit = Limit {
            limit: None,
            offset: Some(2),
        };
        assert!(render(DialectName::Sqlite, &select).ends_with(" LIMIT -1 OFFSET 2"));
        assert!(render(DialectName::Postgres, &select).ends_with("\"articles\" OFFSET 2"));
        assert!(render(DialectName::Oracle, &select).ends_with(" OFFSET 2 ROWS"));

        select.limit.limit = Some(3);
        assert!(render(DialectName::Sqlite, &select).ends_with(" LIMIT 3 OFFSET 2"));
        assert!(render(DialectName::Oracle, &select)
            .ends_with(" OFFSET 2 ROWS FETCH NEXT 3 ROWS ONLY"));
    }

    #[test]
    fn boolean_literals_follow_the_dialect() {
        let mut select = articles_select();
        select.where_ = Where(helpers::false_expr());
        assert!(render(DialectName::Oracle, &select).ends_with(" WHERE 1 = 0"));
        assert!(render(DialectName::Postgres, &select).ends_with(" WHERE FALSE"));
    }

    #[test]
    fn selects_without_a_source_use_dual_where_required() {
        let select = helpers::simple_select(vec![(
            helpers::make_column_alias("one"),
            Expression::Value(Value::Null),
        )]);
        assert_eq!(
            render(DialectName::Oracle, &select),
            "SELECT NULL AS \"one\" FROM DUAL"
        );
        assert_eq!(render(DialectName::Sqlite, &select), "SELECT NULL AS \"one\"");
    }

    #[test]
    fn insert_values_may_be_subselects() {
        let title = helpers::simple_select(vec![(
            helpers::make_column_alias("title"),
            Expression::Value(Value::Null),
        )]);
        let insert = Insert {
            table: TableName {
                schema: None,
                table: "articles".to_string(),
            },
            columns: vec![ColumnName("id".to_string()), ColumnName("title".to_string())],
            values: vec![
                Expression::Value(Value::Null),
                Expression::CorrelatedSubSelect(Box::new(Statement::Select(Box::new(title)))),
            ],
        };
        let render = |dialect| {
            let mut sql = SQL::new(&Capabilities::for_dialect(dialect));
            insert.to_sql(&mut sql);
            sql.sql
        };

        assert_eq!(
            render(DialectName::Oracle),
            "INSERT INTO \"ARTICLES\" (\"ID\", \"TITLE\") VALUES (NULL, (SELECT NULL AS \"title\" FROM DUAL))"
        );
        assert_eq!(
            render(DialectName::Sqlite),
            "INSERT INTO \"articles\" (\"id\", \"title\") VALUES (NULL, (SELECT NULL AS \"title\"))"
        );
    }

    #[test]
    fn set_operation_branches_are_parenthesised_where_allowed() {
        let set_operation = SetOperation {
            operator: SetOperator::UnionAll,
            branches: vec![articles_select(), articles_select()],
            order_by: helpers::empty_order_by(),
            limit: helpers::empty_limit(),
        };
        for (dialect, parenthesised) in [
            (DialectName::Oracle, true),
            (DialectName::Sqlite, false),
            (DialectName::Postgres, true),
        ] {
            let mut sql = SQL::new(&Capabilities::for_dialect(dialect));
            set_operation.to_sql(&mut sql);
            assert_eq!(sql.sql.starts_with('('), parenthesised);
            assert!(sql.sql.contains(" UNION ALL "));
        }
    }
}
