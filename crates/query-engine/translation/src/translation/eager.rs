//! Plan the eager loading of associations.
//!
//! Associations are not joined into the root statement. Each association is fetched
//! with a statement of its own, filtered either by the keys collected from the parent
//! rows or, where the dialect allows it, by a subquery over the parent statement.
//! Key columns needed to merge the rows are added to the projections and marked
//! hidden, to be removed once the rows are merged.

use indexmap::IndexMap;
use query_engine_metadata::metadata::{
    Association, AssociationKind, LoadStrategy, ScalarType, TableInfo,
};
use query_engine_models as models;
use query_engine_models::Value;
use query_engine_sql::sql;
use query_engine_sql::sql::execution_plan::{CompiledStatement, OutputColumn};

use super::error::Error;
use super::helpers::Env;
use super::query::{filtering, root, translate_statement, values};

/// The column carrying the parent key of a many-to-many association.
pub const JUNCTION_KEY: &str = "__junction_key";

const PARENT_SOURCE: &str = "parent_source";

/// Everything needed to load a statement and its associations.
#[derive(Debug, Clone, PartialEq)]
pub struct EagerPlan {
    pub root: CompiledStatement,
    /// Columns of the root rows only there to merge associations.
    pub hidden_columns: Vec<String>,
    pub associations: Vec<AssociationPlan>,
}

impl EagerPlan {
    /// The number of levels of associations below the root.
    pub fn depth(&self) -> usize {
        fn depth(plans: &[AssociationPlan]) -> usize {
            plans
                .iter()
                .map(|plan| 1 + depth(&plan.children))
                .max()
                .unwrap_or(0)
        }
        depth(&self.associations)
    }
}

/// Whether a parent row owns a single associated row or a sequence of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// How to load one association of the rows of its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationPlan {
    /// Association names from the root, joined by dots.
    pub path: String,
    pub name: String,
    /// 1 for associations of the root rows.
    pub depth: usize,
    /// The parent column holding the key.
    pub parent_key: String,
    /// The child column matching the parent key.
    pub child_key: String,
    pub cardinality: Cardinality,
    /// Child rows with the same value in this column are loaded once per parent.
    pub dedupe_key: Option<String>,
    pub hidden_columns: Vec<String>,
    pub fetch: Fetch,
    pub children: Vec<AssociationPlan>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    /// A statement filtered by a subquery over the parent statement, ready to run.
    Subquery(CompiledStatement),
    /// A statement to be filtered by the keys collected from the parent rows.
    Keys(KeyedFetch),
}

/// A child statement waiting for its keys.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedFetch {
    select: sql::ast::Select,
    key: sql::ast::Expression,
    key_type: ScalarType,
    columns: Vec<OutputColumn>,
}

impl KeyedFetch {
    /// The type keys are bound as.
    pub fn key_type(&self) -> ScalarType {
        self.key_type
    }

    /// Compile the statement for the given parent keys.
    pub fn compile_with_keys(&self, env: &Env, keys: &[Value]) -> Result<CompiledStatement, Error> {
        let keys = keys
            .iter()
            .map(|key| {
                values::translate_value(env, key, Some(self.key_type)).map(|(key, _)| key)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut select = self.select.clone();
        let predicate = std::mem::replace(&mut select.where_.0, sql::helpers::true_expr());
        select.where_ = sql::ast::Where(sql::helpers::and(
            predicate,
            filtering::in_list(env, self.key.clone(), keys),
        ));

        Ok(CompiledStatement::new(
            &sql::ast::Statement::Select(Box::new(select)),
            env.capabilities(),
            self.columns.clone(),
        ))
    }
}

/// Plan a statement and the associations it asks for.
pub fn plan(env: &Env, statement: &models::Statement) -> Result<EagerPlan, Error> {
    let query = match statement {
        models::Statement::Query(query) if !query.contain.is_empty() => query,
        _ => {
            return Ok(EagerPlan {
                root: super::query::compile(env, statement)?,
                hidden_columns: vec![],
                associations: vec![],
            })
        }
    };

    let Some(models::Source::Collection { name: collection, .. }) = &query.source else {
        return Err(env.unsupported("eager loading without a collection source"));
    };
    let info = env.lookup_collection(collection)?;

    let mut root_query = models::Query {
        contain: IndexMap::new(),
        ..(**query).clone()
    };
    let mut hidden_columns = vec![];
    let pending = plan_associations(
        info,
        collection,
        &mut root_query.fields,
        &mut hidden_columns,
        &query.contain,
        "",
        1,
    )?;

    let (statement, columns) =
        translate_statement(env, None, &models::Statement::Query(Box::new(root_query)))?;
    let root = CompiledStatement::new(&statement, env.capabilities(), columns);

    let associations = pending
        .into_iter()
        .map(|pending| build_association(env, pending, Some(&statement)))
        .collect::<Result<Vec<_>, Error>>()?;

    tracing::debug!(
        dialect = %env.dialect.name,
        associations = associations.len(),
        "planned eager load"
    );

    Ok(EagerPlan {
        root,
        hidden_columns,
        associations,
    })
}

/// An association whose parent key is known, before its own statement is built.
struct PendingAssociation {
    name: String,
    path: String,
    depth: usize,
    association: Association,
    contain: models::Contain,
    parent_key: String,
}

/// Resolve the requested associations of a collection, adding the parent keys they
/// need to the parent's fields.
fn plan_associations(
    info: &TableInfo,
    collection: &str,
    fields: &mut Option<IndexMap<String, models::Field>>,
    hidden_columns: &mut Vec<String>,
    contains: &IndexMap<String, models::Contain>,
    prefix: &str,
    depth: usize,
) -> Result<Vec<PendingAssociation>, Error> {
    contains
        .iter()
        .map(|(name, contain)| {
            let association =
                info.associations
                    .get(name)
                    .ok_or_else(|| Error::AssociationNotFound {
                        association: name.clone(),
                        collection: collection.to_string(),
                    })?;
            let parent_key_column = match &association.kind {
                AssociationKind::BelongsTo { foreign_key } => foreign_key,
                AssociationKind::HasOne { .. }
                | AssociationKind::HasMany { .. }
                | AssociationKind::BelongsToMany { .. } => &info.primary_key,
            };
            let parent_key = ensure_column(fields, parent_key_column, hidden_columns);
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            Ok(PendingAssociation {
                name: name.clone(),
                path,
                depth,
                association: association.clone(),
                contain: contain.clone(),
                parent_key,
            })
        })
        .collect()
}

/// Make sure a column is selected, returning its output name. Columns added here
/// are hidden.
fn ensure_column(
    fields: &mut Option<IndexMap<String, models::Field>>,
    column: &str,
    hidden_columns: &mut Vec<String>,
) -> String {
    let Some(fields) = fields else {
        return column.to_string();
    };
    let existing = fields.iter().find_map(|(alias, field)| match field {
        models::Field::Column {
            column: name,
            table: None,
        } if name == column => Some(alias.clone()),
        _ => None,
    });
    existing.unwrap_or_else(|| {
        fields.insert(column.to_string(), models::Field::column(column));
        hidden_columns.push(column.to_string());
        column.to_string()
    })
}

fn build_association(
    env: &Env,
    pending: PendingAssociation,
    parent_statement: Option<&sql::ast::Statement>,
) -> Result<AssociationPlan, Error> {
    let PendingAssociation {
        name,
        path,
        depth,
        association,
        contain,
        parent_key,
    } = pending;
    let target = env.lookup_collection(&association.target)?;

    let mut fields = contain.fields.as_ref().map(|columns| {
        columns
            .iter()
            .map(|column| (column.clone(), models::Field::column(column)))
            .collect::<IndexMap<_, _>>()
    });
    let mut hidden_columns = vec![];

    let (child_key, dedupe_key) = match &association.kind {
        AssociationKind::BelongsTo { .. } => (
            ensure_column(&mut fields, &target.primary_key, &mut hidden_columns),
            None,
        ),
        AssociationKind::HasOne { foreign_key } | AssociationKind::HasMany { foreign_key } => (
            ensure_column(&mut fields, foreign_key, &mut hidden_columns),
            None,
        ),
        AssociationKind::BelongsToMany { .. } => {
            let primary_key = ensure_column(&mut fields, &target.primary_key, &mut hidden_columns);
            hidden_columns.push(JUNCTION_KEY.to_string());
            (JUNCTION_KEY.to_string(), Some(primary_key))
        }
    };

    let pending_children = plan_associations(
        target,
        &association.target,
        &mut fields,
        &mut hidden_columns,
        &contain.contain,
        &path,
        depth + 1,
    )?;

    let query = models::Query {
        source: Some(models::Source::Collection {
            name: association.target.clone(),
            alias: None,
        }),
        fields,
        predicate: contain.predicate.clone(),
        order_by: contain.order_by.clone(),
        bindings: contain.bindings.clone(),
        ..models::Query::default()
    };
    let (mut select, mut columns) = root::translate_query(env, None, &query)?;
    let alias = sql::helpers::make_table_alias(&association.target);

    let (key, key_type) = match &association.kind {
        AssociationKind::BelongsTo { .. } => column_of(target, &alias, &target.primary_key)?,
        AssociationKind::HasOne { foreign_key } | AssociationKind::HasMany { foreign_key } => {
            column_of(target, &alias, foreign_key)?
        }
        AssociationKind::BelongsToMany {
            junction,
            foreign_key,
            target_foreign_key,
        } => {
            let junction_info = env.lookup_collection(junction)?;
            let junction_alias = sql::helpers::make_table_alias(junction);
            let (target_link, _) = column_of(junction_info, &junction_alias, target_foreign_key)?;
            let (target_primary_key, _) = column_of(target, &alias, &target.primary_key)?;
            select
                .joins
                .push(sql::ast::Join::InnerJoin(sql::ast::InnerJoin {
                    name: root::table_name(junction_info),
                    alias: junction_alias.clone(),
                    on: sql::ast::Expression::BinaryOperation {
                        left: Box::new(target_link),
                        operator: sql::ast::BinaryOperator("=".to_string()),
                        right: Box::new(target_primary_key),
                    },
                }));
            let (key, key_type) = column_of(junction_info, &junction_alias, foreign_key)?;
            if let sql::ast::SelectList::SelectList(select_list) = &mut select.select_list {
                select_list.push((sql::helpers::make_column_alias(JUNCTION_KEY), key.clone()));
            }
            columns.push(OutputColumn {
                name: JUNCTION_KEY.to_string(),
                scalar_type: Some(key_type),
            });
            (key, key_type)
        }
    };

    let strategy = contain.strategy.unwrap_or(association.strategy);
    let parent_statement = parent_statement
        .filter(|_| strategy == LoadStrategy::Subquery && env.capabilities().subquery_eager_load);

    let (fetch, statement) = match parent_statement {
        Some(parent_statement) => {
            let parent_source = sql::helpers::make_table_alias(PARENT_SOURCE);
            let parent_keys = sql::helpers::simple_select_from(
                vec![(
                    sql::helpers::make_column_alias(&parent_key),
                    sql::helpers::aliased_column(parent_source.clone(), &parent_key),
                )],
                sql::helpers::derived_from(parent_statement.clone(), parent_source),
            );
            let predicate = std::mem::replace(&mut select.where_.0, sql::helpers::true_expr());
            select.where_ = sql::ast::Where(sql::helpers::and(
                predicate,
                sql::ast::Expression::SubqueryOperation {
                    left: Box::new(key),
                    operator: sql::ast::BinaryArrayOperator::In,
                    statement: Box::new(sql::ast::Statement::Select(Box::new(parent_keys))),
                },
            ));
            let statement = sql::ast::Statement::Select(Box::new(select));
            let compiled = CompiledStatement::new(&statement, env.capabilities(), columns);
            (Fetch::Subquery(compiled), Some(statement))
        }
        None => (
            Fetch::Keys(KeyedFetch {
                select,
                key,
                key_type,
                columns,
            }),
            None,
        ),
    };

    let children = pending_children
        .into_iter()
        .map(|pending| build_association(env, pending, statement.as_ref()))
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(AssociationPlan {
        path,
        name,
        depth,
        parent_key,
        child_key,
        cardinality: if association.kind.is_many() {
            Cardinality::Many
        } else {
            Cardinality::One
        },
        dedupe_key,
        hidden_columns,
        fetch,
        children,
    })
}

/// A column of a collection, referenced through the given alias, and its type.
fn column_of(
    info: &TableInfo,
    alias: &sql::ast::TableAlias,
    column: &str,
) -> Result<(sql::ast::Expression, ScalarType), Error> {
    info.column(column)
        .map(|found| {
            (
                sql::helpers::table_column(alias.clone(), &found.name),
                found.r#type,
            )
        })
        .ok_or_else(|| Error::ColumnNotFound {
            column: column.to_string(),
            collection: info.table_name.clone(),
        })
}
