//! Load associations planned by the translator.
//!
//! Associations are loaded one depth level at a time. Every association at a level
//! costs one round trip, whatever the number of parent rows, and the fetches of a
//! level run concurrently up to the configured limit. Rows are merged into their
//! parents once every level is loaded, so a failed fetch leaves nothing half merged.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use indexmap::IndexMap;
use query_engine_models::Value;
use query_engine_sql::sql::execution_plan::CompiledStatement;
use query_engine_translation::translation::eager::{
    AssociationPlan, Cardinality, EagerPlan, Fetch,
};
use query_engine_translation::translation::helpers::Env;
use serde::Serialize;
use tracing::{info_span, Instrument};

use crate::driver::Driver;
use crate::error::Error;
use crate::metrics;
use crate::query::{fetch_rows, Row};

/// The path under which the root rows are kept.
const ROOT: &str = "";

/// Limits applied while loading associations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EagerLoadSettings {
    /// Fetches of one level running at the same time.
    pub concurrency_limit: usize,
    /// Time allowed for each fetch.
    pub fetch_timeout: Duration,
}

impl Default for EagerLoadSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Where an association is in its loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Planned,
    KeysCollected,
    ChildrenFetched,
    Merged,
    Failed,
}

/// A row with the associations loaded for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
    #[serde(flatten)]
    pub related: IndexMap<String, Related>,
}

impl Entity {
    fn from_row(fields: Row) -> Self {
        Self {
            fields,
            related: IndexMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn related(&self, association: &str) -> Option<&Related> {
        self.related.get(association)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Related {
    One(Option<Box<Entity>>),
    Many(Vec<Entity>),
}

impl Related {
    /// The associated rows, whatever the cardinality.
    pub fn entities(&self) -> Vec<&Entity> {
        match self {
            Related::One(entity) => entity.iter().map(|entity| &**entity).collect(),
            Related::Many(entities) => entities.iter().collect(),
        }
    }
}

/// Runs an eager load plan, tracking the state of each association.
pub struct EagerLoader<'a> {
    driver: &'a dyn Driver,
    env: Env<'a>,
    settings: &'a EagerLoadSettings,
    metrics: &'a metrics::Metrics,
    states: BTreeMap<String, LoadState>,
}

impl<'a> EagerLoader<'a> {
    pub fn new(
        driver: &'a dyn Driver,
        env: Env<'a>,
        settings: &'a EagerLoadSettings,
        metrics: &'a metrics::Metrics,
    ) -> Self {
        Self {
            driver,
            env,
            settings,
            metrics,
            states: BTreeMap::new(),
        }
    }

    /// The state of the association at `path`, once loading has started.
    pub fn state(&self, path: &str) -> Option<LoadState> {
        self.states.get(path).copied()
    }

    pub async fn load(&mut self, plan: &EagerPlan) -> Result<Vec<Entity>, Error> {
        let root_rows = fetch_rows(
            self.driver,
            self.metrics,
            self.env.capabilities(),
            &plan.root,
            ROOT,
            0,
        )
        .instrument(info_span!("Fetch root rows"))
        .await?;

        let levels = levels(&plan.associations);
        for node in levels.iter().flatten() {
            self.states.insert(node.path.clone(), LoadState::Planned);
        }

        let mut rows: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        rows.insert(ROOT.to_string(), root_rows);

        for level in &levels {
            let fetched = match self.fetch_level(level, &rows).await {
                Ok(fetched) => fetched,
                Err(error) => {
                    self.metrics.eager_failures_total.inc();
                    if let Some(path) = error.path() {
                        self.states.insert(path.to_string(), LoadState::Failed);
                    }
                    tracing::error!(error = %error, "eager load aborted");
                    return Err(error);
                }
            };
            for (path, child_rows) in fetched {
                self.states.insert(path.clone(), LoadState::ChildrenFetched);
                rows.insert(path, child_rows);
            }
        }

        let mut entities: BTreeMap<String, Vec<Entity>> = rows
            .into_iter()
            .map(|(path, rows)| (path, rows.into_iter().map(Entity::from_row).collect()))
            .collect();

        for node in levels.iter().rev().flatten() {
            let children = entities.remove(&node.path).unwrap_or_default();
            if let Some(parents) = entities.get_mut(parent_path(&node.path)) {
                merge(node, parents, children);
            }
            self.states.insert(node.path.clone(), LoadState::Merged);
        }

        let mut root = entities.remove(ROOT).unwrap_or_default();
        for entity in &mut root {
            strip(entity, &plan.hidden_columns);
        }
        Ok(root)
    }

    /// Fetch every association of one depth level.
    async fn fetch_level(
        &mut self,
        level: &[&AssociationPlan],
        rows: &BTreeMap<String, Vec<Row>>,
    ) -> Result<Vec<(String, Vec<Row>)>, Error> {
        let mut statements = Vec::with_capacity(level.len());
        let mut fetched = vec![];

        for node in level {
            let parent_rows = rows
                .get(parent_path(&node.path))
                .map_or(&[][..], Vec::as_slice);
            let keys = collect_keys(parent_rows, &node.parent_key);
            self.states
                .insert(node.path.clone(), LoadState::KeysCollected);

            if keys.is_empty() {
                fetched.push((node.path.clone(), vec![]));
                continue;
            }
            let statement = match &node.fetch {
                Fetch::Subquery(statement) => statement.clone(),
                Fetch::Keys(keyed) => match keyed.compile_with_keys(&self.env, &keys) {
                    Ok(statement) => statement,
                    Err(error) => {
                        self.states.insert(node.path.clone(), LoadState::Failed);
                        return Err(error.into());
                    }
                },
            };
            statements.push((*node, statement));
        }

        let driver = self.driver;
        let metrics = self.metrics;
        let capabilities = self.env.capabilities();
        let timeout = self.settings.fetch_timeout;

        let results = futures::stream::iter(statements.into_iter().map(|(node, statement)| {
            fetch_association(driver, metrics, capabilities, node, statement, timeout)
        }))
        .buffer_unordered(self.settings.concurrency_limit.max(1))
        .try_collect::<Vec<_>>()
        .await?;

        fetched.extend(results);
        Ok(fetched)
    }
}

async fn fetch_association(
    driver: &dyn Driver,
    metrics: &metrics::Metrics,
    capabilities: &query_engine_metadata::metadata::Capabilities,
    node: &AssociationPlan,
    statement: CompiledStatement,
    timeout: Duration,
) -> Result<(String, Vec<Row>), Error> {
    metrics.eager_round_trips_total.inc();
    let fetch = fetch_rows(
        driver,
        metrics,
        capabilities,
        &statement,
        &node.path,
        node.depth,
    )
    .instrument(info_span!("Fetch association", path = %node.path, depth = node.depth));

    match tokio::time::timeout(timeout, fetch).await {
        Ok(rows) => Ok((node.path.clone(), rows?)),
        Err(_) => Err(Error::Timeout {
            path: node.path.clone(),
            depth: node.depth,
            timeout_ms: timeout.as_millis(),
        }),
    }
}

/// Group the association nodes by depth, shallowest first.
fn levels(associations: &[AssociationPlan]) -> Vec<Vec<&AssociationPlan>> {
    let mut levels = vec![];
    let mut current: Vec<&AssociationPlan> = associations.iter().collect();
    while !current.is_empty() {
        let next = current
            .iter()
            .copied()
            .flat_map(|node| node.children.iter())
            .collect();
        levels.push(current);
        current = next;
    }
    levels
}

fn parent_path(path: &str) -> &str {
    path.rsplit_once('.').map_or(ROOT, |(parent, _)| parent)
}

/// Identity of a key, so that equal keys from different rows are collected once.
fn key_identity(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// The distinct non-null values of a column, in the order they first appear.
fn collect_keys(rows: &[Row], column: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|value| !value.is_null())
        .filter(|value| seen.insert(key_identity(value)))
        .cloned()
        .collect()
}

/// Attach the rows of an association to their parents.
fn merge(node: &AssociationPlan, parents: &mut [Entity], children: Vec<Entity>) {
    let mut groups: BTreeMap<String, Vec<Entity>> = BTreeMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for mut child in children {
        let Some(key) = child.get(&node.child_key).map(key_identity) else {
            continue;
        };
        if let Some(dedupe_key) = &node.dedupe_key {
            let identity = child.get(dedupe_key).map(key_identity).unwrap_or_default();
            if !seen.insert((key.clone(), identity)) {
                continue;
            }
        }
        strip(&mut child, &node.hidden_columns);
        groups.entry(key).or_default().push(child);
    }

    for parent in parents {
        let group = parent
            .get(&node.parent_key)
            .filter(|value| !value.is_null())
            .and_then(|value| groups.get(&key_identity(value)))
            .cloned()
            .unwrap_or_default();
        let related = match node.cardinality {
            Cardinality::One => Related::One(group.into_iter().next().map(Box::new)),
            Cardinality::Many => Related::Many(group),
        };
        parent.related.insert(node.name.clone(), related);
    }
}

fn strip(entity: &mut Entity, hidden_columns: &[String]) {
    for column in hidden_columns {
        entity.fields.shift_remove(column);
    }
}
