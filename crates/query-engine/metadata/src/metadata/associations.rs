//! Associations between collections, used to eager load related rows.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A declared association from one collection to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    /// The collection holding the associated rows.
    pub target: String,
    #[serde(flatten)]
    pub kind: AssociationKind,
    #[serde(default)]
    pub strategy: LoadStrategy,
}

/// How the two collections are linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AssociationKind {
    /// The source row holds `foreign_key`, pointing at the target's primary key.
    #[serde(rename_all = "camelCase")]
    BelongsTo { foreign_key: String },
    /// The target row holds `foreign_key`, pointing at the source's primary key.
    #[serde(rename_all = "camelCase")]
    HasOne { foreign_key: String },
    /// Like `HasOne`, but any number of target rows may point at the source row.
    #[serde(rename_all = "camelCase")]
    HasMany { foreign_key: String },
    /// Rows are linked through a junction collection holding `foreign_key`
    /// (pointing at the source) and `target_foreign_key` (pointing at the target).
    #[serde(rename_all = "camelCase")]
    BelongsToMany {
        junction: String,
        foreign_key: String,
        target_foreign_key: String,
    },
}

impl AssociationKind {
    /// Whether each source row owns a sequence of target rows.
    pub fn is_many(&self) -> bool {
        matches!(
            self,
            AssociationKind::HasMany { .. } | AssociationKind::BelongsToMany { .. }
        )
    }
}

/// How associated rows are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum LoadStrategy {
    /// Collect the owning keys from the parent rows and fetch children with an IN list.
    #[default]
    Select,
    /// Filter the children with a subquery over the parent query, keeping keys in the database.
    Subquery,
}
