//! Metadata information regarding the database and tracked information.

pub mod associations;
pub mod database;
pub mod dialect;
pub mod functions;

// re-export without modules
pub use associations::*;
pub use database::*;
pub use dialect::*;
pub use functions::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata information.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    pub tables: TablesInfo,
}

impl Metadata {
    pub fn empty() -> Self {
        Metadata {
            tables: TablesInfo::empty(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.0.get(name)
    }
}
