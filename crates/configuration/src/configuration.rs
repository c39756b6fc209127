//! Configuration for the query engine.

use query_engine_execution::eager::EagerLoadSettings;
use query_engine_metadata::metadata;
use schemars::schema::RootSchema;

use crate::version1::ParsedConfiguration;

/// The 'Configuration' type collects all the information necessary to compile and run
/// statements at runtime.
///
/// Values of this type are produced from a 'ParsedConfiguration' using
/// 'make_runtime_configuration', which resolves the dialect descriptor once.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub dialect: metadata::Dialect,
    pub metadata: metadata::Metadata,
    pub eager_load: EagerLoadSettings,
    pub connection_uri: String,
}

/// The JSON schema of the latest configuration format.
pub fn generate_latest_schema() -> RootSchema {
    schemars::schema_for!(ParsedConfiguration)
}
