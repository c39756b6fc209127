//! Version 1 of the configuration format.

use std::collections::BTreeMap;
use std::path::Path;

use query_engine_metadata::metadata::{self, CapabilityOverrides, DialectName, FunctionTemplate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::environment::Variable;
use crate::error::{ParseConfigurationError, WriteParsedConfigurationError};
use crate::values::{ConnectionUri, Secret};

pub const CONFIGURATION_FILENAME: &str = "configuration.json";
pub const CONFIGURATION_JSONSCHEMA_FILENAME: &str = "schema.json";
pub const DEFAULT_CONNECTION_URI_VARIABLE: &str = "DIALECT_COMPAT_CONNECTION_URI";

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize, JsonSchema)]
pub enum Version {
    #[serde(rename = "1")]
    This,
}

/// The configuration as it is written on disk.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedConfiguration {
    /// Which version of the configuration format are we using
    pub version: Version,
    /// The dialect statements are compiled for.
    pub dialect: DialectName,
    /// Capabilities that differ from the dialect's defaults.
    #[serde(default, skip_serializing_if = "CapabilityOverrides::is_empty")]
    pub capability_overrides: CapabilityOverrides,
    /// Function templates added to, or replacing those of, the dialect's function table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub function_overrides: BTreeMap<String, FunctionTemplate>,
    #[serde(default)]
    pub eager_load: EagerLoadConfiguration,
    pub connection_uri: ConnectionUri,
    #[serde(default)]
    pub metadata: metadata::Metadata,
}

/// Limits applied while loading associations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EagerLoadConfiguration {
    /// Association fetches of one depth level running at the same time.
    #[serde(default = "concurrency_limit_default")]
    pub concurrency_limit: usize,
    /// Time allowed for each association fetch, in milliseconds.
    #[serde(default = "fetch_timeout_ms_default")]
    pub fetch_timeout_ms: u64,
}

impl Default for EagerLoadConfiguration {
    fn default() -> Self {
        Self {
            concurrency_limit: concurrency_limit_default(),
            fetch_timeout_ms: fetch_timeout_ms_default(),
        }
    }
}

fn concurrency_limit_default() -> usize {
    4
}

fn fetch_timeout_ms_default() -> u64 {
    30_000
}

impl ParsedConfiguration {
    pub fn initial(dialect: DialectName) -> Self {
        Self {
            version: Version::This,
            dialect,
            capability_overrides: CapabilityOverrides::default(),
            function_overrides: BTreeMap::new(),
            eager_load: EagerLoadConfiguration::default(),
            connection_uri: ConnectionUri(Secret::FromEnvironment {
                variable: Variable::from(DEFAULT_CONNECTION_URI_VARIABLE),
            }),
            metadata: metadata::Metadata::empty(),
        }
    }
}

/// Parse the configuration format from a directory.
pub async fn parse_configuration(
    configuration_dir: impl AsRef<Path>,
) -> Result<ParsedConfiguration, ParseConfigurationError> {
    let configuration_file = configuration_dir.as_ref().join(CONFIGURATION_FILENAME);

    let configuration_file_contents =
        fs::read_to_string(&configuration_file)
            .await
            .map_err(|err| {
                ParseConfigurationError::IoErrorButStringified(format!(
                    "{}: {}",
                    &configuration_file.display(),
                    err
                ))
            })?;

    let parsed_config: ParsedConfiguration = serde_json::from_str(&configuration_file_contents)
        .map_err(|error| ParseConfigurationError::ParseError {
            file_path: configuration_file.clone(),
            line: error.line(),
            column: error.column(),
            message: error.to_string(),
        })?;

    tracing::debug!(
        dialect = %parsed_config.dialect,
        collections = parsed_config.metadata.tables.0.len(),
        "parsed configuration"
    );

    Ok(parsed_config)
}

/// Write the parsed configuration into a directory on disk, along with its schema.
pub async fn write_parsed_configuration(
    parsed_config: ParsedConfiguration,
    out_dir: impl AsRef<Path>,
) -> Result<(), WriteParsedConfigurationError> {
    let configuration_file = out_dir.as_ref().to_owned().join(CONFIGURATION_FILENAME);
    fs::create_dir_all(out_dir.as_ref()).await?;

    // create the configuration file
    fs::write(
        configuration_file,
        serde_json::to_string_pretty(&parsed_config)
            .map_err(|e| WriteParsedConfigurationError::IoError(e.into()))?
            + "\n",
    )
    .await?;

    // create the jsonschema file
    let configuration_jsonschema_file_path = out_dir
        .as_ref()
        .to_owned()
        .join(CONFIGURATION_JSONSCHEMA_FILENAME);

    let output = schemars::schema_for!(ParsedConfiguration);
    fs::write(
        &configuration_jsonschema_file_path,
        serde_json::to_string_pretty(&output)
            .map_err(|e| WriteParsedConfigurationError::IoError(e.into()))?
            + "\n",
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eager_load_settings_have_defaults() {
        let parsed: ParsedConfiguration = serde_json::from_value(serde_json::json!({
            "version": "1",
            "dialect": "oracle",
            "connectionUri": { "variable": "ORACLE_URI" }
        }))
        .unwrap();

        assert_eq!(parsed.eager_load, EagerLoadConfiguration::default());
        assert_eq!(
            parsed.connection_uri,
            ConnectionUri(Secret::FromEnvironment {
                variable: Variable::from("ORACLE_URI")
            })
        );
    }

    #[test]
    fn rejects_unknown_versions() {
        let parsed = serde_json::from_value::<ParsedConfiguration>(serde_json::json!({
            "version": "2",
            "dialect": "sqlite",
            "connectionUri": "sqlite::memory:"
        }));
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn written_configuration_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut parsed = ParsedConfiguration::initial(DialectName::Postgres);
        parsed.eager_load.concurrency_limit = 2;

        write_parsed_configuration(parsed.clone(), dir.path())
            .await
            .unwrap();

        assert_eq!(parse_configuration(dir.path()).await.unwrap(), parsed);
        assert!(dir.path().join(CONFIGURATION_JSONSCHEMA_FILENAME).exists());
    }
}
