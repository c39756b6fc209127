//! Convert a parsed configuration into the configuration used at runtime.

use std::time::Duration;

use query_engine_execution::eager::EagerLoadSettings;
use query_engine_metadata::metadata::{self, AssociationKind, Dialect};

use crate::configuration::Configuration;
use crate::environment::Environment;
use crate::error::MakeRuntimeConfigurationError;
use crate::values::{ConnectionUri, Secret};
use crate::version1::ParsedConfiguration;

/// Resolve the dialect descriptor and secrets, and check the metadata, producing the
/// configuration used to compile and run statements.
pub fn make_runtime_configuration(
    parsed_config: ParsedConfiguration,
    environment: impl Environment,
) -> Result<Configuration, MakeRuntimeConfigurationError> {
    let connection_uri = match parsed_config.connection_uri {
        ConnectionUri(Secret::Plain(uri)) => Ok(uri),
        ConnectionUri(Secret::FromEnvironment { variable }) => {
            environment.read(&variable).map_err(|error| {
                MakeRuntimeConfigurationError::MissingEnvironmentVariable {
                    attempted_to_resolve: "the connection URI".to_string(),
                    message: error.to_string(),
                }
            })
        }
    }?;

    let mut dialect = Dialect::new(parsed_config.dialect);
    dialect
        .capabilities
        .apply(&parsed_config.capability_overrides);
    dialect.functions.extend(&parsed_config.function_overrides);
    dialect.functions.validate().map_err(|(function, error)| {
        MakeRuntimeConfigurationError::InvalidFunctionTemplate { function, error }
    })?;

    validate_metadata(&parsed_config.metadata)?;

    if parsed_config.eager_load.concurrency_limit == 0 {
        return Err(MakeRuntimeConfigurationError::InvalidConcurrencyLimit);
    }

    Ok(Configuration {
        dialect,
        metadata: parsed_config.metadata,
        eager_load: EagerLoadSettings {
            concurrency_limit: parsed_config.eager_load.concurrency_limit,
            fetch_timeout: Duration::from_millis(parsed_config.eager_load.fetch_timeout_ms),
        },
        connection_uri,
    })
}

/// Check that primary keys and association keys name known columns of known collections.
fn validate_metadata(metadata: &metadata::Metadata) -> Result<(), MakeRuntimeConfigurationError> {
    let invalid = |collection: &str, message: String| MakeRuntimeConfigurationError::InvalidMetadata {
        collection: collection.to_string(),
        message,
    };
    let require_column = |collection: &str, column: &str| {
        match metadata.table(collection) {
            None => Err(invalid(collection, "unknown collection".to_string())),
            Some(info) if info.column(column).is_none() => {
                Err(invalid(collection, format!("unknown column '{column}'")))
            }
            Some(_) => Ok(()),
        }
    };

    for (name, info) in &metadata.tables.0 {
        require_column(name, &info.primary_key)?;

        for (association_name, association) in &info.associations {
            let target = metadata.table(&association.target).ok_or_else(|| {
                invalid(
                    name,
                    format!(
                        "association '{association_name}' targets unknown collection '{}'",
                        association.target
                    ),
                )
            })?;
            match &association.kind {
                AssociationKind::BelongsTo { foreign_key } => {
                    require_column(name, foreign_key)?;
                }
                AssociationKind::HasOne { foreign_key } | AssociationKind::HasMany { foreign_key } => {
                    require_column(&association.target, foreign_key)?;
                }
                AssociationKind::BelongsToMany {
                    junction,
                    foreign_key,
                    target_foreign_key,
                } => {
                    require_column(junction, foreign_key)?;
                    require_column(junction, target_foreign_key)?;
                }
            }
            require_column(&association.target, &target.primary_key)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{FixedEnvironment, Variable};
    use query_engine_metadata::metadata::{DialectName, FunctionTemplate, ReturnType};

    fn parsed(value: serde_json::Value) -> ParsedConfiguration {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn resolves_the_connection_uri_from_the_environment() {
        let configuration = make_runtime_configuration(
            parsed(serde_json::json!({
                "version": "1",
                "dialect": "sqlite",
                "connectionUri": { "variable": "DATABASE_URI" }
            })),
            FixedEnvironment::from([(Variable::from("DATABASE_URI"), "sqlite::memory:".to_string())]),
        )
        .unwrap();

        assert_eq!(configuration.connection_uri, "sqlite::memory:");
        assert_eq!(configuration.dialect.name, DialectName::Sqlite);
        assert_eq!(configuration.eager_load, EagerLoadSettings::default());
    }

    #[test]
    fn missing_variables_are_reported() {
        let result = make_runtime_configuration(
            parsed(serde_json::json!({
                "version": "1",
                "dialect": "sqlite",
                "connectionUri": { "variable": "DATABASE_URI" }
            })),
            FixedEnvironment::default(),
        );
        assert!(matches!(
            result,
            Err(MakeRuntimeConfigurationError::MissingEnvironmentVariable { .. })
        ));
    }

    #[test]
    fn overrides_are_applied_once() {
        let mut parsed_config = parsed(serde_json::json!({
            "version": "1",
            "dialect": "oracle",
            "capabilityOverrides": { "maxInListSize": 2 },
            "connectionUri": "oracle://localhost"
        }));
        parsed_config.function_overrides.insert(
            "reverse".to_string(),
            FunctionTemplate::new("REVERSE($1)", ReturnType::Argument(1)),
        );

        let configuration =
            make_runtime_configuration(parsed_config, FixedEnvironment::default()).unwrap();

        assert_eq!(configuration.dialect.capabilities.max_in_list_size, Some(2));
        assert!(configuration.dialect.functions.get("reverse").is_some());
        assert!(configuration.dialect.functions.get("to_string").is_some());
    }

    #[test]
    fn broken_function_templates_are_rejected() {
        let mut parsed_config = parsed(serde_json::json!({
            "version": "1",
            "dialect": "postgres",
            "connectionUri": "postgres://localhost"
        }));
        parsed_config.function_overrides.insert(
            "broken".to_string(),
            FunctionTemplate::new("BROKEN($0)", ReturnType::Unknown),
        );

        let result = make_runtime_configuration(parsed_config, FixedEnvironment::default());
        assert!(matches!(
            result,
            Err(MakeRuntimeConfigurationError::InvalidFunctionTemplate { function, .. })
                if function == "broken"
        ));
    }

    #[test]
    fn associations_must_name_known_columns() {
        let result = make_runtime_configuration(
            parsed(serde_json::json!({
                "version": "1",
                "dialect": "sqlite",
                "connectionUri": "sqlite::memory:",
                "metadata": {
                    "tables": {
                        "articles": {
                            "tableName": "articles",
                            "primaryKey": "id",
                            "columns": {
                                "id": { "name": "id", "type": "integer" }
                            },
                            "associations": {
                                "author": {
                                    "target": "authors",
                                    "kind": "belongsTo",
                                    "foreignKey": "author_id"
                                }
                            }
                        }
                    }
                }
            })),
            FixedEnvironment::default(),
        );
        assert!(matches!(
            result,
            Err(MakeRuntimeConfigurationError::InvalidMetadata { collection, .. })
                if collection == "articles"
        ));
    }
}
