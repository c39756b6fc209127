use std::path::PathBuf;

use dialect_compat_configuration::environment::EmptyEnvironment;
use dialect_compat_configuration::{
    generate_latest_schema, make_runtime_configuration, parse_configuration,
};
use query_engine_metadata::metadata::DialectName;

fn fixture_directory() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../static/fixtures")
}

#[test]
fn fixture_configuration_matches_the_schema() {
    let schema = serde_json::to_value(generate_latest_schema()).unwrap();
    let compiled = jsonschema::JSONSchema::compile(&schema).unwrap();

    let contents = std::fs::read_to_string(fixture_directory().join("configuration.json")).unwrap();
    let instance: serde_json::Value = serde_json::from_str(&contents).unwrap();

    if let Err(errors) = compiled.validate(&instance) {
        let messages: Vec<String> = errors.map(|error| error.to_string()).collect();
        panic!("fixture configuration does not match the schema: {messages:?}");
    };
}

#[tokio::test]
async fn fixture_configuration_resolves_for_every_dialect() {
    for dialect in [DialectName::Oracle, DialectName::Sqlite, DialectName::Postgres] {
        let mut parsed = parse_configuration(fixture_directory()).await.unwrap();
        parsed.dialect = dialect;
        let configuration = make_runtime_configuration(parsed, EmptyEnvironment).unwrap();

        assert_eq!(configuration.dialect.name, dialect);
        assert_eq!(configuration.connection_uri, "sqlite::memory:");
        assert_eq!(configuration.eager_load.concurrency_limit, 4);
        assert!(configuration.metadata.table("articles").is_some());
    }
}
