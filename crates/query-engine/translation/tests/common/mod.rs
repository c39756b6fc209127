//! Common functions used across test cases.

use std::fs;
use std::path::PathBuf;

use dialect_compat_configuration::environment::EmptyEnvironment;
use dialect_compat_configuration::Configuration;
use query_engine_metadata::metadata::DialectName;
use query_engine_models::Statement;
use query_engine_sql::sql::execution_plan::CompiledStatement;
use query_engine_translation::translation::error::Error;
use query_engine_translation::translation::helpers::Env;
use query_engine_translation::translation::query;
use serde::Deserialize;

/// The fixture configuration, relative to this crate.
const CONFIGURATION_DIRECTORY: &str = "../../../static/fixtures";

/// A golden request: a statement and the dialect to compile it for.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub dialect: DialectName,
    pub statement: Statement,
    /// Compile a statement counting the rows instead.
    #[serde(default)]
    pub count: bool,
}

/// Load the fixture configuration, targeting the given dialect.
pub async fn configuration(dialect: DialectName) -> anyhow::Result<Configuration> {
    let mut parsed = dialect_compat_configuration::parse_configuration(CONFIGURATION_DIRECTORY).await?;
    parsed.dialect = dialect;
    Ok(dialect_compat_configuration::make_runtime_configuration(
        parsed,
        EmptyEnvironment,
    )?)
}

/// Compile a statement for a dialect against the fixture metadata.
pub async fn compile(dialect: DialectName, statement: &Statement) -> anyhow::Result<Result<CompiledStatement, Error>> {
    let configuration = configuration(dialect).await?;
    let env = Env::new(&configuration.metadata, &configuration.dialect);
    Ok(query::compile(&env, statement))
}

/// Translate a golden request, returning the SQL followed by its parameters.
pub async fn test_translation(testname: &str) -> anyhow::Result<String> {
    let directory = PathBuf::from("tests/goldenfiles").join(testname);
    let request: Request =
        serde_json::from_str(&fs::read_to_string(directory.join("request.json"))?)?;

    let configuration = configuration(request.dialect).await?;
    let env = Env::new(&configuration.metadata, &configuration.dialect);

    let compiled = if request.count {
        query::compile_count(&env, &request.statement)?
    } else {
        query::compile(&env, &request.statement)?
    };
    Ok(render(&compiled))
}

/// The SQL text, then one line per bound parameter.
pub fn render(compiled: &CompiledStatement) -> String {
    if compiled.params.is_empty() {
        return compiled.sql.clone();
    }
    let params = compiled
        .params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\n{}", compiled.sql, params)
}
