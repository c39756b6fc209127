//! Compile statements of the query model for a dialect, or run them against the
//! configured database.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialect_compat_configuration::environment::ProcessEnvironment;
use dialect_compat_configuration::{
    generate_latest_schema, make_runtime_configuration, parse_configuration, Configuration,
};
use query_engine_execution::driver::SqliteDriver;
use query_engine_execution::metrics::Metrics;
use query_engine_metadata::metadata::DialectName;
use query_engine_models::Statement;
use query_engine_translation::translation::helpers::Env;
use query_engine_translation::translation::query;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the SQL and bound parameters a statement compiles to.
    Compile {
        #[arg(long, value_name = "DIRECTORY", env = "DIALECT_COMPAT_CONFIGURATION_DIRECTORY")]
        configuration: PathBuf,
        /// A JSON file holding the statement.
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
        /// Compile a statement counting the rows of the request instead.
        #[arg(long)]
        count: bool,
    },
    /// Run a statement, loading its associations, and print the rows as JSON.
    /// An insert prints the number of rows written.
    Fetch {
        #[arg(long, value_name = "DIRECTORY", env = "DIALECT_COMPAT_CONFIGURATION_DIRECTORY")]
        configuration: PathBuf,
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },
    /// Print the JSON schema of the configuration format.
    PrintSchema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Compile {
            configuration,
            request,
            count,
        } => compile(&configuration, &request, count).await,
        Command::Fetch {
            configuration,
            request,
        } => fetch(&configuration, &request).await,
        Command::PrintSchema => {
            println!("{}", serde_json::to_string_pretty(&generate_latest_schema())?);
            Ok(())
        }
    }
}

async fn compile(configuration_dir: &Path, request: &Path, count: bool) -> anyhow::Result<()> {
    let configuration = load_configuration(configuration_dir).await?;
    let statement = read_statement(request).await?;
    let env = Env::new(&configuration.metadata, &configuration.dialect);

    let compiled = if count {
        query::compile_count(&env, &statement)?
    } else {
        query::compile(&env, &statement)?
    };
    println!("{}", compiled.pretty());
    Ok(())
}

async fn fetch(configuration_dir: &Path, request: &Path) -> anyhow::Result<()> {
    let configuration = load_configuration(configuration_dir).await?;
    if configuration.dialect.name != DialectName::Sqlite {
        anyhow::bail!(
            "only sqlite databases can be queried, the configuration targets {}",
            configuration.dialect.name
        );
    }
    let statement = read_statement(request).await?;

    let driver = SqliteDriver::connect(&configuration.connection_uri).await?;
    let mut registry = prometheus::Registry::new();
    let metrics = Metrics::initialize(&mut registry)?;
    let env = Env::new(&configuration.metadata, &configuration.dialect);

    if let Statement::Insert(insert) = &statement {
        let written = query_engine_execution::query::insert(&driver, &metrics, &env, insert).await?;
        tracing::info!(rows = written, "inserted");
        println!("{}", serde_json::json!({ "written": written }));
        return Ok(());
    }

    let entities = query_engine_execution::query::execute(
        &driver,
        &metrics,
        &env,
        &configuration.eager_load,
        &statement,
    )
    .await?;
    tracing::info!(
        rows = entities.len(),
        statements = metrics.statements_total.get(),
        "fetched"
    );
    println!("{}", serde_json::to_string_pretty(&entities)?);
    Ok(())
}

async fn load_configuration(configuration_dir: &Path) -> anyhow::Result<Configuration> {
    let parsed = parse_configuration(configuration_dir)
        .await
        .with_context(|| format!("reading configuration from {}", configuration_dir.display()))?;
    Ok(make_runtime_configuration(parsed, ProcessEnvironment)?)
}

async fn read_statement(request: &Path) -> anyhow::Result<Statement> {
    let contents = tokio::fs::read_to_string(request)
        .await
        .with_context(|| format!("reading {}", request.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", request.display()))
}
