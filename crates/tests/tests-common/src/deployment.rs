//! Deployment functions used across test cases.

use std::path::PathBuf;

use dialect_compat_configuration::environment::EmptyEnvironment;
use dialect_compat_configuration::{make_runtime_configuration, parse_configuration, Configuration};
use query_engine_metadata::metadata::DialectName;

/// The directory holding the configuration of the fixture database.
pub const FIXTURE_CONFIGURATION_DIRECTORY: &str = "static/fixtures";

/// Find the project root via the crate root provided by `cargo test`,
/// and get a path relative to it.
/// This depends on the convention that this crate lives in `/crates/tests/<name>`
/// and will break in the unlikely case that we change this
pub fn get_path_from_project_root(path: &str) -> PathBuf {
    let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    d.push("../../../");
    d.push(path);
    d
}

/// Load the fixture configuration, targeting the given dialect instead of the
/// configured one when asked to.
pub async fn load_configuration(dialect: Option<DialectName>) -> anyhow::Result<Configuration> {
    let mut parsed =
        parse_configuration(get_path_from_project_root(FIXTURE_CONFIGURATION_DIRECTORY)).await?;
    if let Some(dialect) = dialect {
        parsed.dialect = dialect;
    }
    Ok(make_runtime_configuration(parsed, EmptyEnvironment)?)
}
