//! Errors that can be thrown when processing configuration.

use std::path::PathBuf;

use query_engine_metadata::metadata::TemplateError;

/// The errors that can be thrown when parsing a configuration directory.
#[derive(Debug, thiserror::Error)]
pub enum ParseConfigurationError {
    #[error("parse error on {file_path}:{line}:{column}: {message}")]
    ParseError {
        file_path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("I/O error: {0}")]
    IoErrorButStringified(String),
}

/// The errors that can be thrown when writing a configuration directory.
#[derive(Debug, thiserror::Error)]
pub enum WriteParsedConfigurationError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// The errors that can be thrown when turning a parsed configuration into a runtime one.
#[derive(Debug, thiserror::Error)]
pub enum MakeRuntimeConfigurationError {
    #[error("missing environment variable when processing {attempted_to_resolve}: {message}")]
    MissingEnvironmentVariable {
        attempted_to_resolve: String,
        message: String,
    },
    #[error("invalid template for function '{function}': {error}")]
    InvalidFunctionTemplate {
        function: String,
        error: TemplateError,
    },
    #[error("collection '{collection}': {message}")]
    InvalidMetadata { collection: String, message: String },
    #[error("the eager load concurrency limit must be at least 1")]
    InvalidConcurrencyLimit,
}
