//! Errors for query execution.

use query_engine_metadata::metadata::DialectName;
use query_engine_translation::translation::coercion::TypeConversionError;
use query_engine_translation::translation::error::Error as TranslationError;
use thiserror::Error;

use crate::driver::DriverError;

/// Query execution error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Translation(#[from] TranslationError),
    /// A round trip failed. The root statement has an empty path and depth 0.
    #[error("fetching '{path}' (depth {depth}) failed: {source}")]
    Fetch {
        path: String,
        depth: usize,
        #[source]
        source: DriverError,
    },
    #[error("fetching '{path}' (depth {depth}) timed out after {timeout_ms}ms")]
    Timeout {
        path: String,
        depth: usize,
        timeout_ms: u128,
    },
    #[error("writing to '{collection}' failed: {source}")]
    Write {
        collection: String,
        #[source]
        source: DriverError,
    },
    #[error("unable to decode a row: {0}")]
    Decode(#[from] TypeConversionError),
    #[error("statements compiled for {dialect} cannot run on a {driver} driver")]
    DialectMismatch {
        dialect: DialectName,
        driver: DialectName,
    },
}

impl Error {
    /// The association path of the fetch that failed, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Fetch { path, .. } | Error::Timeout { path, .. } => Some(path),
            Error::Translation(_)
            | Error::Write { .. }
            | Error::Decode(_)
            | Error::DialectMismatch { .. } => None,
        }
    }
}
