//! Errors for query translation.

use query_engine_metadata::metadata::{
    Arity, ComparisonOperator, DialectName, ScalarType, TemplateError,
};
use thiserror::Error;

use super::coercion::TypeConversionError;

/// A type for translation errors.
///
/// All of these are raised before anything is sent to the database.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{construct} is not supported by the {dialect} dialect")]
    UnsupportedConstruct {
        dialect: DialectName,
        construct: String,
    },
    #[error("branch {branch} of the set operation selects {found} columns, but {expected} are expected")]
    ProjectionMismatch {
        branch: usize,
        expected: usize,
        found: usize,
    },
    #[error("a set operation needs at least two queries, got {0}")]
    NotEnoughBranches(usize),
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),
    #[error("column '{column}' not found in '{collection}'")]
    ColumnNotFound { column: String, collection: String },
    #[error("association '{association}' not found on collection '{collection}'")]
    AssociationNotFound {
        association: String,
        collection: String,
    },
    #[error("function '{function}' takes {expected} arguments, got {found}")]
    ArgumentCount {
        function: String,
        expected: Arity,
        found: usize,
    },
    #[error("invalid template for function '{function}': {error}")]
    InvalidTemplate {
        function: String,
        error: TemplateError,
    },
    #[error("operator {operator:?} cannot be applied to {scalar_type}")]
    UnsupportedOperator {
        operator: ComparisonOperator,
        scalar_type: ScalarType,
    },
    #[error("binding '{0}' has no value")]
    BindingNotFound(String),
    #[error("no fields to select from a query without a source")]
    NoFields,
    #[error("nothing to insert into '{0}'")]
    EmptyInsert(String),
    #[error("{0}")]
    TypeConversion(#[from] TypeConversionError),
}
