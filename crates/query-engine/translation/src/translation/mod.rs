//! Translate statements of the query model to SQL for a dialect.

pub mod coercion;
pub mod eager;
pub mod error;
pub mod helpers;
pub mod query;
