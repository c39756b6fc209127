//! The generic query model accepted by the query engine.
//!
//! A query is an immutable tree describing what to select, independent of the
//! database it will run against. It can be built in Rust with the functions in
//! [`builder`], or deserialized from JSON.

pub mod builder;
pub mod query;
pub mod value;

pub use builder::*;
pub use query::*;
pub use value::Value;
