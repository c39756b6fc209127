//! Static information about the database schema and the target SQL dialect.

pub mod metadata;
