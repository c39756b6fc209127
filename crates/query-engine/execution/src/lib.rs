//! Run compiled statements through a driver and hydrate the results.

pub mod driver;
pub mod eager;
pub mod error;
pub mod metrics;
pub mod query;
