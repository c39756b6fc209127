//! Common functions used across test cases.

pub mod counting_driver;
pub mod deployment;
pub mod fixtures;
