//! Read values from the environment the configuration is used in.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The name of an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, JsonSchema)]
pub struct Variable(String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("the environment variable {0} is not set")]
    VariableNotPresent(Variable),
    #[error("the environment variable {0} is not valid unicode")]
    NonUnicodeValue(Variable),
}

/// A source of environment variables.
pub trait Environment {
    fn read(&self, variable: &Variable) -> Result<String, Error>;
}

/// The environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        std::env::var(&variable.0).map_err(|error| match error {
            std::env::VarError::NotPresent => Error::VariableNotPresent(variable.clone()),
            std::env::VarError::NotUnicode(_) => Error::NonUnicodeValue(variable.clone()),
        })
    }
}

/// A fixed set of variables, for tests.
#[derive(Debug, Clone, Default)]
pub struct FixedEnvironment(BTreeMap<Variable, String>);

impl<const N: usize> From<[(Variable, String); N]> for FixedEnvironment {
    fn from(value: [(Variable, String); N]) -> Self {
        Self(BTreeMap::from(value))
    }
}

impl Environment for FixedEnvironment {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        self.0
            .get(variable)
            .cloned()
            .ok_or_else(|| Error::VariableNotPresent(variable.clone()))
    }
}

/// The empty environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        Err(Error::VariableNotPresent(variable.clone()))
    }
}
