use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A value given in the configuration, or read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Secret {
    Plain(String),
    #[serde(rename_all = "camelCase")]
    FromEnvironment { variable: crate::environment::Variable },
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::Plain(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}
