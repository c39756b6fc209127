//! Metadata information regarding the database and tracked information.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use enum_iterator::Sequence;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::associations::Association;

/// The logical scalar types understood by the query engine.
///
/// These are dialect independent. How each one is represented on the wire is
/// decided by the coercion layer, using the dialect's capabilities.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Sequence,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Boolean,
    Integer,
    Float,
    String,
    /// Character large object. Some dialects cannot compare these.
    Clob,
    Binary,
    Date,
    DateTime,
}

impl ScalarType {
    const OPERATORS_SUPPORTED_BY_ALL_TYPES: &'static [ComparisonOperator] = &[
        ComparisonOperator::Equals,
        ComparisonOperator::NotEquals,
        ComparisonOperator::LessThan,
        ComparisonOperator::LessThanOrEqualTo,
        ComparisonOperator::GreaterThan,
        ComparisonOperator::GreaterThanOrEqualTo,
    ];

    const STRING_OPERATORS: &'static [ComparisonOperator] =
        &[ComparisonOperator::Like, ComparisonOperator::NotLike];

    /// Returns the complete set of comparison operators for the given type.
    pub fn comparison_operators(self) -> BTreeSet<ComparisonOperator> {
        let mut operators =
            BTreeSet::from_iter(Self::OPERATORS_SUPPORTED_BY_ALL_TYPES.iter().copied());
        operators.extend(match self {
            ScalarType::String | ScalarType::Clob => Self::STRING_OPERATORS.iter(),
            _ => [].iter(),
        });
        operators
    }

    /// Large objects need special handling in set operations and sorting.
    pub fn is_large_object(self) -> bool {
        matches!(self, ScalarType::Clob | ScalarType::Binary)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Boolean => "boolean",
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::String => "string",
            ScalarType::Clob => "clob",
            ScalarType::Binary => "binary",
            ScalarType::Date => "date",
            ScalarType::DateTime => "datetime",
        };
        write!(f, "{name}")
    }
}

/// The complete list of supported binary comparison operators.
/// Not all of these are supported for every type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Sequence,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    Like,
    NotLike,
}

/// Mapping from a collection name to its information.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TablesInfo(pub BTreeMap<String, TableInfo>);

impl TablesInfo {
    pub fn empty() -> Self {
        TablesInfo(BTreeMap::new())
    }
}

/// Information about a database table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    #[serde(default)]
    pub schema_name: Option<String>,
    pub table_name: String,
    /// Columns in declaration order, keyed by the name the query model uses.
    pub columns: IndexMap<String, ColumnInfo>,
    /// The key of the column identifying a row.
    pub primary_key: String,
    #[serde(default)]
    pub associations: BTreeMap<String, Association>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.get(name)
    }
}

/// Can this column contain null values
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Nullable {
    #[default]
    Nullable,
    NonNullable,
}

/// Information about a database column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnInfo {
    pub name: String,
    pub r#type: ScalarType,
    #[serde(default)]
    pub nullable: Nullable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_all_binary_comparison_operators_are_used() {
        // This is the set of all operators exposed for some type.
        let exposed_operators = enum_iterator::all::<ScalarType>()
            .flat_map(ScalarType::comparison_operators)
            .collect::<BTreeSet<ComparisonOperator>>();

        for operator in enum_iterator::all::<ComparisonOperator>() {
            assert!(
                exposed_operators.contains(&operator),
                "The operator {operator:?} is not exposed anywhere."
            );
        }
    }

    #[test]
    fn scalar_types_display_as_their_serialized_names() {
        for scalar_type in enum_iterator::all::<ScalarType>() {
            let serialized = serde_json::to_value(scalar_type).unwrap();
            assert_eq!(serialized, serde_json::json!(scalar_type.to_string()));
        }
    }
}
