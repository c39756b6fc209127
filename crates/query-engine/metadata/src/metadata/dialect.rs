//! Dialect capability descriptors.
//!
//! Each supported dialect has a static table of the query shapes it accepts and of
//! how generic constructs have to be spelled. The translator consults it once per
//! compilation to decide which rewrites apply.

use std::fmt;

use enum_iterator::Sequence;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::functions::FunctionTable;

/// The dialects we know how to target.
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
pub enum DialectName {
    Oracle,
    Sqlite,
    Postgres,
}

impl fmt::Display for DialectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectName::Oracle => write!(f, "oracle"),
            DialectName::Sqlite => write!(f, "sqlite"),
            DialectName::Postgres => write!(f, "postgres"),
        }
    }
}

/// How unquoted schema object names are stored by the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum IdentifierCase {
    Preserve,
    Upper,
    Lower,
}

/// How bind placeholders are spelled in the statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PlaceholderStyle {
    /// `:p1`, `:p2`, ...
    Colon,
    /// `?`
    Question,
    /// `$1`, `$2`, ...
    Dollar,
}

/// How LIMIT and OFFSET are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PaginationStyle {
    /// `LIMIT m OFFSET n`
    LimitOffset,
    /// `OFFSET n ROWS FETCH NEXT m ROWS ONLY`
    OffsetFetch,
}

/// The capability descriptor of a dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub identifier_quote: char,
    /// Case folding applied to table and column names before quoting them.
    /// Aliases are never folded.
    pub identifier_case: IdentifierCase,
    /// Whether `AS` may appear between a table expression and its alias.
    pub table_alias_keyword: bool,
    pub placeholder_style: PlaceholderStyle,
    /// Whether `TRUE` and `FALSE` are valid in predicate position.
    pub boolean_literals: bool,
    /// Whether booleans are bound natively rather than as `0` / `1`.
    pub native_boolean: bool,
    pub pagination: PaginationStyle,
    /// Whether an OFFSET can only be written after a LIMIT.
    pub offset_requires_limit: bool,
    /// The table to select from when a query has no source, if one is required.
    pub dual_table: Option<String>,
    /// Whether a subquery may appear in a SELECT list.
    pub select_list_subquery: bool,
    /// Whether children can be filtered with a subquery over their parent query.
    pub subquery_eager_load: bool,
    /// Whether ORDER BY and LIMIT may appear inside a branch of a set operation.
    pub order_by_in_set_operation_branch: bool,
    /// Whether branches of a set operation may be parenthesised.
    pub parenthesized_set_operation_branches: bool,
    /// Whether ORDER BY may be applied directly to a set operation's output columns.
    pub set_operation_order_by: bool,
    /// Whether large objects can be compared, which a distinct UNION requires.
    pub large_object_comparison: bool,
    /// The largest number of items in a single IN list.
    pub max_in_list_size: Option<usize>,
    /// Fractional second digits stored in a timestamp.
    pub timestamp_precision: u8,
}

impl Capabilities {
    pub fn for_dialect(name: DialectName) -> Capabilities {
        match name {
            DialectName::Oracle => Capabilities {
                identifier_quote: '"',
                identifier_case: IdentifierCase::Upper,
                table_alias_keyword: false,
                placeholder_style: PlaceholderStyle::Colon,
                boolean_literals: false,
                native_boolean: false,
                pagination: PaginationStyle::OffsetFetch,
                offset_requires_limit: false,
                dual_table: Some("DUAL".to_string()),
                select_list_subquery: false,
                subquery_eager_load: false,
                order_by_in_set_operation_branch: false,
                parenthesized_set_operation_branches: true,
                set_operation_order_by: false,
                large_object_comparison: false,
                max_in_list_size: Some(1000),
                timestamp_precision: 6,
            },
            DialectName::Sqlite => Capabilities {
                identifier_quote: '"',
                identifier_case: IdentifierCase::Preserve,
                table_alias_keyword: true,
                placeholder_style: PlaceholderStyle::Question,
                boolean_literals: false,
                native_boolean: false,
                pagination: PaginationStyle::LimitOffset,
                offset_requires_limit: true,
                dual_table: None,
                select_list_subquery: true,
                subquery_eager_load: true,
                order_by_in_set_operation_branch: false,
                parenthesized_set_operation_branches: false,
                set_operation_order_by: true,
                large_object_comparison: true,
                max_in_list_size: None,
                timestamp_precision: 3,
            },
            DialectName::Postgres => Capabilities {
                identifier_quote: '"',
                identifier_case: IdentifierCase::Preserve,
                table_alias_keyword: true,
                placeholder_style: PlaceholderStyle::Dollar,
                boolean_literals: true,
                native_boolean: true,
                pagination: PaginationStyle::LimitOffset,
                offset_requires_limit: false,
                dual_table: None,
                select_list_subquery: true,
                subquery_eager_load: true,
                order_by_in_set_operation_branch: true,
                parenthesized_set_operation_branches: true,
                set_operation_order_by: true,
                large_object_comparison: true,
                max_in_list_size: None,
                timestamp_precision: 6,
            },
        }
    }

    /// Replace every capability the overrides mention.
    pub fn apply(&mut self, overrides: &CapabilityOverrides) {
        fn set<T: Clone>(target: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut self.identifier_case, overrides.identifier_case.as_ref());
        set(
            &mut self.table_alias_keyword,
            overrides.table_alias_keyword.as_ref(),
        );
        set(
            &mut self.placeholder_style,
            overrides.placeholder_style.as_ref(),
        );
        set(&mut self.boolean_literals, overrides.boolean_literals.as_ref());
        set(&mut self.native_boolean, overrides.native_boolean.as_ref());
        set(
            &mut self.select_list_subquery,
            overrides.select_list_subquery.as_ref(),
        );
        set(
            &mut self.subquery_eager_load,
            overrides.subquery_eager_load.as_ref(),
        );
        set(
            &mut self.order_by_in_set_operation_branch,
            overrides.order_by_in_set_operation_branch.as_ref(),
        );
        set(
            &mut self.set_operation_order_by,
            overrides.set_operation_order_by.as_ref(),
        );
        set(
            &mut self.large_object_comparison,
            overrides.large_object_comparison.as_ref(),
        );
        if let Some(size) = overrides.max_in_list_size {
            self.max_in_list_size = Some(size);
        }
        set(
            &mut self.timestamp_precision,
            overrides.timestamp_precision.as_ref(),
        );
    }
}

/// Capabilities a configuration may change for a deployment, for instance to
/// reflect the server version in use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_case: Option<IdentifierCase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_alias_keyword: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_style: Option<PlaceholderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_literals: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_boolean: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_list_subquery: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subquery_eager_load: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by_in_set_operation_branch: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_operation_order_by: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_object_comparison: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_list_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_precision: Option<u8>,
}

impl CapabilityOverrides {
    pub fn is_empty(&self) -> bool {
        *self == CapabilityOverrides::default()
    }
}

/// Everything the translator needs to know about the target dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct Dialect {
    pub name: DialectName,
    pub capabilities: Capabilities,
    pub functions: FunctionTable,
}

impl Dialect {
    /// The built-in descriptor of a dialect.
    pub fn new(name: DialectName) -> Dialect {
        Dialect {
            name,
            capabilities: Capabilities::for_dialect(name),
            functions: FunctionTable::for_dialect(name),
        }
    }
}
