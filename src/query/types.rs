use crate::field_path::FieldPath;
use crate::value::TypedValue;
use bson::Bson;
use serde::{Deserialize, Serialize};

use super::compile::BoundOp;

// Wire model: field names follow the REST StructuredQuery JSON.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Projection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Vec<CollectionSelector>>,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<OrderWire>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
}

/// The `runQuery` request body wrapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

impl From<&str> for FieldReference {
    fn from(path: &str) -> Self {
        Self { field_path: path.to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    #[serde(default)]
    pub fields: Vec<FieldReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    #[serde(default)]
    pub collection_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all_descendants: bool,
}

/// A filter node as it arrives: at most one of the three shapes should be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_filter: Option<FieldFilterWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unary_filter: Option<UnaryFilterWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_filter: Option<CompositeFilterWire>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilterWire {
    pub field: FieldReference,
    pub op: String,
    pub value: TypedValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnaryFilterWire {
    pub field: FieldReference,
    pub op: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeFilterWire {
    pub op: String,
    #[serde(default)]
    pub filters: Vec<FilterWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWire {
    pub field: FieldReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

/// A pagination boundary aligned to the active ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(default)]
    pub values: Vec<TypedValue>,
    #[serde(default)]
    pub before: bool,
}

/// `limit` arrives either bare or wrapped as `{"value": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Limit {
    Bare(i64),
    Wrapped { value: i64 },
}

impl Limit {
    #[must_use]
    pub const fn value(&self) -> i64 {
        match self {
            Self::Bare(v) | Self::Wrapped { value: v } => *v,
        }
    }
}

// Validated filter tree.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
    ArrayContains,
    ArrayContainsAny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnaryOperator {
    IsNull,
    IsNotNull,
    IsNan,
    IsNotNan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompositeOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Field { field: FieldPath, op: FieldOperator, value: TypedValue },
    Unary { field: FieldPath, op: UnaryOperator },
    Composite { op: CompositeOperator, filters: Vec<Filter> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

// Compiled, executable form.

/// One test applied to a resolved field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum Condition {
    Eq(Bson),
    Ne(Bson),
    Lt(Bson),
    Lte(Bson),
    Gt(Bson),
    Gte(Bson),
    In(Vec<Bson>),
    NotIn(Vec<Bson>),
    ArrayContains(Bson),
    ArrayContainsAny(Vec<Bson>),
    IsNull,
    IsNotNull,
    IsNan,
    IsNotNan,
    /// Cursor boundary. Compares with the sort order, so an absent field reads
    /// as null and NaN sits below every other number.
    Bound { op: BoundOp, value: Bson },
    /// Equality under the sort order, for the leading fields of a compound cursor.
    SortEq(Bson),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    /// All conditions must hold for the value found at `path`.
    Field { path: FieldPath, conditions: Vec<Condition> },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn field(path: FieldPath, condition: Condition) -> Self {
        Self::Field { path, conditions: vec![condition] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: FieldPath,
    pub direction: Direction,
}

/// The compiled query. Built once per request and consumed by the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub collection: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub all_descendants: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<FieldPath>>,
}

impl QuerySpec {
    /// A spec that returns every direct child of `collection`.
    #[must_use]
    pub fn scan(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            all_descendants: false,
            filter: None,
            sort: None,
            limit: None,
            skip: None,
            projection: None,
        }
    }
}
