//! StructuredQuery → `QuerySpec` compilation. Pure: no I/O, no shared state.

use crate::errors::DbError;
use crate::field_path::FieldPath;
use crate::value::convert;
use bson::Bson;
use serde::Serialize;

use super::types::{
    CompositeOperator, Condition, Cursor, Direction, FieldOperator, Filter, Predicate, QuerySpec,
    SortKey, StructuredQuery, UnaryOperator,
};

pub const DEFAULT_MAX_FILTER_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub max_filter_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { max_filter_depth: DEFAULT_MAX_FILTER_DEPTH }
    }
}

/// Inequality used for a cursor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BoundOp {
    /// Picks the boundary operator for a cursor. `before` makes the bound exclusive.
    #[must_use]
    pub fn select(is_start: bool, direction: Direction, before: bool) -> Self {
        // start on ascending and end on descending both keep values above the cursor
        let upward = is_start == (direction == Direction::Ascending);
        match (upward, before) {
            (true, false) => Self::Gte,
            (true, true) => Self::Gt,
            (false, false) => Self::Lte,
            (false, true) => Self::Lt,
        }
    }

    #[must_use]
    pub const fn strict(self) -> Self {
        match self {
            Self::Lte | Self::Lt => Self::Lt,
            Self::Gte | Self::Gt => Self::Gt,
        }
    }

    fn condition(self, value: Bson) -> Condition {
        Condition::Bound { op: self, value }
    }
}

/// # Errors
/// See [`compile_filter_with`].
pub fn compile_filter(filter: &Filter) -> Result<Predicate, DbError> {
    compile_filter_with(filter, &CompileOptions::default())
}

/// Compiles a validated filter tree into a predicate.
///
/// # Errors
/// `FilterTooDeep` past `max_filter_depth`, `InvalidValue` when a filter value
/// cannot be converted or a membership operator is not given an array.
pub fn compile_filter_with(filter: &Filter, opts: &CompileOptions) -> Result<Predicate, DbError> {
    compile_node(filter, opts.max_filter_depth, 1)
}

fn compile_node(filter: &Filter, max: usize, depth: usize) -> Result<Predicate, DbError> {
    if depth > max {
        return Err(DbError::FilterTooDeep { max });
    }
    match filter {
        Filter::Field { field, op, value } => {
            let v = convert(value)?;
            let cond = match op {
                FieldOperator::Equal => Condition::Eq(v),
                FieldOperator::NotEqual => Condition::Ne(v),
                FieldOperator::LessThan => Condition::Lt(v),
                FieldOperator::LessThanOrEqual => Condition::Lte(v),
                FieldOperator::GreaterThan => Condition::Gt(v),
                FieldOperator::GreaterThanOrEqual => Condition::Gte(v),
                FieldOperator::In => Condition::In(array_elements(v, "IN")?),
                FieldOperator::NotIn => Condition::NotIn(array_elements(v, "NOT_IN")?),
                FieldOperator::ArrayContains => Condition::ArrayContains(v),
                FieldOperator::ArrayContainsAny => {
                    Condition::ArrayContainsAny(array_elements(v, "ARRAY_CONTAINS_ANY")?)
                }
            };
            Ok(Predicate::field(field.clone(), cond))
        }
        Filter::Unary { field, op } => {
            let cond = match op {
                UnaryOperator::IsNull => Condition::IsNull,
                UnaryOperator::IsNotNull => Condition::IsNotNull,
                UnaryOperator::IsNan => Condition::IsNan,
                UnaryOperator::IsNotNan => Condition::IsNotNan,
            };
            Ok(Predicate::field(field.clone(), cond))
        }
        Filter::Composite { op, filters } => {
            let children = filters
                .iter()
                .map(|f| compile_node(f, max, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match op {
                CompositeOperator::And => Predicate::And(children),
                CompositeOperator::Or => Predicate::Or(children),
            })
        }
    }
}

fn array_elements(v: Bson, op: &str) -> Result<Vec<Bson>, DbError> {
    match v {
        Bson::Array(items) => Ok(items),
        other => Err(DbError::InvalidValue(format!("{op} needs an array value, got {other}"))),
    }
}

/// Compiles a cursor into a boundary predicate over the active ordering.
///
/// Returns `Ok(None)` when there is no ordering or the value count lines up with
/// neither the single-field nor the full compound form; such cursors are ignored.
///
/// # Errors
/// Returns `InvalidValue` if a cursor value cannot be converted.
pub fn compile_cursor(
    cursor: &Cursor,
    order_by: &[SortKey],
    is_start: bool,
) -> Result<Option<Predicate>, DbError> {
    if order_by.is_empty() {
        return Ok(None);
    }
    let n = cursor.values.len();
    if n == 1 && order_by.len() == 1 {
        let key = &order_by[0];
        let op = BoundOp::select(is_start, key.direction, cursor.before);
        let value = convert(&cursor.values[0])?;
        return Ok(Some(Predicate::field(key.field.clone(), op.condition(value))));
    }
    if n > 1 && n == order_by.len() {
        let values = cursor.values.iter().map(convert).collect::<Result<Vec<_>, _>>()?;
        let mut clauses = Vec::with_capacity(n);
        for (i, key) in order_by.iter().enumerate() {
            let mut parts: Vec<Predicate> = order_by[..i]
                .iter()
                .zip(&values)
                .map(|(prev, v)| Predicate::field(prev.field.clone(), Condition::SortEq(v.clone())))
                .collect();
            let mut op = BoundOp::select(is_start, key.direction, cursor.before);
            if i + 1 < n {
                op = op.strict();
            }
            parts.push(Predicate::field(key.field.clone(), op.condition(values[i].clone())));
            clauses.push(if parts.len() == 1 { parts.remove(0) } else { Predicate::And(parts) });
        }
        return Ok(Some(Predicate::Or(clauses)));
    }
    log::debug!(
        "ignoring {} cursor with {n} values against {} ordering fields",
        if is_start { "start" } else { "end" },
        order_by.len()
    );
    Ok(None)
}

/// Folds the where-predicate and cursor boundaries into one predicate.
fn merge_predicates(mut preds: Vec<Predicate>) -> Option<Predicate> {
    if preds.len() <= 1 {
        return preds.pop();
    }
    let shared_path = match &preds[0] {
        Predicate::Field { path, .. } => preds
            .iter()
            .all(|p| matches!(p, Predicate::Field { path: other, .. } if other == path))
            .then(|| path.clone()),
        _ => None,
    };
    match shared_path {
        Some(path) => {
            let conditions = preds
                .into_iter()
                .flat_map(|p| match p {
                    Predicate::Field { conditions, .. } => conditions,
                    Predicate::And(_) | Predicate::Or(_) => Vec::new(),
                })
                .collect();
            Some(Predicate::Field { path, conditions })
        }
        None => Some(Predicate::And(preds)),
    }
}

fn non_negative(v: i64, what: &str) -> Result<usize, DbError> {
    usize::try_from(v).map_err(|_| DbError::InvalidValue(format!("{what} must be >= 0, got {v}")))
}

/// # Errors
/// See [`translate_structured_query_with`].
pub fn translate_structured_query(query: &StructuredQuery) -> Result<QuerySpec, DbError> {
    translate_structured_query_with(query, &CompileOptions::default())
}

/// Builds the executable spec for a StructuredQuery.
///
/// # Errors
/// `MissingCollection` without a `from` selector; `UnsupportedOperator`,
/// `MalformedFilter`, `FilterTooDeep` or `InvalidValue` for a bad request body.
pub fn translate_structured_query_with(
    query: &StructuredQuery,
    opts: &CompileOptions,
) -> Result<QuerySpec, DbError> {
    let from = query.from.as_deref().unwrap_or_default();
    let selector = from.first().ok_or(DbError::MissingCollection)?;
    if selector.collection_id.is_empty() {
        return Err(DbError::MissingCollection);
    }
    if from.len() > 1 {
        log::warn!(
            "multi-collection query: using {:?}, ignoring {} more selector(s)",
            selector.collection_id,
            from.len() - 1
        );
    }

    let where_pred = match &query.filter {
        Some(wire) => Some(compile_filter_with(&Filter::try_from(wire)?, opts)?),
        None => None,
    };

    let sort = query
        .order_by
        .as_ref()
        .map(|orders| orders.iter().map(SortKey::try_from).collect::<Result<Vec<_>, _>>())
        .transpose()?;
    let keys = sort.as_deref().unwrap_or_default();

    let start = match &query.start_at {
        Some(c) => compile_cursor(c, keys, true)?,
        None => None,
    };
    let end = match &query.end_at {
        Some(c) => compile_cursor(c, keys, false)?,
        None => None,
    };
    let filter = merge_predicates(where_pred.into_iter().chain(start).chain(end).collect());

    let limit = query.limit.map(|l| non_negative(l.value(), "limit")).transpose()?;
    let skip = query.offset.map(|o| non_negative(o, "offset")).transpose()?;
    let projection = query
        .select
        .as_ref()
        .map(|s| {
            s.fields.iter().map(|f| FieldPath::parse(&f.field_path)).collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    Ok(QuerySpec {
        collection: selector.collection_id.clone(),
        all_descendants: selector.all_descendants,
        filter,
        sort,
        limit,
        skip,
        projection,
    })
}

/// Parses request JSON (bare or `runQuery`-wrapped) and compiles it.
///
/// # Errors
/// Any parse or compile error.
pub fn compile_json(json: &str) -> Result<QuerySpec, DbError> {
    translate_structured_query(&super::parse::parse_query_json(json)?)
}
