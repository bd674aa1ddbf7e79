use crate::document::Document;
use crate::errors::DbError;
use crate::field_path::FieldPath;
use crate::value::{TypedValue, format_millis};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::compile::BoundOp;
use super::types::{Condition, Direction, Predicate, SortKey};

/// A document's fields decoded once into native values, plus its name for `__name__`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDocument {
    name: Bson,
    fields: BsonDocument,
}

impl DecodedDocument {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: BsonDocument) -> Self {
        Self { name: Bson::String(name.into()), fields }
    }

    /// # Errors
    /// Fails if any stored field value cannot be converted.
    pub fn decode(doc: &Document) -> Result<Self, DbError> {
        Ok(Self::new(doc.name.clone(), doc.decode()?))
    }

    #[must_use]
    pub fn get(&self, path: &FieldPath) -> Option<&Bson> {
        if path.is_document_name() { Some(&self.name) } else { path.resolve(&self.fields) }
    }

    #[must_use]
    pub const fn fields(&self) -> &BsonDocument {
        &self.fields
    }
}

pub fn matches(doc: &DecodedDocument, pred: &Predicate) -> bool {
    match pred {
        Predicate::And(ps) => ps.iter().all(|p| matches(doc, p)),
        Predicate::Or(ps) => ps.iter().any(|p| matches(doc, p)),
        Predicate::Field { path, conditions } => {
            let value = doc.get(path);
            conditions.iter().all(|c| eval_condition(value, c))
        }
    }
}

/// Applies one condition to a resolved field value (`None` when absent).
pub fn eval_condition(field: Option<&Bson>, cond: &Condition) -> bool {
    match cond {
        Condition::Eq(x) => field.is_some_and(|v| values_equal(v, x)),
        Condition::Ne(x) => !field.is_some_and(|v| values_equal(v, x)),
        Condition::Lt(x) => ordered(field, x, |o| o == Ordering::Less),
        Condition::Lte(x) => ordered(field, x, |o| o != Ordering::Greater),
        Condition::Gt(x) => ordered(field, x, |o| o == Ordering::Greater),
        Condition::Gte(x) => ordered(field, x, |o| o != Ordering::Less),
        Condition::In(xs) => field.is_some_and(|v| contains(xs, v)),
        Condition::NotIn(xs) => !field.is_some_and(|v| contains(xs, v)),
        Condition::ArrayContains(x) => {
            matches!(field, Some(Bson::Array(items)) if contains(items, x))
        }
        Condition::ArrayContainsAny(xs) => {
            matches!(field, Some(Bson::Array(items)) if xs.iter().any(|x| contains(items, x)))
        }
        Condition::IsNull => matches!(field, Some(Bson::Null)),
        Condition::IsNotNull => !matches!(field, Some(Bson::Null)),
        Condition::IsNan => is_nan(field),
        Condition::IsNotNan => !is_nan(field),
        Condition::Bound { op, value } => {
            let ord = compare_values(field, Some(value));
            match op {
                BoundOp::Lt => ord.is_lt(),
                BoundOp::Lte => ord.is_le(),
                BoundOp::Gt => ord.is_gt(),
                BoundOp::Gte => ord.is_ge(),
            }
        }
        Condition::SortEq(value) => compare_values(field, Some(value)).is_eq(),
    }
}

fn ordered(field: Option<&Bson>, target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    field.and_then(|v| partial_compare(v, target)).is_some_and(accept)
}

fn is_nan(field: Option<&Bson>) -> bool {
    matches!(field, Some(Bson::Double(d)) if d.is_nan())
}

fn contains(items: &[Bson], needle: &Bson) -> bool {
    items.iter().any(|x| values_equal(x, needle))
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(v: &Bson) -> Option<Self> {
        match v {
            Bson::Int32(i) => Some(Self::Int(i64::from(*i))),
            Bson::Int64(i) => Some(Self::Int(*i)),
            Bson::Double(d) => Some(Self::Float(*d)),
            _ => None,
        }
    }

    fn is_nan(self) -> bool {
        matches!(self, Self::Float(d) if d.is_nan())
    }
}

/// Exact numeric order. NaN equals NaN and sits below every other number.
fn compare_numbers(a: Number, b: Number) -> Ordering {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.cmp(&y),
        (Number::Float(x), Number::Float(y)) => compare_floats(x, y),
        (Number::Int(x), Number::Float(y)) => compare_int_float(x, y),
        (Number::Float(x), Number::Int(y)) => compare_int_float(y, x).reverse(),
    }
}

fn compare_floats(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

// Compares without rounding the integer through f64, which would merge
// neighbours above 2^53.
fn compare_int_float(i: i64, f: f64) -> Ordering {
    const TWO_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return Ordering::Greater;
    }
    if f >= TWO_63 {
        return Ordering::Less;
    }
    if f < -TWO_63 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    #[allow(clippy::cast_possible_truncation)]
    let truncated = whole as i64;
    i.cmp(&truncated).then_with(|| 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal))
}

/// Structural equality. Numbers compare by value across representations,
/// NaN equals nothing, dates by instant, maps regardless of key order.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (Number::of(a), Number::of(b)) {
        return !x.is_nan() && !y.is_nan() && compare_numbers(x, y).is_eq();
    }
    match (a, b) {
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis() == y.timestamp_millis(),
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        (Bson::Binary(x), Bson::Binary(y)) => x.bytes == y.bytes,
        _ => a == b,
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null | Bson::Undefined => 0,
        Bson::Boolean(_) => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 2,
        Bson::DateTime(_) => 3,
        Bson::String(_) => 4,
        Bson::Binary(_) => 5,
        Bson::Array(_) => 6,
        Bson::Document(_) => 7,
        _ => 8,
    }
}

/// Total order: null, booleans, numbers, timestamps, strings, bytes, arrays,
/// maps. Within a class values compare natively; maps and anything else
/// compare by their string rendering.
fn total_compare(a: &Bson, b: &Bson) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Binary(x), Bson::Binary(y)) => x.bytes.cmp(&y.bytes),
        (Bson::Array(x), Bson::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| total_compare(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => match (Number::of(a), Number::of(b)) {
            (Some(x), Some(y)) => compare_numbers(x, y),
            _ => render(a).cmp(&render(b)),
        },
    })
}

/// Ordering for range filters; `None` when a NaN is involved.
fn partial_compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    let nan = |v: &Bson| Number::of(v).is_some_and(Number::is_nan);
    if nan(a) || nan(b) { None } else { Some(total_compare(a, b)) }
}

static NULL: Bson = Bson::Null;

/// Three-way comparison used for sorting and cursor bounds. Absent sorts with
/// null, before everything else.
#[must_use]
pub fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    total_compare(a.unwrap_or(&NULL), b.unwrap_or(&NULL))
}

pub fn compare_docs(a: &DecodedDocument, b: &DecodedDocument, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ord = compare_values(a.get(&key.field), b.get(&key.field));
        if ord != Ordering::Equal {
            return match key.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            };
        }
    }
    Ordering::Equal
}

fn render(v: &Bson) -> String {
    match v {
        Bson::Null => "null".to_string(),
        Bson::Boolean(b) => b.to_string(),
        Bson::Int32(i) => i.to_string(),
        Bson::Int64(i) => i.to_string(),
        Bson::String(s) => s.clone(),
        Bson::Double(d) => render_number(*d),
        Bson::DateTime(dt) => format_millis(dt.timestamp_millis()),
        Bson::Binary(b) => STANDARD.encode(&b.bytes),
        Bson::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(","),
        Bson::Document(_) => render_json(v).to_string(),
        other => other.to_string(),
    }
}

fn render_number(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{d:.0}")
    } else {
        d.to_string()
    }
}

fn render_json(v: &Bson) -> serde_json::Value {
    use serde_json::Value;
    match v {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Array(items) => Value::Array(items.iter().map(render_json).collect()),
        Bson::Document(d) => {
            Value::Object(d.iter().map(|(k, v)| (k.clone(), render_json(v))).collect())
        }
        other => Value::String(render(other)),
    }
}

/// Keeps only the listed fields that are present. Dotted paths keep the nested
/// value and rebuild the enclosing maps; `__name__` is not a field and is skipped.
#[must_use]
pub fn project_fields(
    fields: &BTreeMap<String, TypedValue>,
    paths: &[FieldPath],
) -> BTreeMap<String, TypedValue> {
    let mut out = BTreeMap::new();
    for path in paths {
        if path.is_document_name() {
            continue;
        }
        if let Some(v) = lookup_typed(fields, path.segments()) {
            insert_typed(&mut out, path.segments(), v.clone());
        }
    }
    out
}

fn lookup_typed<'a>(
    fields: &'a BTreeMap<String, TypedValue>,
    segs: &[String],
) -> Option<&'a TypedValue> {
    let (first, rest) = segs.split_first()?;
    let v = fields.get(first)?;
    if rest.is_empty() {
        return Some(v);
    }
    match v {
        TypedValue::MapValue(m) => lookup_typed(&m.fields, rest),
        _ => None,
    }
}

fn insert_typed(out: &mut BTreeMap<String, TypedValue>, segs: &[String], value: TypedValue) {
    let Some((first, rest)) = segs.split_first() else { return };
    if rest.is_empty() {
        out.insert(first.clone(), value);
        return;
    }
    let entry = out.entry(first.clone()).or_insert_with(|| TypedValue::map(BTreeMap::new()));
    if let TypedValue::MapValue(m) = entry {
        insert_typed(&mut m.fields, rest, value);
    }
}
