//! Wire-format typed values and their conversion to native `Bson` values.
//!
//! The REST encoding tags every value with its kind (`{"integerValue": "21"}`,
//! `{"mapValue": {"fields": {...}}}`). `TypedValue` models that as a sum type so
//! every kind is handled exhaustively; the query engine only ever looks at the
//! converted `Bson` form.

use crate::errors::DbError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document as BsonDocument};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypedValue {
    /// Carries `null` or the `"NULL_VALUE"` enum name; both mean null.
    NullValue(Option<String>),
    BooleanValue(bool),
    IntegerValue(#[serde(with = "int64_string")] i64),
    DoubleValue(#[serde(with = "proto_double")] f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<TypedValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, TypedValue>,
}

impl TypedValue {
    #[must_use]
    pub const fn null() -> Self {
        Self::NullValue(None)
    }

    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::StringValue(s.into())
    }

    #[must_use]
    pub fn array(values: Vec<Self>) -> Self {
        Self::ArrayValue(ArrayValue { values })
    }

    #[must_use]
    pub fn map(fields: BTreeMap<String, Self>) -> Self {
        Self::MapValue(MapValue { fields })
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::IntegerValue(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        Self::DoubleValue(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::BooleanValue(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::StringValue(v.to_string())
    }
}

/// Converts a wire value into its native comparable form.
///
/// # Errors
/// Returns `InvalidValue` for an unparsable timestamp or base64 payload.
pub fn convert(value: &TypedValue) -> Result<Bson, DbError> {
    Ok(match value {
        TypedValue::NullValue(_) => Bson::Null,
        TypedValue::BooleanValue(b) => Bson::Boolean(*b),
        TypedValue::IntegerValue(i) => Bson::Int64(*i),
        TypedValue::DoubleValue(d) => Bson::Double(*d),
        TypedValue::TimestampValue(ts) => Bson::DateTime(parse_timestamp(ts)?),
        TypedValue::StringValue(s) | TypedValue::ReferenceValue(s) => Bson::String(s.clone()),
        TypedValue::BytesValue(b) => {
            let bytes = STANDARD
                .decode(b)
                .map_err(|e| DbError::InvalidValue(format!("bytesValue: {e}")))?;
            Bson::Binary(Binary { subtype: BinarySubtype::Generic, bytes })
        }
        TypedValue::GeoPointValue(ll) => {
            Bson::Document(bson::doc! { "latitude": ll.latitude, "longitude": ll.longitude })
        }
        TypedValue::ArrayValue(a) => {
            Bson::Array(a.values.iter().map(convert).collect::<Result<_, _>>()?)
        }
        TypedValue::MapValue(m) => Bson::Document(decode_fields(&m.fields)?),
    })
}

/// Decodes a whole field map.
///
/// # Errors
/// Fails on the first field whose value cannot be converted.
pub fn decode_fields(fields: &BTreeMap<String, TypedValue>) -> Result<BsonDocument, DbError> {
    let mut out = BsonDocument::new();
    for (k, v) in fields {
        out.insert(k.clone(), convert(v)?);
    }
    Ok(out)
}

/// Reverse mapping. References come back as plain strings and geo points as maps,
/// since the native form does not keep those distinctions.
#[must_use]
pub fn to_typed(value: &Bson) -> TypedValue {
    match value {
        Bson::Null | Bson::Undefined => TypedValue::null(),
        Bson::Boolean(b) => TypedValue::BooleanValue(*b),
        Bson::Int32(i) => TypedValue::IntegerValue(i64::from(*i)),
        Bson::Int64(i) => TypedValue::IntegerValue(*i),
        Bson::Double(d) => TypedValue::DoubleValue(*d),
        Bson::DateTime(dt) => TypedValue::TimestampValue(format_millis(dt.timestamp_millis())),
        Bson::String(s) => TypedValue::StringValue(s.clone()),
        Bson::Binary(b) => TypedValue::BytesValue(STANDARD.encode(&b.bytes)),
        Bson::Array(items) => TypedValue::array(items.iter().map(to_typed).collect()),
        Bson::Document(d) => {
            TypedValue::map(d.iter().map(|(k, v)| (k.clone(), to_typed(v))).collect())
        }
        other => TypedValue::StringValue(other.to_string()),
    }
}

fn parse_timestamp(ts: &str) -> Result<bson::DateTime, DbError> {
    let dt = DateTime::parse_from_rfc3339(ts)
        .map_err(|e| DbError::InvalidValue(format!("timestampValue {ts:?}: {e}")))?;
    Ok(bson::DateTime::from_millis(dt.timestamp_millis()))
}

/// RFC 3339 rendering of a millisecond instant, `Z` suffixed.
pub(crate) fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// int64 travels as a decimal string; plain JSON numbers are accepted too.
mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &i64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(i64),
            Text(String),
        }
        match Repr::deserialize(d)? {
            Repr::Num(n) => Ok(n),
            Repr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

// proto3 JSON spells non-finite doubles as strings.
mod proto_double {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_str("NaN")
        } else if v.is_infinite() {
            s.serialize_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            s.serialize_f64(*v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(f64),
            Text(String),
        }
        match Repr::deserialize(d)? {
            Repr::Num(n) => Ok(n),
            Repr::Text(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => other.parse().map_err(serde::de::Error::custom),
            },
        }
    }
}
