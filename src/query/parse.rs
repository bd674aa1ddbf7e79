use crate::errors::DbError;
use crate::field_path::FieldPath;
use std::str::FromStr;

use super::types::{
    CompositeOperator, Direction, FieldOperator, Filter, FilterWire, OrderWire, RunQueryRequest,
    SortKey, StructuredQuery, UnaryOperator,
};

impl FromStr for FieldOperator {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "EQUAL" => Self::Equal,
            "NOT_EQUAL" => Self::NotEqual,
            "LESS_THAN" => Self::LessThan,
            "LESS_THAN_OR_EQUAL" => Self::LessThanOrEqual,
            "GREATER_THAN" => Self::GreaterThan,
            "GREATER_THAN_OR_EQUAL" => Self::GreaterThanOrEqual,
            "IN" => Self::In,
            "NOT_IN" => Self::NotIn,
            "ARRAY_CONTAINS" => Self::ArrayContains,
            "ARRAY_CONTAINS_ANY" => Self::ArrayContainsAny,
            other => return Err(DbError::UnsupportedOperator(format!("field filter op {other:?}"))),
        })
    }
}

impl FromStr for UnaryOperator {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "IS_NULL" => Self::IsNull,
            "IS_NOT_NULL" => Self::IsNotNull,
            "IS_NAN" => Self::IsNan,
            "IS_NOT_NAN" => Self::IsNotNan,
            other => return Err(DbError::UnsupportedOperator(format!("unary filter op {other:?}"))),
        })
    }
}

impl FromStr for CompositeOperator {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(DbError::UnsupportedOperator(format!("composite filter op {other:?}"))),
        }
    }
}

impl FromStr for Direction {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASCENDING" | "DIRECTION_UNSPECIFIED" => Ok(Self::Ascending),
            "DESCENDING" => Ok(Self::Descending),
            other => Err(DbError::UnsupportedOperator(format!("order direction {other:?}"))),
        }
    }
}

impl TryFrom<&FilterWire> for Filter {
    type Error = DbError;
    fn try_from(wire: &FilterWire) -> Result<Self, Self::Error> {
        let shapes = usize::from(wire.field_filter.is_some())
            + usize::from(wire.unary_filter.is_some())
            + usize::from(wire.composite_filter.is_some());
        if shapes != 1 {
            return Err(DbError::MalformedFilter(format!(
                "expected exactly one of fieldFilter, unaryFilter, compositeFilter; found {shapes}"
            )));
        }
        if let Some(ff) = &wire.field_filter {
            return Ok(Self::Field {
                field: FieldPath::parse(&ff.field.field_path)?,
                op: ff.op.parse()?,
                value: ff.value.clone(),
            });
        }
        if let Some(uf) = &wire.unary_filter {
            return Ok(Self::Unary {
                field: FieldPath::parse(&uf.field.field_path)?,
                op: uf.op.parse()?,
            });
        }
        match &wire.composite_filter {
            Some(cf) => Ok(Self::Composite {
                op: cf.op.parse()?,
                filters: cf.filters.iter().map(Self::try_from).collect::<Result<_, _>>()?,
            }),
            None => Err(DbError::MalformedFilter("empty filter node".into())),
        }
    }
}

impl TryFrom<&OrderWire> for SortKey {
    type Error = DbError;
    fn try_from(wire: &OrderWire) -> Result<Self, Self::Error> {
        Ok(Self {
            field: FieldPath::parse(&wire.field.field_path)?,
            direction: wire.direction.as_deref().map_or(Ok(Direction::Ascending), |d| d.parse::<Direction>())?,
        })
    }
}

/// # Errors
/// Returns an error if the JSON cannot be parsed or the filter tree is malformed.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    let wire: FilterWire = serde_json::from_str(json)?;
    Filter::try_from(&wire)
}

/// Accepts either a bare StructuredQuery or a `runQuery` body wrapping one.
///
/// # Errors
/// Returns an error if the JSON matches neither shape.
pub fn parse_query_json(json: &str) -> Result<StructuredQuery, DbError> {
    let raw: serde_json::Value = serde_json::from_str(json)?;
    if raw.get("structuredQuery").is_some() {
        let req: RunQueryRequest = serde_json::from_value(raw)?;
        return Ok(req.structured_query);
    }
    Ok(serde_json::from_value(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_filter() {
        let f = parse_filter_json(
            r#"{"fieldFilter":{"field":{"fieldPath":"age"},"op":"GREATER_THAN","value":{"integerValue":"3"}}}"#,
        )
        .unwrap();
        assert!(matches!(f, Filter::Field { op: FieldOperator::GreaterThan, .. }));
    }

    #[test]
    fn unspecified_and_unknown_ops_are_unsupported() {
        for json in [
            r#"{"fieldFilter":{"field":{"fieldPath":"a"},"op":"OPERATOR_UNSPECIFIED","value":{"nullValue":null}}}"#,
            r#"{"unaryFilter":{"field":{"fieldPath":"a"},"op":"IS_EMPTY"}}"#,
            r#"{"compositeFilter":{"op":"XOR","filters":[]}}"#,
            r#"{"compositeFilter":{"op":"OPERATOR_UNSPECIFIED","filters":[]}}"#,
        ] {
            assert!(
                matches!(parse_filter_json(json), Err(DbError::UnsupportedOperator(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn shapeless_or_ambiguous_nodes_are_malformed() {
        assert!(matches!(parse_filter_json("{}"), Err(DbError::MalformedFilter(_))));
        let both = r#"{"unaryFilter":{"field":{"fieldPath":"a"},"op":"IS_NULL"},
                       "compositeFilter":{"op":"AND","filters":[]}}"#;
        assert!(matches!(parse_filter_json(both), Err(DbError::MalformedFilter(_))));
        let nested = r#"{"compositeFilter":{"op":"OR","filters":[{}]}}"#;
        assert!(matches!(parse_filter_json(nested), Err(DbError::MalformedFilter(_))));
    }

    #[test]
    fn order_direction_defaults_ascending() {
        let w: OrderWire = serde_json::from_str(r#"{"field":{"fieldPath":"a"}}"#).unwrap();
        assert_eq!(SortKey::try_from(&w).unwrap().direction, Direction::Ascending);
        let w: OrderWire =
            serde_json::from_str(r#"{"field":{"fieldPath":"a"},"direction":"DESCENDING"}"#).unwrap();
        assert_eq!(SortKey::try_from(&w).unwrap().direction, Direction::Descending);
    }

    #[test]
    fn query_json_accepts_run_query_wrapper() {
        let bare = parse_query_json(r#"{"from":[{"collectionId":"users"}],"limit":{"value":3}}"#).unwrap();
        let wrapped = parse_query_json(
            r#"{"structuredQuery":{"from":[{"collectionId":"users"}],"limit":{"value":3}}}"#,
        )
        .unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare.limit.map(|l| l.value()), Some(3));
    }
}
