use firelite::query::{
    CompositeOperator, Cursor, DecodedDocument, Direction, FieldOperator, Filter, SortKey,
    UnaryOperator, compile_cursor, compile_filter, matches, parse_filter_json,
};
use firelite::{DbError, Document, FieldPath, TypedValue};
use std::collections::BTreeMap;

fn doc(fields: Vec<(&str, TypedValue)>) -> DecodedDocument {
    let mut d = Document::new("projects/p/databases/(default)/documents/things/t1");
    for (k, v) in fields {
        d = d.with_field(k, v);
    }
    DecodedDocument::decode(&d).unwrap()
}

fn field(path: &str, op: FieldOperator, value: TypedValue) -> Filter {
    Filter::Field { field: FieldPath::parse(path).unwrap(), op, value }
}

fn strings(items: &[&str]) -> TypedValue {
    TypedValue::array(items.iter().map(|s| TypedValue::from(*s)).collect())
}

#[test]
fn every_field_operator_accepts_and_rejects() {
    let ints = |xs: &[i64]| TypedValue::array(xs.iter().map(|x| TypedValue::from(*x)).collect());
    let cases: Vec<(FieldOperator, TypedValue, TypedValue, TypedValue)> = vec![
        (FieldOperator::Equal, 5_i64.into(), 5_i64.into(), 6_i64.into()),
        (FieldOperator::NotEqual, 5_i64.into(), 6_i64.into(), 5_i64.into()),
        (FieldOperator::LessThan, 5_i64.into(), 4_i64.into(), 5_i64.into()),
        (FieldOperator::LessThanOrEqual, 5_i64.into(), 5_i64.into(), 6_i64.into()),
        (FieldOperator::GreaterThan, 5_i64.into(), 6_i64.into(), 5_i64.into()),
        (FieldOperator::GreaterThanOrEqual, 5_i64.into(), 5_i64.into(), 4_i64.into()),
        (FieldOperator::In, ints(&[1, 5]), 5_i64.into(), 3_i64.into()),
        (FieldOperator::NotIn, ints(&[1, 5]), 3_i64.into(), 5_i64.into()),
        (FieldOperator::ArrayContains, "x".into(), strings(&["x", "y"]), strings(&["y"])),
        (FieldOperator::ArrayContainsAny, strings(&["x", "y"]), strings(&["y", "z"]), strings(&["a", "b"])),
    ];
    for (op, filter_value, hit, miss) in cases {
        let pred = compile_filter(&field("v", op, filter_value)).unwrap();
        assert!(matches(&doc(vec![("v", hit.clone())]), &pred), "{op:?} should accept {hit:?}");
        assert!(!matches(&doc(vec![("v", miss.clone())]), &pred), "{op:?} should reject {miss:?}");
    }
}

#[test]
fn unary_operators() {
    let nan = doc(vec![("v", f64::NAN.into())]);
    let five = doc(vec![("v", 5_i64.into())]);
    let null = doc(vec![("v", TypedValue::null())]);
    let missing = doc(vec![]);
    let check = |op: UnaryOperator, d: &DecodedDocument| {
        let f = Filter::Unary { field: FieldPath::parse("v").unwrap(), op };
        matches(d, &compile_filter(&f).unwrap())
    };
    assert!(check(UnaryOperator::IsNan, &nan));
    assert!(!check(UnaryOperator::IsNan, &five));
    assert!(!check(UnaryOperator::IsNan, &missing));
    assert!(check(UnaryOperator::IsNotNan, &five));
    assert!(check(UnaryOperator::IsNull, &null));
    assert!(!check(UnaryOperator::IsNull, &missing));
    assert!(check(UnaryOperator::IsNotNull, &five));
    assert!(!check(UnaryOperator::IsNotNull, &null));
}

#[test]
fn composite_and_or() {
    let a = field("a", FieldOperator::Equal, 1_i64.into());
    let b = field("b", FieldOperator::Equal, "x".into());
    let and = compile_filter(&Filter::Composite { op: CompositeOperator::And, filters: vec![a.clone(), b.clone()] }).unwrap();
    let or = compile_filter(&Filter::Composite { op: CompositeOperator::Or, filters: vec![a, b] }).unwrap();
    let both = doc(vec![("a", 1_i64.into()), ("b", "x".into())]);
    let one = doc(vec![("a", 1_i64.into()), ("b", "y".into())]);
    let none = doc(vec![("a", 2_i64.into())]);
    assert!(matches(&both, &and));
    assert!(!matches(&one, &and));
    assert!(matches(&one, &or));
    assert!(!matches(&none, &or));
}

#[test]
fn nested_paths_and_document_name() {
    let mut inner = BTreeMap::new();
    inner.insert("city".to_string(), TypedValue::from("Oslo"));
    let d = doc(vec![("address", TypedValue::map(inner))]);
    let pred = compile_filter(&field("address.city", FieldOperator::Equal, "Oslo".into())).unwrap();
    assert!(matches(&d, &pred));

    let by_name = compile_filter(&field(
        "__name__",
        FieldOperator::Equal,
        TypedValue::ReferenceValue("projects/p/databases/(default)/documents/things/t1".into()),
    ))
    .unwrap();
    assert!(matches(&d, &by_name));
}

#[test]
fn integers_and_doubles_compare_by_value() {
    let pred = compile_filter(&field("v", FieldOperator::Equal, 5_i64.into())).unwrap();
    assert!(matches(&doc(vec![("v", 5.0.into())]), &pred));
    let gt = compile_filter(&field("v", FieldOperator::GreaterThan, 2.5.into())).unwrap();
    assert!(matches(&doc(vec![("v", 3_i64.into())]), &gt));
}

#[test]
fn absent_fields_fail_ordered_and_pass_negated_operators() {
    let missing = doc(vec![]);
    for (op, value, expected) in [
        (FieldOperator::LessThan, TypedValue::from(5_i64), false),
        (FieldOperator::GreaterThanOrEqual, TypedValue::from(5_i64), false),
        (FieldOperator::Equal, TypedValue::from(5_i64), false),
        (FieldOperator::NotEqual, TypedValue::from(5_i64), true),
        (FieldOperator::NotIn, TypedValue::array(vec![5_i64.into()]), true),
    ] {
        let pred = compile_filter(&field("v", op, value)).unwrap();
        assert_eq!(matches(&missing, &pred), expected, "{op:?}");
    }
    // an end cursor sorts absent with null, so it keeps the document
    let order = [SortKey { field: FieldPath::parse("v").unwrap(), direction: Direction::Ascending }];
    let end = compile_cursor(&Cursor { values: vec![5_i64.into()], before: false }, &order, false)
        .unwrap()
        .unwrap();
    assert!(matches(&missing, &end));
}

#[test]
fn membership_operators_need_arrays() {
    for op in [FieldOperator::In, FieldOperator::NotIn, FieldOperator::ArrayContainsAny] {
        let err = compile_filter(&field("v", op, 5_i64.into())).unwrap_err();
        assert!(matches!(err, DbError::InvalidValue(_)), "{op:?}");
    }
}

#[test]
fn wire_filters_parse_and_reject_bad_shapes() {
    let f = parse_filter_json(
        r#"{"compositeFilter":{"op":"OR","filters":[
            {"fieldFilter":{"field":{"fieldPath":"tags"},"op":"ARRAY_CONTAINS","value":{"stringValue":"rust"}}},
            {"unaryFilter":{"op":"IS_NULL","field":{"fieldPath":"deleted"}}}]}}"#,
    )
    .unwrap();
    let pred = compile_filter(&f).unwrap();
    assert!(matches(&doc(vec![("tags", strings(&["go", "rust"]))]), &pred));
    assert!(matches(&doc(vec![("deleted", TypedValue::null())]), &pred));
    assert!(!matches(&doc(vec![("tags", strings(&["go"]))]), &pred));

    let unknown = parse_filter_json(
        r#"{"fieldFilter":{"field":{"fieldPath":"a"},"op":"LIKE","value":{"stringValue":"x"}}}"#,
    );
    assert!(matches!(unknown, Err(DbError::UnsupportedOperator(_))));
    assert!(matches!(parse_filter_json("{}"), Err(DbError::MalformedFilter(_))));
}
