use firelite::config::EngineConfig;
use firelite::query::QueryTarget;
use firelite::{DbError, Document, Engine, MemoryStore, TypedValue};
use serde_json::json;
use std::collections::HashMap;

fn seeded(engine: &Engine) -> MemoryStore {
    let root = engine.target().documents_root();
    let store = MemoryStore::new();
    for (id, city, pop) in [("sf", "SF", 870_000_i64), ("la", "LA", 3_900_000), ("tok", "Tokyo", 14_000_000)] {
        store.put(
            Document::new(format!("{root}/cities/{id}"))
                .with_field("name", city)
                .with_field("population", TypedValue::from(pop)),
        );
    }
    store.put(Document::new(format!("{root}/cities/sf/landmarks/bridge")).with_field("name", "Golden Gate"));
    store
}

#[test]
fn config_file_drives_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("firelite.toml");
    std::fs::write(
        &path,
        "project_id = \"atlas\"\ndatabase_id = \"geo\"\nslow_query_ms = 0\n\n[log]\nlevel = \"warn\"\n",
    )
    .unwrap();
    let cfg = EngineConfig::from_file(&path).unwrap();
    let engine = Engine::new(cfg);
    assert_eq!(engine.target().documents_root(), "projects/atlas/databases/geo/documents");
    assert_eq!(engine.telemetry().slow_query_ms(), 0);
    assert_eq!(engine.config().log.level, "warn");
}

#[test]
fn env_layer_overrides_file_values() {
    let mut cfg = EngineConfig::from_toml_str("project_id = \"file\"\nmax_filter_depth = 8\n").unwrap();
    let env: HashMap<&str, &str> = [("FIRELITE_PROJECT", "env"), ("FIRELITE_LOG_RETENTION", "3")].into();
    cfg.apply_env_with(|k| env.get(k).map(|v| (*v).to_string())).unwrap();
    assert_eq!(cfg.project_id, "env");
    assert_eq!(cfg.max_filter_depth, 8);
    assert_eq!(cfg.log.retention, 3);
}

#[test]
fn malformed_config_is_reported() {
    assert!(matches!(EngineConfig::from_toml_str("project_id = ["), Err(DbError::Toml(_))));
    let missing = std::path::Path::new("/definitely/not/here/firelite.toml");
    assert!(matches!(EngineConfig::load(Some(missing)), Err(DbError::Io(_))));
}

#[test]
fn end_to_end_json_query() {
    let engine = Engine::default();
    let store = seeded(&engine);
    let body = json!({"structuredQuery": {
        "select": {"fields": [{"fieldPath": "name"}]},
        "from": [{"collectionId": "cities"}],
        "where": {"fieldFilter": {
            "field": {"fieldPath": "population"},
            "op": "GREATER_THAN_OR_EQUAL",
            "value": {"integerValue": "1000000"}
        }},
        "orderBy": [{"field": {"fieldPath": "population"}, "direction": "DESCENDING"}]
    }});
    let result = engine.run_query_json(&body.to_string(), &store).unwrap();
    let names: Vec<_> = result.documents.iter().map(|d| d.fields["name"].clone()).collect();
    assert_eq!(names, [TypedValue::from("Tokyo"), TypedValue::from("LA")]);
    assert!(result.documents.iter().all(|d| !d.fields.contains_key("population")));
    let m = engine.telemetry().snapshot();
    assert_eq!((m.queries_total, m.documents_returned_total), (1, 2));
}

#[test]
fn subcollection_and_collection_group() {
    let engine = Engine::default();
    let store = seeded(&engine);
    let query = firelite::query::parse_query_json(r#"{"from":[{"collectionId":"landmarks"}]}"#).unwrap();
    assert!(engine.run_query(&query, &store).unwrap().documents.is_empty());

    let target: QueryTarget = engine.target().with_parent("cities/sf");
    assert_eq!(engine.run_query_in(&query, &target, &store).unwrap().documents.len(), 1);

    let group = firelite::query::parse_query_json(
        r#"{"from":[{"collectionId":"landmarks","allDescendants":true}]}"#,
    )
    .unwrap();
    assert_eq!(engine.run_query(&group, &store).unwrap().documents.len(), 1);
}

#[test]
fn request_errors_are_request_errors() {
    let engine = Engine::default();
    let store = seeded(&engine);
    let cases = [
        r#"{"where":{"unaryFilter":{"op":"IS_NULL","field":{"fieldPath":"a"}}}}"#,
        r#"{"from":[{"collectionId":"cities"}],"where":{"fieldFilter":{"field":{"fieldPath":"a"},"op":"OPERATOR_UNSPECIFIED","value":{"nullValue":null}}}}"#,
        r#"{"from":[{"collectionId":"cities"}],"where":{"fieldFilter":{"field":{"fieldPath":"a"},"op":"IN","value":{"integerValue":"1"}}}}"#,
        r#"{"from":[{"collectionId":"cities"}],"limit":-1}"#,
    ];
    for body in cases {
        let err = engine.run_query_json(body, &store).unwrap_err();
        assert!(err.is_request_error(), "{body}: {err}");
    }
    assert_eq!(engine.telemetry().snapshot().queries_rejected_total, cases.len() as u64);
}
