#![no_main]
use firelite::{Document, MemoryStore, TypedValue};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        let engine = firelite::Engine::default();
        let root = engine.target().documents_root();
        let store = MemoryStore::new();
        store.put(Document::new(format!("{root}/c/a")).with_field("a", 1_i64).with_field("name", "x"));
        store.put(
            Document::new(format!("{root}/c/b"))
                .with_field("a", f64::NAN)
                .with_field("tags", TypedValue::array(vec!["x".into()])),
        );
        store.put(Document::new(format!("{root}/c/a/sub/s")).with_field("a", TypedValue::null()));
        let _ = engine.run_query_json(s, &store);
    }
});
