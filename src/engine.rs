use crate::config::EngineConfig;
use crate::errors::DbError;
use crate::query::telemetry::Telemetry;
use crate::query::{
    CompileOptions, QueryResult, QuerySpec, QueryTarget, StructuredQuery, parse_query_json, run_query,
    translate_structured_query_with,
};
use crate::store::DocumentSource;
use std::time::Instant;

/// Compiles and runs StructuredQuery requests under one configuration, with
/// its own telemetry counters.
pub struct Engine {
    config: EngineConfig,
    telemetry: Telemetry,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("metrics", &self.telemetry.snapshot())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let telemetry = Telemetry::new(config.slow_query_ms);
        Self { config, telemetry }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Root-collection target for the configured project and database.
    #[must_use]
    pub fn target(&self) -> QueryTarget {
        QueryTarget::new(&self.config.project_id, &self.config.database_id)
    }

    #[must_use]
    pub const fn compile_options(&self) -> CompileOptions {
        CompileOptions { max_filter_depth: self.config.max_filter_depth }
    }

    /// Translates a query; rejected requests are counted.
    ///
    /// # Errors
    /// Any compile error from [`translate_structured_query_with`].
    pub fn compile(&self, query: &StructuredQuery) -> Result<QuerySpec, DbError> {
        translate_structured_query_with(query, &self.compile_options()).inspect_err(|e| {
            self.telemetry.record_rejected(e);
        })
    }

    /// # Errors
    /// Any compile error; execution itself does not fail.
    pub fn run_query(
        &self,
        query: &StructuredQuery,
        source: &dyn DocumentSource,
    ) -> Result<QueryResult, DbError> {
        self.run_query_in(query, &self.target(), source)
    }

    /// Runs against an explicit target, e.g. a subcollection parent.
    ///
    /// # Errors
    /// Any compile error.
    pub fn run_query_in(
        &self,
        query: &StructuredQuery,
        target: &QueryTarget,
        source: &dyn DocumentSource,
    ) -> Result<QueryResult, DbError> {
        let spec = self.compile(query)?;
        let started = Instant::now();
        let result = run_query(&spec, target, source);
        self.telemetry.record_query(
            &spec.collection,
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            result.documents.len(),
        );
        log::debug!(
            "query on {:?} returned {} document(s)",
            spec.collection,
            result.documents.len()
        );
        Ok(result)
    }

    /// Parses a request body (bare or `{"structuredQuery": ...}`) and runs it.
    ///
    /// # Errors
    /// `DbError::Json` on malformed JSON, otherwise as [`Engine::run_query`].
    pub fn run_query_json(&self, json: &str, source: &dyn DocumentSource) -> Result<QueryResult, DbError> {
        let query = parse_query_json(json).inspect_err(|e| self.telemetry.record_rejected(e))?;
        self.run_query(&query, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::store::MemoryStore;

    fn store(engine: &Engine) -> MemoryStore {
        let root = engine.target().documents_root();
        let s = MemoryStore::new();
        for (id, n) in [("a", 1_i64), ("b", 2), ("c", 3)] {
            s.put(Document::new(format!("{root}/nums/{id}")).with_field("n", n));
        }
        s
    }

    #[test]
    fn runs_json_and_counts() {
        let engine = Engine::default();
        let s = store(&engine);
        let r = engine
            .run_query_json(
                r#"{"structuredQuery":{"from":[{"collectionId":"nums"}],
                    "where":{"fieldFilter":{"field":{"fieldPath":"n"},"op":"GREATER_THAN","value":{"integerValue":"1"}}}}}"#,
                &s,
            )
            .unwrap();
        assert_eq!(r.documents.len(), 2);
        let m = engine.telemetry().snapshot();
        assert_eq!(m.queries_total, 1);
        assert_eq!(m.documents_returned_total, 2);
    }

    #[test]
    fn rejected_queries_are_counted() {
        let engine = Engine::default();
        let s = store(&engine);
        assert!(matches!(
            engine.run_query(&StructuredQuery::default(), &s),
            Err(DbError::MissingCollection)
        ));
        assert!(engine.run_query_json("{not json", &s).is_err());
        assert_eq!(engine.telemetry().snapshot().queries_rejected_total, 2);
    }

    #[test]
    fn depth_limit_comes_from_config() {
        let engine = Engine::new(EngineConfig { max_filter_depth: 1, ..EngineConfig::default() });
        let json = r#"{"from":[{"collectionId":"nums"}],"where":{"compositeFilter":{"op":"AND","filters":[
            {"compositeFilter":{"op":"AND","filters":[{"unaryFilter":{"op":"IS_NULL","field":{"fieldPath":"n"}}}]}}]}}}"#;
        let err = engine.run_query_json(json, &MemoryStore::new()).unwrap_err();
        assert!(matches!(err, DbError::FilterTooDeep { max: 1 }));
    }
}
