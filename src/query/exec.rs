use crate::document::Document;
use crate::store::DocumentSource;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::eval::{DecodedDocument, compare_docs, matches, project_fields};
use super::types::QuerySpec;

/// Where a query runs: the database, and optionally a parent document for
/// subcollection queries (e.g. `users/u1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    pub project_id: String,
    pub database_id: String,
    pub parent_path: Option<String>,
}

impl QueryTarget {
    #[must_use]
    pub fn new(project_id: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self { project_id: project_id.into(), database_id: database_id.into(), parent_path: None }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_path: impl Into<String>) -> Self {
        self.parent_path = Some(parent_path.into());
        self
    }

    #[must_use]
    pub fn documents_root(&self) -> String {
        format!("projects/{}/databases/{}/documents", self.project_id, self.database_id)
    }

    /// Full resource name of the parent the queried collection hangs off.
    #[must_use]
    pub fn parent(&self) -> String {
        let root = self.documents_root();
        match self.parent_path.as_deref().map(|p| p.trim_matches('/')) {
            Some(p) if !p.is_empty() => format!("{root}/{p}"),
            _ => root,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_results: Option<usize>,
    pub read_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub documents: Vec<Document>,
    pub metadata: QueryMetadata,
}

/// One element of the REST `runQuery` response stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponseItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    pub read_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_results: Option<usize>,
}

impl QueryResult {
    /// Renders the stream form: one item per document, or a single bare
    /// `readTime` item when nothing matched. `skippedResults` rides on the first item.
    #[must_use]
    pub fn to_run_query_response(&self) -> Vec<RunQueryResponseItem> {
        let read_time = &self.metadata.read_time;
        let mut items: Vec<RunQueryResponseItem> = self
            .documents
            .iter()
            .map(|d| RunQueryResponseItem {
                document: Some(d.clone()),
                read_time: read_time.clone(),
                skipped_results: None,
            })
            .collect();
        if items.is_empty() {
            items.push(RunQueryResponseItem {
                document: None,
                read_time: read_time.clone(),
                skipped_results: None,
            });
        }
        items[0].skipped_results = self.metadata.skipped_results;
        items
    }
}

/// Snapshots `source` and runs the query against that snapshot.
pub fn run_query<S: DocumentSource + ?Sized>(
    spec: &QuerySpec,
    target: &QueryTarget,
    source: &S,
) -> QueryResult {
    let snapshot = source.snapshot();
    execute(spec, target, &snapshot)
}

/// Full scan of `docs`: select, decode, filter, sort, skip, limit, project.
pub fn execute(
    spec: &QuerySpec,
    target: &QueryTarget,
    docs: &BTreeMap<String, Document>,
) -> QueryResult {
    let bench_start = std::time::Instant::now();
    let parent = target.parent();

    let mut candidates: Vec<(&Document, DecodedDocument)> = docs
        .values()
        .filter(|d| is_candidate(&d.name, &parent, spec))
        .filter_map(|d| match DecodedDocument::decode(d) {
            Ok(decoded) => Some((d, decoded)),
            Err(e) => {
                log::warn!("skipping undecodable document {}: {e}", d.name);
                None
            }
        })
        .collect();
    let scanned = candidates.len();

    if let Some(pred) = &spec.filter {
        candidates.retain(|(_, decoded)| matches(decoded, pred));
    }
    let matched = candidates.len();

    if let Some(keys) = spec.sort.as_deref().filter(|k| !k.is_empty()) {
        // stable: ties keep store order
        candidates.sort_by(|a, b| compare_docs(&a.1, &b.1, keys));
    }

    let skip = spec.skip.unwrap_or(0);
    let limit = spec.limit.unwrap_or(usize::MAX);
    let documents: Vec<Document> = candidates
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|(d, _)| match &spec.projection {
            Some(paths) => Document {
                name: d.name.clone(),
                fields: project_fields(&d.fields, paths),
                create_time: d.create_time.clone(),
                update_time: d.update_time.clone(),
            },
            None => d.clone(),
        })
        .collect();

    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"run_query\",\"collection\":\"{}\",\"duration_ms\":{},\"scanned\":{},\"matched\":{},\"returned\":{},\"skip\":{},\"limit\":{}}}",
        spec.collection,
        u64::try_from(bench_start.elapsed().as_millis()).unwrap_or(u64::MAX),
        scanned,
        matched,
        documents.len(),
        skip,
        spec.limit.map_or_else(|| "null".to_string(), |l| l.to_string())
    );

    QueryResult {
        documents,
        metadata: QueryMetadata {
            skipped_results: (skip > 0).then_some(skip),
            read_time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        },
    }
}

fn is_candidate(name: &str, parent: &str, spec: &QuerySpec) -> bool {
    let Some(rest) = name.strip_prefix(parent).and_then(|r| r.strip_prefix('/')) else {
        return false;
    };
    if spec.all_descendants {
        // collection/doc pairs at any depth; the last collection must match
        let segs: Vec<&str> = rest.split('/').collect();
        let n = segs.len();
        n >= 2 && n % 2 == 0 && segs[n - 2] == spec.collection && !segs[n - 1].is_empty()
    } else {
        rest.strip_prefix(spec.collection.as_str())
            .and_then(|r| r.strip_prefix('/'))
            .is_some_and(|id| !id.is_empty() && !id.contains('/'))
    }
}
