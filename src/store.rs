//! The document-store seam the executor reads from.
//!
//! Writes, preconditions and concurrency control belong to whoever owns the
//! store; a query only ever sees an owned snapshot.

use crate::document::Document;
use crate::errors::DbError;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Supplies a point-in-time view of every stored document, keyed by full path.
pub trait DocumentSource {
    fn snapshot(&self) -> BTreeMap<String, Document>;
}

impl DocumentSource for BTreeMap<String, Document> {
    fn snapshot(&self) -> BTreeMap<String, Document> {
        self.clone()
    }
}

/// In-process store. Each instance is independent; there is no shared global map.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Document>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentsFile {
    List(Vec<Document>),
    ByPath(BTreeMap<String, Document>),
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the document stored under its name.
    pub fn put(&self, doc: Document) -> Option<Document> {
        self.docs.write().insert(doc.name.clone(), doc)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Document> {
        self.docs.read().get(name).cloned()
    }

    pub fn delete(&self, name: &str) -> bool {
        self.docs.write().remove(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Loads documents from JSON: either an array of documents or an object
    /// mapping path to document. Returns how many documents were stored.
    ///
    /// # Errors
    /// Returns an error if the JSON does not match either shape.
    pub fn load_json(&self, json: &str) -> Result<usize, DbError> {
        let docs: Vec<Document> = match serde_json::from_str::<DocumentsFile>(json)? {
            DocumentsFile::List(v) => v,
            DocumentsFile::ByPath(m) => m
                .into_iter()
                .map(|(path, mut d)| {
                    if d.name.is_empty() {
                        d.name = path;
                    }
                    d
                })
                .collect(),
        };
        let n = docs.len();
        let mut w = self.docs.write();
        for d in docs {
            w.insert(d.name.clone(), d);
        }
        log::debug!("loaded {n} documents into memory store");
        Ok(n)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: &Path) -> Result<usize, DbError> {
        let s = std::fs::read_to_string(path)?;
        self.load_json(&s)
    }
}

impl DocumentSource for MemoryStore {
    fn snapshot(&self) -> BTreeMap<String, Document> {
        self.docs.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let s = MemoryStore::new();
        assert!(s.is_empty());
        assert!(s.put(Document::new("projects/p/databases/d/documents/c/a")).is_none());
        assert!(s.put(Document::new("projects/p/databases/d/documents/c/a").with_field("x", 1i64)).is_some());
        assert_eq!(s.len(), 1);
        assert_eq!(s.get("projects/p/databases/d/documents/c/a").unwrap().fields.len(), 1);
        assert!(s.delete("projects/p/databases/d/documents/c/a"));
        assert!(!s.delete("projects/p/databases/d/documents/c/a"));
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let s = MemoryStore::new();
        s.put(Document::new("projects/p/databases/d/documents/c/a"));
        let snap = s.snapshot();
        s.put(Document::new("projects/p/databases/d/documents/c/b"));
        assert_eq!(snap.len(), 1);
        assert_eq!(s.snapshot().len(), 2);
    }

    #[test]
    fn load_json_accepts_list_and_map() {
        let s = MemoryStore::new();
        let n = s
            .load_json(r#"[{"name":"projects/p/databases/d/documents/c/a","fields":{}}]"#)
            .unwrap();
        assert_eq!(n, 1);
        let n = s
            .load_json(r#"{"projects/p/databases/d/documents/c/b":{"fields":{"v":{"booleanValue":true}}}}"#)
            .unwrap();
        assert_eq!(n, 1);
        assert!(s.get("projects/p/databases/d/documents/c/b").is_some());
        assert!(s.load_json("42").is_err());
    }
}
