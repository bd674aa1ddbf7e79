use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};
use serde::{Serialize, Serializer};
use std::fmt;

/// Reserved path that addresses the document's own resource name.
pub const DOCUMENT_NAME: &str = "__name__";

pub(crate) const MAX_PATH_DEPTH: usize = 32;

/// A parsed field path: dot separated segments, backticks quote a segment that
/// contains dots or other non-identifier characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// # Errors
    /// Returns `InvalidValue` for empty segments, an unterminated backtick or a
    /// path deeper than the supported nesting.
    pub fn parse(raw: &str) -> Result<Self, DbError> {
        let invalid = |why: &str| DbError::InvalidValue(format!("field path {raw:?}: {why}"));
        let mut segments = Vec::new();
        let mut chars = raw.chars().peekable();
        loop {
            let mut seg = String::new();
            if chars.peek() == Some(&'`') {
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '`' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some(escaped) => seg.push(escaped),
                            None => return Err(invalid("dangling escape")),
                        },
                        _ => seg.push(c),
                    }
                }
                if !closed {
                    return Err(invalid("unterminated backtick"));
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == '.' {
                        break;
                    }
                    seg.push(c);
                    chars.next();
                }
            }
            if seg.is_empty() {
                return Err(invalid("empty segment"));
            }
            segments.push(seg);
            match chars.next() {
                None => break,
                Some('.') => {}
                Some(_) => return Err(invalid("expected '.' after quoted segment")),
            }
        }
        if segments.len() > MAX_PATH_DEPTH {
            return Err(invalid("too deeply nested"));
        }
        Ok(Self { segments })
    }

    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: segments.into_iter().map(Into::into).collect() }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn is_document_name(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == DOCUMENT_NAME
    }

    /// Walks the path through nested documents. A missing or non-map
    /// intermediate yields `None`.
    #[must_use]
    pub fn resolve<'a>(&self, doc: &'a BsonDocument) -> Option<&'a Bson> {
        let (last, parents) = self.segments.split_last()?;
        let mut cur = doc;
        for seg in parents {
            match cur.get(seg) {
                Some(Bson::Document(d)) => cur = d,
                _ => return None,
            }
        }
        cur.get(last)
    }
}

fn is_simple_segment(seg: &str) -> bool {
    let mut chars = seg.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if is_simple_segment(seg) {
                f.write_str(seg)?;
            } else {
                f.write_str("`")?;
                for c in seg.chars() {
                    if c == '`' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("`")?;
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
