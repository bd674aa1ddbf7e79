use crate::errors::DbError;
use crate::value::{TypedValue, decode_fields};
use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored document in its wire form: full resource name plus typed fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, TypedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: BTreeMap::new(), create_time: None, update_time: None }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Decodes every field into its native form.
    ///
    /// # Errors
    /// Propagates the first conversion failure.
    pub fn decode(&self) -> Result<BsonDocument, DbError> {
        decode_fields(&self.fields)
    }

    /// The last path segment of the resource name.
    #[must_use]
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}
