use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("query has no collection selector")]
    MissingCollection,

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("malformed filter: {0}")]
    MalformedFilter(String),

    #[error("filter nesting exceeds {max} levels")]
    FilterTooDeep { max: usize },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("config error: {0}")]
    Config(String),
}

impl DbError {
    /// True for errors caused by the shape or content of the request itself.
    #[must_use]
    pub const fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCollection
                | Self::UnsupportedOperator(_)
                | Self::MalformedFilter(_)
                | Self::FilterTooDeep { .. }
                | Self::InvalidValue(_)
                | Self::Json(_)
        )
    }
}
