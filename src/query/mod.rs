//! StructuredQuery compilation, matching, ordering and execution.

pub mod compile;
pub mod eval;
pub mod exec;
pub mod telemetry;
mod parse;
mod types;

pub use compile::{
    BoundOp, CompileOptions, DEFAULT_MAX_FILTER_DEPTH, compile_cursor, compile_filter,
    compile_filter_with, compile_json, translate_structured_query, translate_structured_query_with,
};
pub use eval::{DecodedDocument, compare_docs, compare_values, eval_condition, matches, project_fields, values_equal};
pub use exec::{QueryMetadata, QueryResult, QueryTarget, RunQueryResponseItem, execute, run_query};
pub use parse::{parse_filter_json, parse_query_json};
pub use types::{
    CollectionSelector, CompositeFilterWire, CompositeOperator, Condition, Cursor, Direction,
    FieldFilterWire, FieldOperator, FieldReference, Filter, FilterWire, Limit, OrderWire,
    Predicate, Projection, QuerySpec, RunQueryRequest, SortKey, StructuredQuery, UnaryFilterWire,
    UnaryOperator,
};
