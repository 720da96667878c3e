//! Schema model: the type tree the datum layer walks, and its JSON parser.

mod parser;
mod types;

pub use parser::{parse_schema, parse_schema_value};
pub use types::{EnumSchema, FieldSchema, FixedSchema, RecordSchema, Schema};
