//! Runtime representation of a schema-typed datum.

use crate::error::ValidationError;
use crate::schema::Schema;

/// A decoded or to-be-encoded datum.
///
/// Records and maps are ordered sequences of `(name, value)` pairs: records
/// in schema field order, maps in encounter order, so a decode preserves the
/// order the writer produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// Byte array
    Bytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Fixed-size byte array
    Fixed(Vec<u8>),
    /// Enum symbol
    Enum(String),
    /// Array of values
    Array(Vec<Value>),
    /// Map with string keys
    Map(Vec<(String, Value)>),
    /// Record with named fields
    Record(Vec<(String, Value)>),
}

impl Value {
    /// Look up an entry by name in a record or map.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) | Value::Map(fields) => fields
                .iter()
                .find(|(field_name, _)| field_name == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Short kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Fixed(_) => "fixed",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }

    /// Materialize a JSON field default against its declared schema.
    ///
    /// JSON defaults for `bytes` and `fixed` use the Avro convention of a
    /// string whose code points are the byte values.
    pub fn from_json(schema: &Schema, json: &serde_json::Value) -> Result<Value, ValidationError> {
        let mismatch = || {
            ValidationError::new(format!(
                "default {} does not conform to {} schema",
                json,
                schema.kind()
            ))
        };

        match schema {
            Schema::Null => match json {
                serde_json::Value::Null => Ok(Value::Null),
                _ => Err(mismatch()),
            },
            Schema::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(mismatch),
            Schema::Int => json
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int)
                .ok_or_else(mismatch),
            Schema::Long => json.as_i64().map(Value::Long).ok_or_else(mismatch),
            Schema::Float => json
                .as_f64()
                .map(|v| Value::Float(v as f32))
                .ok_or_else(mismatch),
            Schema::Double => json.as_f64().map(Value::Double).ok_or_else(mismatch),
            Schema::Bytes => json
                .as_str()
                .map(|s| Value::Bytes(chars_to_bytes(s)))
                .ok_or_else(mismatch),
            Schema::String => json
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(mismatch),
            Schema::Fixed(fixed) => {
                let bytes = json.as_str().map(chars_to_bytes).ok_or_else(mismatch)?;
                if bytes.len() != fixed.size {
                    return Err(mismatch());
                }
                Ok(Value::Fixed(bytes))
            }
            Schema::Enum(e) => {
                let symbol = json.as_str().ok_or_else(mismatch)?;
                if e.symbol_index(symbol).is_none() {
                    return Err(mismatch());
                }
                Ok(Value::Enum(symbol.to_string()))
            }
            Schema::Array(items) => {
                let arr = json.as_array().ok_or_else(mismatch)?;
                let values: Result<Vec<Value>, ValidationError> =
                    arr.iter().map(|v| Value::from_json(items, v)).collect();
                Ok(Value::Array(values?))
            }
            Schema::Map(values_schema) => {
                let obj = json.as_object().ok_or_else(mismatch)?;
                let mut entries = Vec::with_capacity(obj.len());
                for (key, value) in obj {
                    entries.push((key.clone(), Value::from_json(values_schema, value)?));
                }
                Ok(Value::Map(entries))
            }
            // A union default always conforms to the first branch
            Schema::Union(branches) => Value::from_json(&branches[0], json),
            Schema::Record(record) => {
                let obj = json.as_object().ok_or_else(mismatch)?;
                let mut fields = Vec::with_capacity(record.fields.len());
                for field in &record.fields {
                    let value = match (obj.get(&field.name), &field.default) {
                        (Some(v), _) => Value::from_json(&field.schema, v),
                        (None, Some(default)) => Value::from_json(&field.schema, default),
                        (None, None) => Err(ValidationError::new(
                            "default record is missing field with no default",
                        )
                        .push_field(&field.name)),
                    }?;
                    fields.push((field.name.clone(), value));
                }
                Ok(Value::Record(fields))
            }
        }
    }
}

/// Decode an Avro JSON byte-string: one byte per code point.
fn chars_to_bytes(s: &str) -> Vec<u8> {
    s.chars().map(|c| c as u8).collect()
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
