//! Schema types and JSON serialization.
//!
//! The schema tree is a closed tagged union with one case per kind, so the
//! encode/decode/skip dispatches over it are exhaustive matches.

use serde_json::{json, Map, Value};

/// An Avro schema tree, consumed read-only by the datum layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    // Primitive types
    /// Null type - no value.
    Null,
    /// Boolean type.
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit IEEE 754 floating-point.
    Float,
    /// 64-bit IEEE 754 floating-point.
    Double,
    /// Sequence of bytes.
    Bytes,
    /// Unicode string.
    String,

    // Complex types
    /// Fixed-size byte array.
    Fixed(FixedSchema),
    /// Enumeration type.
    Enum(EnumSchema),
    /// Array of items with a single schema.
    Array(Box<Schema>),
    /// Map with string keys and values of a single schema.
    Map(Box<Schema>),
    /// Union of multiple schemas.
    Union(Vec<Schema>),
    /// Record type with named fields.
    Record(RecordSchema),
}

impl Schema {
    /// Whether this is one of the eight primitive kinds.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Schema::Null
                | Schema::Boolean
                | Schema::Int
                | Schema::Long
                | Schema::Float
                | Schema::Double
                | Schema::Bytes
                | Schema::String
        )
    }

    /// Short kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Schema::Null => "null",
            Schema::Boolean => "boolean",
            Schema::Int => "int",
            Schema::Long => "long",
            Schema::Float => "float",
            Schema::Double => "double",
            Schema::Bytes => "bytes",
            Schema::String => "string",
            Schema::Fixed(_) => "fixed",
            Schema::Enum(_) => "enum",
            Schema::Array(_) => "array",
            Schema::Map(_) => "map",
            Schema::Union(_) => "union",
            Schema::Record(_) => "record",
        }
    }

    /// Serialize the schema to a JSON value.
    pub fn to_json_value(&self) -> Value {
        match self {
            Schema::Null => json!("null"),
            Schema::Boolean => json!("boolean"),
            Schema::Int => json!("int"),
            Schema::Long => json!("long"),
            Schema::Float => json!("float"),
            Schema::Double => json!("double"),
            Schema::Bytes => json!("bytes"),
            Schema::String => json!("string"),
            Schema::Fixed(fixed) => fixed.to_json_value(),
            Schema::Enum(e) => e.to_json_value(),
            Schema::Array(items) => json!({
                "type": "array",
                "items": items.to_json_value(),
            }),
            Schema::Map(values) => json!({
                "type": "map",
                "values": values.to_json_value(),
            }),
            Schema::Union(branches) => {
                Value::Array(branches.iter().map(|b| b.to_json_value()).collect())
            }
            Schema::Record(record) => record.to_json_value(),
        }
    }

    /// Serialize the schema to a JSON string, as embedded in file headers.
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }
}

/// Schema for a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    /// The name of the record.
    pub name: String,
    /// The fields of the record, in declaration order.
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    /// Create a new RecordSchema with the given name and fields.
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Serialize the record schema to a JSON value.
    pub fn to_json_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".to_string(), json!("record"));
        obj.insert("name".to_string(), json!(&self.name));
        let fields: Vec<Value> = self.fields.iter().map(|f| f.to_json_value()).collect();
        obj.insert("fields".to_string(), Value::Array(fields));
        Value::Object(obj)
    }
}

/// Schema for a field within a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    /// The name of the field.
    pub name: String,
    /// The schema of the field's value.
    pub schema: Schema,
    /// Optional default value, encoded when a datum omits the field.
    pub default: Option<Value>,
}

impl FieldSchema {
    /// Create a new FieldSchema with the given name and schema.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Serialize the field schema to a JSON value.
    pub fn to_json_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".to_string(), json!(&self.name));
        obj.insert("type".to_string(), self.schema.to_json_value());
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }
        Value::Object(obj)
    }
}

/// Schema for an enumeration type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    /// The name of the enum.
    pub name: String,
    /// The symbols of the enum, in declaration order.
    pub symbols: Vec<String>,
}

impl EnumSchema {
    /// Create a new EnumSchema with the given name and symbols.
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            symbols,
        }
    }

    /// Get the index of a symbol.
    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Serialize the enum schema to a JSON value.
    pub fn to_json_value(&self) -> Value {
        json!({
            "type": "enum",
            "name": &self.name,
            "symbols": &self.symbols,
        })
    }
}

/// Schema for a fixed-size byte array.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    /// The name of the fixed type.
    pub name: String,
    /// The size in bytes.
    pub size: usize,
}

impl FixedSchema {
    /// Create a new FixedSchema with the given name and size.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Serialize the fixed schema to a JSON value.
    pub fn to_json_value(&self) -> Value {
        json!({
            "type": "fixed",
            "name": &self.name,
            "size": self.size,
        })
    }
}
