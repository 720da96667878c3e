//! JSON schema parser.
//!
//! Parses a textual schema declaration (the `avro.schema` header entry, or a
//! caller-supplied reader schema) into the [`Schema`] tree.

use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::{EnumSchema, FieldSchema, FixedSchema, RecordSchema, Schema};

/// Parse a schema from a JSON string.
///
/// # Errors
/// [`SchemaError`] if the JSON is malformed or does not describe a valid
/// schema.
///
/// # Example
/// ```
/// use avrofile::schema::parse_schema;
///
/// let schema = parse_schema(r#""string""#).unwrap();
/// ```
pub fn parse_schema(json: &str) -> Result<Schema, SchemaError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;
    parse_schema_value(&value)
}

/// Parse a schema from an already-parsed JSON value.
pub fn parse_schema_value(value: &Value) -> Result<Schema, SchemaError> {
    match value {
        Value::String(s) => parse_primitive(s),
        Value::Object(obj) => parse_object(obj),
        Value::Array(arr) => parse_union(arr),
        other => Err(SchemaError::InvalidSchema(format!(
            "Expected string, object, or array, found: {:?}",
            other
        ))),
    }
}

fn parse_primitive(name: &str) -> Result<Schema, SchemaError> {
    match name {
        "null" => Ok(Schema::Null),
        "boolean" => Ok(Schema::Boolean),
        "int" => Ok(Schema::Int),
        "long" => Ok(Schema::Long),
        "float" => Ok(Schema::Float),
        "double" => Ok(Schema::Double),
        "bytes" => Ok(Schema::Bytes),
        "string" => Ok(Schema::String),
        other => Err(SchemaError::UnsupportedType(other.to_string())),
    }
}

fn parse_object(obj: &serde_json::Map<String, Value>) -> Result<Schema, SchemaError> {
    let type_str = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SchemaError::InvalidSchema("Missing 'type' field".to_string()))?;

    match type_str {
        // Primitives may also be spelled as objects
        "null" | "boolean" | "int" | "long" | "float" | "double" | "bytes" | "string" => {
            parse_primitive(type_str)
        }
        // The RPC-flavored record kinds are record-shaped and treated identically
        "record" | "errors" | "request" => parse_record(obj),
        "enum" => parse_enum(obj),
        "array" => parse_array(obj),
        "map" => parse_map(obj),
        "fixed" => parse_fixed(obj),
        other => Err(SchemaError::UnsupportedType(format!(
            "Unknown type: {}",
            other
        ))),
    }
}

fn parse_union(arr: &[Value]) -> Result<Schema, SchemaError> {
    if arr.is_empty() {
        return Err(SchemaError::InvalidSchema(
            "Union schema cannot be empty".to_string(),
        ));
    }

    let branches: Vec<Schema> = arr
        .iter()
        .map(parse_schema_value)
        .collect::<Result<_, _>>()?;

    // Unions must not immediately contain other unions
    if branches.iter().any(|b| matches!(b, Schema::Union(_))) {
        return Err(SchemaError::InvalidSchema(
            "Union schema cannot immediately contain another union".to_string(),
        ));
    }

    Ok(Schema::Union(branches))
}

fn required_name(obj: &serde_json::Map<String, Value>, kind: &str) -> Result<String, SchemaError> {
    obj.get("name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| SchemaError::InvalidSchema(format!("{} schema missing 'name'", kind)))
}

fn parse_record(obj: &serde_json::Map<String, Value>) -> Result<Schema, SchemaError> {
    let name = required_name(obj, "record")?;
    let fields_json = obj
        .get("fields")
        .and_then(|v| v.as_array())
        .ok_or_else(|| SchemaError::InvalidSchema("record schema missing 'fields'".to_string()))?;

    let mut fields = Vec::with_capacity(fields_json.len());
    for field in fields_json {
        let field_obj = field.as_object().ok_or_else(|| {
            SchemaError::InvalidSchema("record field must be an object".to_string())
        })?;
        let field_name = required_name(field_obj, "field")?;
        let field_type = field_obj.get("type").ok_or_else(|| {
            SchemaError::InvalidSchema(format!("field '{}' missing 'type'", field_name))
        })?;
        let mut parsed = FieldSchema::new(field_name, parse_schema_value(field_type)?);
        if let Some(default) = field_obj.get("default") {
            parsed = parsed.with_default(default.clone());
        }
        fields.push(parsed);
    }

    Ok(Schema::Record(RecordSchema::new(name, fields)))
}

fn parse_enum(obj: &serde_json::Map<String, Value>) -> Result<Schema, SchemaError> {
    let name = required_name(obj, "enum")?;
    let symbols_json = obj
        .get("symbols")
        .and_then(|v| v.as_array())
        .ok_or_else(|| SchemaError::InvalidSchema("enum schema missing 'symbols'".to_string()))?;

    let symbols: Vec<String> = symbols_json
        .iter()
        .map(|s| {
            s.as_str().map(str::to_string).ok_or_else(|| {
                SchemaError::InvalidSchema("enum symbols must be strings".to_string())
            })
        })
        .collect::<Result<_, _>>()?;

    Ok(Schema::Enum(EnumSchema::new(name, symbols)))
}

fn parse_array(obj: &serde_json::Map<String, Value>) -> Result<Schema, SchemaError> {
    let items = obj
        .get("items")
        .ok_or_else(|| SchemaError::InvalidSchema("array schema missing 'items'".to_string()))?;
    Ok(Schema::Array(Box::new(parse_schema_value(items)?)))
}

fn parse_map(obj: &serde_json::Map<String, Value>) -> Result<Schema, SchemaError> {
    let values = obj
        .get("values")
        .ok_or_else(|| SchemaError::InvalidSchema("map schema missing 'values'".to_string()))?;
    Ok(Schema::Map(Box::new(parse_schema_value(values)?)))
}

fn parse_fixed(obj: &serde_json::Map<String, Value>) -> Result<Schema, SchemaError> {
    let name = required_name(obj, "fixed")?;
    let size = obj
        .get("size")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| SchemaError::InvalidSchema("fixed schema missing 'size'".to_string()))?;
    Ok(Schema::Fixed(FixedSchema::new(name, size as usize)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        for (name, expected) in [
            ("null", Schema::Null),
            ("boolean", Schema::Boolean),
            ("int", Schema::Int),
            ("long", Schema::Long),
            ("float", Schema::Float),
            ("double", Schema::Double),
            ("bytes", Schema::Bytes),
            ("string", Schema::String),
        ] {
            let schema = parse_schema(&format!("\"{}\"", name)).unwrap();
            assert_eq!(schema, expected);
        }
    }

    #[test]
    fn test_parse_primitive_as_object() {
        let schema = parse_schema(r#"{"type": "long"}"#).unwrap();
        assert_eq!(schema, Schema::Long);
    }

    #[test]
    fn test_parse_record() {
        let schema = parse_schema(
            r#"{
                "type": "record",
                "name": "User",
                "fields": [
                    {"name": "username", "type": "string"},
                    {"name": "age", "type": "int", "default": 0}
                ]
            }"#,
        )
        .unwrap();

        let record = match schema {
            Schema::Record(r) => r,
            other => panic!("expected record, got {:?}", other),
        };
        assert_eq!(record.name, "User");
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.fields[0].name, "username");
        assert_eq!(record.fields[1].default, Some(serde_json::json!(0)));
    }

    #[test]
    fn test_parse_errors_and_request_as_record() {
        for kind in ["errors", "request"] {
            let schema = parse_schema(&format!(
                r#"{{"type": "{}", "name": "Call", "fields": []}}"#,
                kind
            ))
            .unwrap();
            assert!(matches!(schema, Schema::Record(_)));
        }
    }

    #[test]
    fn test_parse_enum() {
        let schema =
            parse_schema(r#"{"type": "enum", "name": "Suit", "symbols": ["HEARTS", "SPADES"]}"#)
                .unwrap();
        let e = match schema {
            Schema::Enum(e) => e,
            other => panic!("expected enum, got {:?}", other),
        };
        assert_eq!(e.symbols, vec!["HEARTS", "SPADES"]);
    }

    #[test]
    fn test_parse_array_and_map() {
        let schema = parse_schema(r#"{"type": "array", "items": "long"}"#).unwrap();
        assert_eq!(schema, Schema::Array(Box::new(Schema::Long)));

        let schema = parse_schema(r#"{"type": "map", "values": "bytes"}"#).unwrap();
        assert_eq!(schema, Schema::Map(Box::new(Schema::Bytes)));
    }

    #[test]
    fn test_parse_fixed() {
        let schema = parse_schema(r#"{"type": "fixed", "name": "sync", "size": 16}"#).unwrap();
        assert_eq!(schema, Schema::Fixed(FixedSchema::new("sync", 16)));
    }

    #[test]
    fn test_parse_union() {
        let schema = parse_schema(r#"["string", "int", "null"]"#).unwrap();
        assert_eq!(
            schema,
            Schema::Union(vec![Schema::String, Schema::Int, Schema::Null])
        );
    }

    #[test]
    fn test_parse_nested_record() {
        let schema = parse_schema(
            r#"{
                "type": "record",
                "name": "Outer",
                "fields": [
                    {"name": "inner", "type": {
                        "type": "record",
                        "name": "Inner",
                        "fields": [{"name": "value", "type": ["string", "int", "null"]}]
                    }}
                ]
            }"#,
        )
        .unwrap();
        assert!(matches!(schema, Schema::Record(_)));
    }

    #[test]
    fn test_reject_empty_union() {
        assert!(matches!(
            parse_schema("[]"),
            Err(SchemaError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_reject_nested_union() {
        assert!(matches!(
            parse_schema(r#"["int", ["string", "null"]]"#),
            Err(SchemaError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_reject_unknown_type() {
        assert!(matches!(
            parse_schema(r#""decimal""#),
            Err(SchemaError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_reject_invalid_json() {
        assert!(matches!(
            parse_schema("{not json"),
            Err(SchemaError::ParseError(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let text = r#"{
            "type": "record",
            "name": "nested",
            "fields": [
                {"name": "key", "type": "string"},
                {"name": "flag", "type": "boolean"},
                {"name": "value", "type": ["string", "int", "null"]}
            ]
        }"#;
        let schema = parse_schema(text).unwrap();
        let reparsed = parse_schema(&schema.to_json()).unwrap();
        assert_eq!(schema, reparsed);
    }
}
