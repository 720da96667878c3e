//! Recursive, schema-driven datum encoding and decoding.
//!
//! The datum layer walks a schema tree and a [`ByteBuffer`] in lockstep.
//! Reading takes a *pair* of schemas: the writer's (what is on the wire) and
//! the reader's (what the caller wants back). Where they diverge, resolution
//! applies: writer-only record fields are skipped without materializing,
//! union branches are re-matched against the reader's union, and everything
//! else follows the writer's encoding.

use tracing::debug;

use crate::buffer::ByteBuffer;
use crate::decode;
use crate::encode;
use crate::error::{Error, IoError, ValidationError};
use crate::schema::{EnumSchema, RecordSchema, Schema};
use crate::value::Value;

/// Reads datums encoded under a writer schema, optionally resolving them
/// into a different reader schema.
#[derive(Debug, Clone, Default)]
pub struct DatumReader {
    /// Schema the data was written with (from the file header).
    pub writers_schema: Option<Schema>,
    /// Schema to decode into; defaults to the writer's schema.
    pub readers_schema: Option<Schema>,
}

impl DatumReader {
    /// Create a reader with no schemas attached yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reader with an explicit reader schema for resolution.
    pub fn with_readers_schema(readers_schema: Schema) -> Self {
        Self {
            writers_schema: None,
            readers_schema: Some(readers_schema),
        }
    }

    /// Read one datum using the attached schema pair.
    ///
    /// # Errors
    /// [`Error::Io`] if no writer schema is attached or the encoding is
    /// malformed; a delay-read [`Error::Block`] if the buffer does not yet
    /// hold the complete datum.
    pub fn read(&self, buf: &mut ByteBuffer) -> Result<Value, Error> {
        let writers = self.writers_schema.as_ref().ok_or_else(|| {
            Error::Schema(crate::error::SchemaError::InvalidSchema(
                "no writer schema attached".to_string(),
            ))
        })?;
        let readers = self.readers_schema.as_ref().unwrap_or(writers);
        self.read_data(writers, readers, buf)
    }

    /// Read one datum under an explicit (writer, reader) schema pair.
    pub fn read_data(
        &self,
        writers: &Schema,
        readers: &Schema,
        buf: &mut ByteBuffer,
    ) -> Result<Value, Error> {
        match writers {
            Schema::Null => {
                decode::read_null(buf)?;
                Ok(Value::Null)
            }
            Schema::Boolean => Ok(Value::Boolean(decode::read_boolean(buf)?)),
            Schema::Int => Ok(Value::Int(decode::read_int(buf)?)),
            Schema::Long => Ok(Value::Long(decode::read_long(buf)?)),
            Schema::Float => Ok(Value::Float(decode::read_float(buf)?)),
            Schema::Double => Ok(Value::Double(decode::read_double(buf)?)),
            Schema::Bytes => Ok(Value::Bytes(decode::read_bytes(buf)?)),
            Schema::String => Ok(Value::String(decode::read_string(buf)?)),
            Schema::Fixed(fixed) => Ok(Value::Fixed(decode::read_fixed(buf, fixed.size)?)),
            Schema::Enum(e) => self.read_enum(e, buf),
            Schema::Array(items) => self.read_array(items, readers, buf),
            Schema::Map(values) => self.read_map(values, readers, buf),
            Schema::Union(branches) => self.read_union(branches, readers, buf),
            Schema::Record(record) => self.read_record(record, readers, buf),
        }
    }

    /// Consume one datum's encoding without materializing a value.
    pub fn skip_data(&self, writers: &Schema, buf: &mut ByteBuffer) -> Result<(), Error> {
        match writers {
            Schema::Null => decode::skip_null(buf),
            Schema::Boolean => decode::skip_boolean(buf),
            Schema::Int | Schema::Long => decode::skip_long(buf),
            Schema::Float => decode::skip_float(buf),
            Schema::Double => decode::skip_double(buf),
            Schema::Bytes | Schema::String => decode::skip_bytes(buf),
            Schema::Fixed(fixed) => decode::skip_fixed(buf, fixed.size),
            Schema::Enum(_) => decode::skip_long(buf),
            Schema::Array(items) => self.skip_blocks(buf, |s, b| s.skip_data(items, b)),
            Schema::Map(values) => self.skip_blocks(buf, |s, b| {
                decode::skip_bytes(b)?;
                s.skip_data(values, b)
            }),
            Schema::Union(branches) => {
                let index = decode::read_long(buf)?;
                let branch = branches.get(usize::try_from(index).unwrap_or(usize::MAX)).ok_or(
                    IoError::UnionIndexOutOfRange {
                        index,
                        branches: branches.len(),
                    },
                )?;
                self.skip_data(branch, buf)
            }
            Schema::Record(record) => {
                for field in &record.fields {
                    self.skip_data(&field.schema, buf)?;
                }
                Ok(())
            }
        }
    }

    /// Read an enum symbol by index.
    ///
    /// An index whose absolute value falls outside the symbol list decodes
    /// to an absent value (null) rather than failing.
    fn read_enum(&self, writers: &EnumSchema, buf: &mut ByteBuffer) -> Result<Value, Error> {
        let index = decode::read_int(buf)?;
        let symbol_index = index.unsigned_abs() as usize;
        if symbol_index < writers.symbols.len() {
            Ok(Value::Enum(writers.symbols[symbol_index].clone()))
        } else {
            debug!(
                index,
                symbols = writers.symbols.len(),
                enum_name = %writers.name,
                "enum index out of range, decoding as absent"
            );
            Ok(Value::Null)
        }
    }

    /// Read a block-encoded array.
    fn read_array(
        &self,
        writer_items: &Schema,
        readers: &Schema,
        buf: &mut ByteBuffer,
    ) -> Result<Value, Error> {
        let reader_items: &Schema = match readers {
            Schema::Array(items) => items,
            _ => writer_items,
        };

        let mut items = Vec::new();
        self.read_blocks(buf, |s, b| {
            items.push(s.read_data(writer_items, reader_items, b)?);
            Ok(())
        })?;
        Ok(Value::Array(items))
    }

    /// Read a block-encoded map with string keys.
    fn read_map(
        &self,
        writer_values: &Schema,
        readers: &Schema,
        buf: &mut ByteBuffer,
    ) -> Result<Value, Error> {
        let reader_values: &Schema = match readers {
            Schema::Map(values) => values,
            _ => writer_values,
        };

        let mut entries = Vec::new();
        self.read_blocks(buf, |s, b| {
            let key = decode::read_string(b)?;
            let value = s.read_data(writer_values, reader_values, b)?;
            entries.push((key, value));
            Ok(())
        })?;
        Ok(Value::Map(entries))
    }

    /// Read a union: branch index as a long, then the value under the
    /// writer's selected branch, resolved against the reader's union.
    fn read_union(
        &self,
        writer_branches: &[Schema],
        readers: &Schema,
        buf: &mut ByteBuffer,
    ) -> Result<Value, Error> {
        let index = decode::read_long(buf)?;
        let branch_index = usize::try_from(index)
            .ok()
            .filter(|i| *i < writer_branches.len())
            .ok_or(IoError::UnionIndexOutOfRange {
                index,
                branches: writer_branches.len(),
            })?;
        let writer_branch = &writer_branches[branch_index];

        let reader_branch = match readers {
            Schema::Union(reader_branches) => reader_branches
                .get(branch_index)
                .filter(|r| branches_compatible(writer_branch, r))
                .or_else(|| {
                    reader_branches
                        .iter()
                        .find(|r| branches_compatible(writer_branch, r))
                })
                .ok_or(IoError::NoCompatibleReaderBranch(branch_index))?,
            // A non-union reader schema reads the branch directly when compatible
            other if branches_compatible(writer_branch, other) => other,
            _ => return Err(IoError::NoCompatibleReaderBranch(branch_index).into()),
        };

        self.read_data(writer_branch, reader_branch, buf)
    }

    /// Read a record, resolving writer fields against the reader's schema.
    ///
    /// Fields the reader lacks are skipped over; reader-only fields are left
    /// absent (the reader never synthesizes values the writer never wrote).
    fn read_record(
        &self,
        writers: &RecordSchema,
        readers: &Schema,
        buf: &mut ByteBuffer,
    ) -> Result<Value, Error> {
        let reader_record = match readers {
            Schema::Record(r) => Some(r),
            _ => None,
        };

        let mut fields = Vec::with_capacity(writers.fields.len());
        for field in &writers.fields {
            let reader_field = match reader_record {
                Some(r) => r.field(&field.name),
                // Reading with the writer's own schema keeps every field
                None => Some(field),
            };
            match reader_field {
                Some(rf) => {
                    let value = self.read_data(&field.schema, &rf.schema, buf)?;
                    fields.push((field.name.clone(), value));
                }
                None => {
                    debug!(field = %field.name, record = %writers.name, "skipping writer-only field");
                    self.skip_data(&field.schema, buf)?;
                }
            }
        }
        Ok(Value::Record(fields))
    }

    /// Drive a per-item closure over length-prefixed blocks until the
    /// terminating zero count. A negative count is followed by a byte size
    /// for the block, then `|count|` items.
    fn read_blocks(
        &self,
        buf: &mut ByteBuffer,
        mut item: impl FnMut(&Self, &mut ByteBuffer) -> Result<(), Error>,
    ) -> Result<(), Error> {
        loop {
            let mut count = decode::read_long(buf)?;
            if count == 0 {
                return Ok(());
            }
            if count < 0 {
                let _byte_size = decode::read_long(buf)?;
                count = -count;
            }
            for _ in 0..count {
                item(self, buf)?;
            }
        }
    }

    /// Skip length-prefixed blocks; a sized block is skipped whole without
    /// decoding its items.
    fn skip_blocks(
        &self,
        buf: &mut ByteBuffer,
        mut item: impl FnMut(&Self, &mut ByteBuffer) -> Result<(), Error>,
    ) -> Result<(), Error> {
        loop {
            let count = decode::read_long(buf)?;
            if count == 0 {
                return Ok(());
            }
            if count < 0 {
                let byte_size = decode::read_long(buf)?;
                if byte_size < 0 {
                    return Err(crate::error::BlockError::NegativeLength(byte_size).into());
                }
                buf.skip(byte_size)?;
            } else {
                for _ in 0..count {
                    item(self, buf)?;
                }
            }
        }
    }
}

/// Writes datums under a single writer schema, validating each value's shape
/// before any of its bytes are emitted.
#[derive(Debug, Clone, Default)]
pub struct DatumWriter {
    /// Schema every written datum must conform to.
    pub writers_schema: Option<Schema>,
}

impl DatumWriter {
    /// Create a writer with no schema attached yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer for the given schema.
    pub fn with_schema(writers_schema: Schema) -> Self {
        Self {
            writers_schema: Some(writers_schema),
        }
    }

    /// Validate and encode one datum using the attached schema.
    ///
    /// # Errors
    /// [`Error::Validation`] with a dotted field path if the datum does not
    /// conform; nothing is written to the buffer in that case.
    pub fn write(&self, datum: &Value, buf: &mut ByteBuffer) -> Result<(), Error> {
        let writers = self.writers_schema.as_ref().ok_or_else(|| {
            Error::Schema(crate::error::SchemaError::InvalidSchema(
                "no writer schema attached".to_string(),
            ))
        })?;
        validate_value(writers, datum)?;
        self.write_data(writers, datum, buf)
    }

    /// Encode one datum under an explicit schema.
    pub fn write_data(
        &self,
        schema: &Schema,
        datum: &Value,
        buf: &mut ByteBuffer,
    ) -> Result<(), Error> {
        match (schema, datum) {
            (Schema::Null, Value::Null) => {
                encode::write_null(buf);
                Ok(())
            }
            (Schema::Boolean, Value::Boolean(v)) => {
                encode::write_boolean(buf, *v);
                Ok(())
            }
            (Schema::Int, Value::Int(v)) => {
                encode::write_int(buf, *v);
                Ok(())
            }
            (Schema::Long, Value::Long(v)) => {
                encode::write_long(buf, *v);
                Ok(())
            }
            (Schema::Long, Value::Int(v)) => {
                encode::write_long(buf, *v as i64);
                Ok(())
            }
            (Schema::Float, Value::Float(v)) => {
                encode::write_float(buf, *v);
                Ok(())
            }
            (Schema::Double, Value::Double(v)) => {
                encode::write_double(buf, *v);
                Ok(())
            }
            (Schema::Bytes, Value::Bytes(v)) => {
                encode::write_bytes(buf, v);
                Ok(())
            }
            (Schema::String, Value::String(v)) => {
                encode::write_string(buf, v);
                Ok(())
            }
            (Schema::Fixed(fixed), Value::Fixed(v) | Value::Bytes(v)) => {
                if v.len() != fixed.size {
                    return Err(ValidationError::new(format!(
                        "fixed value has {} bytes, schema requires {}",
                        v.len(),
                        fixed.size
                    ))
                    .into());
                }
                encode::write_fixed(buf, v);
                Ok(())
            }
            (Schema::Enum(e), Value::Enum(symbol) | Value::String(symbol)) => {
                self.write_enum(e, symbol, buf)
            }
            (Schema::Array(items), Value::Array(values)) => self.write_array(items, values, buf),
            (Schema::Map(values_schema), Value::Map(entries)) => {
                self.write_map(values_schema, entries, buf)
            }
            (Schema::Union(branches), _) => self.write_union(branches, datum, buf),
            (Schema::Record(record), _) => self.write_record(record, datum, buf),
            (schema, datum) => Err(ValidationError::new(format!(
                "expected {}, got {}",
                schema.kind(),
                datum.kind()
            ))
            .into()),
        }
    }

    fn write_enum(&self, e: &EnumSchema, symbol: &str, buf: &mut ByteBuffer) -> Result<(), Error> {
        let index = e.symbol_index(symbol).ok_or_else(|| {
            ValidationError::new(format!("'{}' is not a symbol of enum {}", symbol, e.name))
        })?;
        encode::write_int(buf, index as i32);
        Ok(())
    }

    /// Encode an array as a single counted block plus the zero terminator.
    fn write_array(
        &self,
        items: &Schema,
        values: &[Value],
        buf: &mut ByteBuffer,
    ) -> Result<(), Error> {
        if !values.is_empty() {
            encode::write_long(buf, values.len() as i64);
            for value in values {
                self.write_data(items, value, buf)?;
            }
        }
        encode::write_long(buf, 0);
        Ok(())
    }

    /// Encode a map as a single counted block plus the zero terminator.
    fn write_map(
        &self,
        values_schema: &Schema,
        entries: &[(String, Value)],
        buf: &mut ByteBuffer,
    ) -> Result<(), Error> {
        if !entries.is_empty() {
            encode::write_long(buf, entries.len() as i64);
            for (key, value) in entries {
                encode::write_string(buf, key);
                self.write_data(values_schema, value, buf)?;
            }
        }
        encode::write_long(buf, 0);
        Ok(())
    }

    /// Encode a union: scan branches in schema order and emit the first one
    /// whose validator accepts the datum's shape, as a long index followed by
    /// the value under that branch.
    fn write_union(
        &self,
        branches: &[Schema],
        datum: &Value,
        buf: &mut ByteBuffer,
    ) -> Result<(), Error> {
        let index = branches
            .iter()
            .position(|branch| validates(branch, datum))
            .ok_or_else(|| IoError::NoMatchingBranch(datum.kind().to_string()))?;
        encode::write_long(buf, index as i64);
        self.write_data(&branches[index], datum, buf)
    }

    /// Encode a record field by field in schema order. A field missing from
    /// the datum encodes its declared default; a validation failure in a
    /// nested value comes back with this field's name prefixed to its path.
    fn write_record(
        &self,
        record: &RecordSchema,
        datum: &Value,
        buf: &mut ByteBuffer,
    ) -> Result<(), Error> {
        if !matches!(datum, Value::Record(_) | Value::Map(_)) {
            return Err(ValidationError::new(format!(
                "expected record, got {}",
                datum.kind()
            ))
            .into());
        }

        for field in &record.fields {
            let result = match (datum.get(&field.name), &field.default) {
                (Some(value), _) => self.write_data(&field.schema, value, buf),
                (None, Some(default)) => {
                    let value = Value::from_json(&field.schema, default).map_err(Error::Validation)?;
                    self.write_data(&field.schema, &value, buf)
                }
                (None, None) => {
                    Err(ValidationError::new("missing value for field with no default").into())
                }
            };
            result.map_err(|e| match e {
                Error::Validation(v) => Error::Validation(v.push_field(&field.name)),
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Whether a datum's shape conforms to a schema. Used for union branch
/// discrimination, so it recurses structurally through records, arrays and
/// maps.
pub fn validates(schema: &Schema, datum: &Value) -> bool {
    validate_value(schema, datum).is_ok()
}

/// Validate a datum against a schema, reporting the dotted path of the first
/// offending record field.
pub fn validate_value(schema: &Schema, datum: &Value) -> Result<(), ValidationError> {
    let mismatch = || {
        ValidationError::new(format!(
            "expected {}, got {}",
            schema.kind(),
            datum.kind()
        ))
    };

    match (schema, datum) {
        (Schema::Null, Value::Null) => Ok(()),
        (Schema::Boolean, Value::Boolean(_)) => Ok(()),
        (Schema::Int, Value::Int(_)) => Ok(()),
        (Schema::Long, Value::Long(_) | Value::Int(_)) => Ok(()),
        (Schema::Float, Value::Float(_)) => Ok(()),
        (Schema::Double, Value::Double(_)) => Ok(()),
        (Schema::Bytes, Value::Bytes(_)) => Ok(()),
        (Schema::String, Value::String(_)) => Ok(()),
        (Schema::Fixed(fixed), Value::Fixed(bytes) | Value::Bytes(bytes)) => {
            if bytes.len() == fixed.size {
                Ok(())
            } else {
                Err(ValidationError::new(format!(
                    "fixed value has {} bytes, schema requires {}",
                    bytes.len(),
                    fixed.size
                )))
            }
        }
        (Schema::Enum(e), Value::Enum(symbol) | Value::String(symbol)) => {
            if e.symbol_index(symbol).is_some() {
                Ok(())
            } else {
                Err(ValidationError::new(format!(
                    "'{}' is not a symbol of enum {}",
                    symbol, e.name
                )))
            }
        }
        (Schema::Array(items), Value::Array(values)) => {
            values.iter().try_for_each(|v| validate_value(items, v))
        }
        (Schema::Map(values_schema), Value::Map(entries)) => entries
            .iter()
            .try_for_each(|(_, v)| validate_value(values_schema, v)),
        (Schema::Union(branches), _) => {
            if branches.iter().any(|b| validates(b, datum)) {
                Ok(())
            } else {
                Err(ValidationError::new(format!(
                    "{} does not match any union branch",
                    datum.kind()
                )))
            }
        }
        (Schema::Record(record), Value::Record(_) | Value::Map(_)) => {
            for field in &record.fields {
                match (datum.get(&field.name), &field.default) {
                    (Some(value), _) => validate_value(&field.schema, value)
                        .map_err(|e| e.push_field(&field.name))?,
                    (None, Some(_)) => {}
                    (None, None) => {
                        return Err(ValidationError::new(
                            "missing value for field with no default",
                        )
                        .push_field(&field.name))
                    }
                }
            }
            Ok(())
        }
        _ => Err(mismatch()),
    }
}

/// Whether a reader union branch can decode a value written under a writer
/// branch: same kind, and for fixed, the same size.
fn branches_compatible(writer: &Schema, reader: &Schema) -> bool {
    match (writer, reader) {
        (Schema::Fixed(w), Schema::Fixed(r)) => w.size == r.size,
        (w, r) => w.kind() == r.kind(),
    }
}
