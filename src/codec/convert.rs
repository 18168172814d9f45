//! Record conversion: flatten and rehydrate
//!
//! flatten: structured record → flat record. Every value is type-checked
//! first. Serialized columns receive the encoded composite value, scalar
//! columns are copied in their stored form after the timezone policy check.
//!
//! rehydrate: flat record → structured record. Columns missing from the flat
//! record are skipped (their defaults apply), serialized columns are decoded
//! with the declared type, timestamp columns are normalised.

use super::errors::{CodecError, CodecResult};
use super::serialized::{decode_field, encode_field};
use super::timezone::TimezoneEnforcer;
use crate::schema::{FlatField, FlatSchema, SchemaError, StructuredSchema, ValidationDetails};
use crate::value::{FlatRecord, Record, Value};

/// Converts a structured record into a flat record.
///
/// # Errors
///
/// - `RecordTypeMismatch`: the record was built for another schema
/// - `Schema(InvalidRecord)`: a field is missing, undeclared or mistyped
/// - `TimezoneMismatch`: a timestamp violates the fixed-timezone policy
/// - `Encode`: a composite value cannot be encoded
pub fn flatten(record: &Record, flat: &FlatSchema) -> CodecResult<FlatRecord> {
    flat.validate()?;

    if record.schema_name() != flat.source_schema() {
        return Err(CodecError::RecordTypeMismatch {
            expected: flat.source_schema().to_string(),
            actual: record.schema_name().to_string(),
        });
    }

    if let Some((extra, _)) = record.fields().find(|(name, _)| flat.field(name).is_none()) {
        return Err(SchemaError::invalid_record(flat.source_schema(), ValidationDetails::extra_field(extra)).into());
    }

    let mut row = FlatRecord::with_capacity(flat.fields().len());
    for field in flat.fields() {
        let value = record.get(field.name()).ok_or_else(|| {
            SchemaError::invalid_record(flat.source_schema(), ValidationDetails::missing_field(field.name()))
        })?;

        let stored = match field {
            FlatField::Serialized { name, source_type } => {
                source_type
                    .check_value(value, name)
                    .map_err(|details| SchemaError::invalid_record(flat.source_schema(), details))?;
                Value::Str(encode_field(source_type, value, name)?)
            }
            FlatField::Scalar { descriptor, .. } => {
                descriptor
                    .field_type
                    .check_value(value, &descriptor.name)
                    .map_err(|details| SchemaError::invalid_record(flat.source_schema(), details))?;
                TimezoneEnforcer::canonical(&descriptor.name, value, field.fixed_timezone())?
            }
        };
        row.push(field.name(), stored);
    }

    Ok(row)
}

/// Converts a flat record back into a structured record.
///
/// # Errors
///
/// - `Decode`: a serialized column does not hold a valid encoding
/// - `TimezoneMismatch`: a stored timestamp carries a foreign zone
/// - `Schema(InvalidRecord)`: the resulting record does not conform
pub fn rehydrate(flat_record: &FlatRecord, flat: &FlatSchema, structured: &StructuredSchema) -> CodecResult<Record> {
    if flat.source_schema() != structured.name() {
        return Err(CodecError::RecordTypeMismatch {
            expected: structured.name().to_string(),
            actual: flat.source_schema().to_string(),
        });
    }

    let mut values = Vec::with_capacity(structured.fields().len());
    for descriptor in structured.fields() {
        let (Some(stored), Some(field)) = (flat_record.get(&descriptor.name), flat.field(&descriptor.name)) else {
            continue;
        };

        let value = match field {
            FlatField::Serialized { name, source_type } => {
                let text = stored.as_str().ok_or_else(|| {
                    CodecError::decode(name, format!("expected serialized string, got {}", stored.type_name()))
                })?;
                decode_field(source_type, text, name)?
            }
            FlatField::Scalar { .. } => {
                TimezoneEnforcer::normalize(&descriptor.name, stored.clone(), field.fixed_timezone())?
            }
        };
        values.push((descriptor.name.clone(), value));
    }

    Ok(structured.record(values)?)
}
