//! Serialized-field encoding
//!
//! Composite values are stored as JSON text. The declared field type is the
//! decoding contract, so the JSON itself stays plain:
//! - sets are arrays in value order
//! - maps are objects whose keys are the scalar text form of the map key
//! - enumerations are their backing value
//! - bytes are base64, timestamps and uuids are their text form
//! - non-finite floats are the strings "NaN", "inf" and "-inf"

use std::collections::{BTreeMap, BTreeSet};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Number, Value as Json};
use uuid::Uuid;

use super::errors::{CodecError, CodecResult};
use crate::schema::{EnumBacking, EnumRepr, EnumType, FieldType};
use crate::value::{Timestamp, Value};

/// Encodes a composite value into its serialized text.
pub fn encode_field(field_type: &FieldType, value: &Value, path: &str) -> CodecResult<String> {
    let json = encode_value(field_type, value, path)?;
    serde_json::to_string(&json).map_err(|e| CodecError::encode(path, e.to_string()))
}

/// Decodes serialized text back into a value of `field_type`.
pub fn decode_field(field_type: &FieldType, text: &str, path: &str) -> CodecResult<Value> {
    let json: Json = serde_json::from_str(text).map_err(|e| CodecError::decode(path, e.to_string()))?;
    decode_value(field_type, &json, path)
}

fn encode_value(field_type: &FieldType, value: &Value, path: &str) -> CodecResult<Json> {
    match (field_type, value) {
        (FieldType::Null, Value::Null) | (FieldType::Optional(_), Value::Null) => Ok(Json::Null),
        (FieldType::Optional(inner), _) => encode_value(inner, value, path),
        (FieldType::Bool, Value::Bool(b)) => Ok(Json::Bool(*b)),
        (FieldType::Int, Value::Int(i)) => Ok(Json::from(*i)),
        (FieldType::Float, Value::Float(f)) => Ok(encode_float(*f)),
        (FieldType::Str, Value::Str(s)) => Ok(Json::String(s.clone())),
        (FieldType::Bytes, Value::Bytes(b)) => Ok(Json::String(STANDARD.encode(b))),
        (FieldType::Timestamp, Value::Timestamp(ts)) => Ok(Json::String(ts.to_text())),
        (FieldType::Uuid, Value::Uuid(u)) => Ok(Json::String(u.to_string())),
        (FieldType::Enum(e), Value::Enum(member)) => match enum_repr(e, member, path)? {
            EnumRepr::Str(s) => Ok(Json::String(s.clone())),
            EnumRepr::Int(i) => Ok(Json::from(*i)),
        },
        (FieldType::List(inner), Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| encode_value(inner, item, &format!("{}[{}]", path, i)))
            .collect::<CodecResult<Vec<Json>>>()
            .map(Json::Array),
        (FieldType::Set(inner), Value::Set(items)) => items
            .iter()
            .map(|item| encode_value(inner, item, &format!("{}[]", path)))
            .collect::<CodecResult<Vec<Json>>>()
            .map(Json::Array),
        (FieldType::Map(key_type, value_type), Value::Map(entries)) => {
            let mut object = Map::new();
            for (key, item) in entries {
                let key_text = encode_key(key_type, key, path)?;
                let encoded = encode_value(value_type, item, &format!("{}[{}]", path, key_text))?;
                object.insert(key_text, encoded);
            }
            Ok(Json::Object(object))
        }
        (FieldType::Record(schema), Value::Record(record)) => {
            if record.schema_name() != schema.name() {
                return Err(CodecError::encode(
                    path,
                    format!("expected record<{}>, got record<{}>", schema.name(), record.schema_name()),
                ));
            }
            let mut object = Map::new();
            for descriptor in schema.fields() {
                let field_path = format!("{}.{}", path, descriptor.name);
                let item = record
                    .get(&descriptor.name)
                    .ok_or_else(|| CodecError::encode(&field_path, "missing field"))?;
                object.insert(
                    descriptor.name.clone(),
                    encode_value(&descriptor.field_type, item, &field_path)?,
                );
            }
            Ok(Json::Object(object))
        }
        _ => Err(CodecError::encode(
            path,
            format!("expected {}, got {}", field_type.type_name(), value.type_name()),
        )),
    }
}

fn decode_value(field_type: &FieldType, json: &Json, path: &str) -> CodecResult<Value> {
    let mismatch = || {
        CodecError::decode(
            path,
            format!("expected {}, got {}", field_type.type_name(), json_type_name(json)),
        )
    };

    match (field_type, json) {
        (FieldType::Null, Json::Null) | (FieldType::Optional(_), Json::Null) => Ok(Value::Null),
        (FieldType::Optional(inner), _) => decode_value(inner, json, path),
        (FieldType::Bool, Json::Bool(b)) => Ok(Value::Bool(*b)),
        (FieldType::Int, Json::Number(n)) => n.as_i64().map(Value::Int).ok_or_else(mismatch),
        (FieldType::Float, _) => decode_float(json).map(Value::Float).ok_or_else(mismatch),
        (FieldType::Str, Json::String(s)) => Ok(Value::Str(s.clone())),
        (FieldType::Bytes, Json::String(s)) => STANDARD
            .decode(s)
            .map(Value::Bytes)
            .map_err(|e| CodecError::decode(path, e.to_string())),
        (FieldType::Timestamp, Json::String(s)) => Timestamp::from_text(s)
            .map(Value::Timestamp)
            .map_err(|reason| CodecError::decode(path, reason)),
        (FieldType::Uuid, Json::String(s)) => Uuid::parse_str(s)
            .map(Value::Uuid)
            .map_err(|e| CodecError::decode(path, e.to_string())),
        (FieldType::Enum(e), Json::String(s)) if e.backing() == EnumBacking::Str => {
            enum_member(e, &EnumRepr::Str(s.clone()), path)
        }
        (FieldType::Enum(e), Json::Number(n)) if e.backing() == EnumBacking::Int => {
            let repr = n.as_i64().ok_or_else(mismatch)?;
            enum_member(e, &EnumRepr::Int(repr), path)
        }
        (FieldType::List(inner), Json::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| decode_value(inner, item, &format!("{}[{}]", path, i)))
            .collect::<CodecResult<Vec<Value>>>()
            .map(Value::List),
        (FieldType::Set(inner), Json::Array(items)) => items
            .iter()
            .map(|item| decode_value(inner, item, &format!("{}[]", path)))
            .collect::<CodecResult<BTreeSet<Value>>>()
            .map(Value::Set),
        (FieldType::Map(key_type, value_type), Json::Object(object)) => {
            let mut entries = BTreeMap::new();
            for (key_text, item) in object {
                let key = decode_key(key_type, key_text, path)?;
                let decoded = decode_value(value_type, item, &format!("{}[{}]", path, key_text))?;
                entries.insert(key, decoded);
            }
            Ok(Value::Map(entries))
        }
        (FieldType::Record(schema), Json::Object(object)) => {
            let mut values = Vec::with_capacity(schema.fields().len());
            for descriptor in schema.fields() {
                if let Some(item) = object.get(&descriptor.name) {
                    let field_path = format!("{}.{}", path, descriptor.name);
                    values.push((
                        descriptor.name.clone(),
                        decode_value(&descriptor.field_type, item, &field_path)?,
                    ));
                }
            }
            schema
                .record(values)
                .map(Value::Record)
                .map_err(|e| CodecError::decode(path, e.to_string()))
        }
        _ => Err(mismatch()),
    }
}

/// Scalar text form of a map key
fn encode_key(key_type: &FieldType, key: &Value, path: &str) -> CodecResult<String> {
    match (key_type, key) {
        (FieldType::Bool, Value::Bool(b)) => Ok(b.to_string()),
        (FieldType::Int, Value::Int(i)) => Ok(i.to_string()),
        (FieldType::Float, Value::Float(f)) => Ok(f.to_string()),
        (FieldType::Str, Value::Str(s)) => Ok(s.clone()),
        (FieldType::Bytes, Value::Bytes(b)) => Ok(STANDARD.encode(b)),
        (FieldType::Timestamp, Value::Timestamp(ts)) => Ok(ts.to_text()),
        (FieldType::Uuid, Value::Uuid(u)) => Ok(u.to_string()),
        (FieldType::Enum(e), Value::Enum(member)) => match enum_repr(e, member, path)? {
            EnumRepr::Str(s) => Ok(s.clone()),
            EnumRepr::Int(i) => Ok(i.to_string()),
        },
        _ => Err(CodecError::encode(
            path,
            format!("map key: expected {}, got {}", key_type.type_name(), key.type_name()),
        )),
    }
}

fn decode_key(key_type: &FieldType, text: &str, path: &str) -> CodecResult<Value> {
    let invalid = |reason: String| CodecError::decode(path, format!("map key '{}': {}", text, reason));

    match key_type {
        FieldType::Bool => text.parse::<bool>().map(Value::Bool).map_err(|e| invalid(e.to_string())),
        FieldType::Int => text.parse::<i64>().map(Value::Int).map_err(|e| invalid(e.to_string())),
        FieldType::Float => text.parse::<f64>().map(Value::Float).map_err(|e| invalid(e.to_string())),
        FieldType::Str => Ok(Value::Str(text.to_string())),
        FieldType::Bytes => STANDARD.decode(text).map(Value::Bytes).map_err(|e| invalid(e.to_string())),
        FieldType::Timestamp => Timestamp::from_text(text).map(Value::Timestamp).map_err(invalid),
        FieldType::Uuid => Uuid::parse_str(text).map(Value::Uuid).map_err(|e| invalid(e.to_string())),
        FieldType::Enum(e) => {
            let repr = match e.backing() {
                EnumBacking::Str => EnumRepr::Str(text.to_string()),
                EnumBacking::Int => EnumRepr::Int(text.parse::<i64>().map_err(|err| invalid(err.to_string()))?),
            };
            enum_member(e, &repr, path)
        }
        other => Err(invalid(format!("unsupported key type {}", other.type_name()))),
    }
}

fn enum_repr<'a>(enum_type: &'a EnumType, member: &str, path: &str) -> CodecResult<&'a EnumRepr> {
    enum_type.repr_of(member).ok_or_else(|| {
        CodecError::encode(path, format!("'{}' is not a member of {}", member, enum_type.name()))
    })
}

fn enum_member(enum_type: &EnumType, repr: &EnumRepr, path: &str) -> CodecResult<Value> {
    enum_type
        .member_for(repr)
        .map(Value::variant)
        .ok_or_else(|| CodecError::decode(path, format!("{:?} is not a value of {}", repr, enum_type.name())))
}

fn encode_float(f: f64) -> Json {
    match Number::from_f64(f) {
        Some(n) => Json::Number(n),
        None if f.is_nan() => Json::String("NaN".into()),
        None if f > 0.0 => Json::String("inf".into()),
        None => Json::String("-inf".into()),
    }
}

fn decode_float(json: &Json) -> Option<f64> {
    match json {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "inf" => Some(f64::INFINITY),
            "-inf" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

/// Returns the JSON type name for error messages
fn json_type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, StructuredSchema};
    use chrono::NaiveDate;

    fn int_enum() -> FieldType {
        FieldType::enumeration(EnumType::int_backed("MyIntEnum", &[("a1", 1), ("a2", 2)]))
    }

    fn roundtrip(field_type: &FieldType, value: &Value) -> Value {
        let text = encode_field(field_type, value, "f").unwrap();
        decode_field(field_type, &text, "f").unwrap()
    }

    #[test]
    fn test_nested_lists_of_optionals() {
        let ty = FieldType::list(FieldType::list(FieldType::optional(FieldType::Int)));
        let value = Value::list([
            Value::list([Value::Int(1), Value::Null]),
            Value::list([Value::Int(0), Value::Int(3)]),
        ]);
        assert_eq!(encode_field(&ty, &value, "l").unwrap(), "[[1,null],[0,3]]");
        assert_eq!(roundtrip(&ty, &value), value);
    }

    #[test]
    fn test_int_enum_set_encodes_backing_values() {
        let ty = FieldType::set(int_enum());
        let value = Value::set([Value::variant("a2"), Value::variant("a1")]);
        let text = encode_field(&ty, &value, "s").unwrap();
        assert_eq!(text, "[1,2]");
        assert_eq!(roundtrip(&ty, &value), value);
    }

    #[test]
    fn test_map_with_uuid_keys() {
        let ty = FieldType::map(FieldType::Uuid, FieldType::Bool);
        let value = Value::map([(Uuid::new_v4(), true), (Uuid::new_v4(), false)]);
        assert_eq!(roundtrip(&ty, &value), value);
    }

    #[test]
    fn test_map_with_int_and_enum_keys() {
        let ty = FieldType::map(FieldType::Int, FieldType::Str);
        let value = Value::map([(-4_i64, "minus four"), (10_i64, "ten")]);
        assert_eq!(roundtrip(&ty, &value), value);

        let ty = FieldType::map(int_enum(), FieldType::Float);
        let value = Value::map([(Value::variant("a1"), 0.5)]);
        assert_eq!(encode_field(&ty, &value, "m").unwrap(), r#"{"1":0.5}"#);
        assert_eq!(roundtrip(&ty, &value), value);
    }

    #[test]
    fn test_scalars_inside_composites() {
        let ts = Timestamp::zoned(
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap().and_hms_opt(23, 59, 59).unwrap(),
            chrono_tz::Asia::Tokyo,
        );
        let ty = FieldType::list(FieldType::optional(FieldType::Timestamp));
        let value = Value::list([Value::Timestamp(ts), Value::Null]);
        assert_eq!(roundtrip(&ty, &value), value);

        let ty = FieldType::list(FieldType::Bytes);
        let value = Value::list([Value::Bytes(vec![0, 255, 7]), Value::Bytes(Vec::new())]);
        assert_eq!(roundtrip(&ty, &value), value);
    }

    #[test]
    fn test_non_finite_floats() {
        let ty = FieldType::list(FieldType::Float);
        let value = Value::list([f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.1]);
        assert_eq!(roundtrip(&ty, &value), value);
    }

    #[test]
    fn test_nested_record() {
        let inner = StructuredSchema::builder("Inner")
            .field(FieldDescriptor::new("f", FieldType::optional(FieldType::Float)))
            .field(FieldDescriptor::new("s", FieldType::Str).with_default("$$$"))
            .build()
            .unwrap();
        let ty = FieldType::map(FieldType::Str, FieldType::record(inner.clone()));
        let value = Value::map([
            ("first", inner.record([("f", 0.25)]).unwrap()),
            ("second", inner.record([("f", Value::Null)]).unwrap()),
        ]);
        assert_eq!(roundtrip(&ty, &value), value);
    }

    #[test]
    fn test_type_mismatch_on_encode() {
        let err = encode_field(&FieldType::list(FieldType::Int), &Value::list(["x"]), "l").unwrap_err();
        assert_eq!(err.code(), "FLAT_CODEC_ENCODE_FAILED");
        assert!(err.to_string().contains("l[0]"));
    }

    #[test]
    fn test_unknown_enum_value_on_decode() {
        let err = decode_field(&FieldType::set(int_enum()), "[9]", "s").unwrap_err();
        assert_eq!(err.code(), "FLAT_CODEC_DECODE_FAILED");
    }

    #[test]
    fn test_malformed_json_on_decode() {
        assert!(decode_field(&FieldType::list(FieldType::Int), "[1,", "l").is_err());
        assert!(decode_field(&FieldType::list(FieldType::Int), "{}", "l").is_err());
    }
}
