//! Conversion between plain JSON values and Firestore's typed value encoding.
//!
//! Firestore represents every value as a single-key object naming its type,
//! e.g. `{"stringValue": "Ana"}` or `{"integerValue": "42"}` (64-bit integers
//! travel as strings).

use serde_json::{json, Map, Number, Value};

use crate::database::{DatabaseError, Document, Fields};

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            if values.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                json!({ "arrayValue": { "values": values } })
            }
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(fields: &Fields) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect();
    Value::Object(encoded)
}

pub fn decode_value(value: &Value) -> Result<Value, DatabaseError> {
    let Some(object) = value.as_object() else {
        return Err(DatabaseError::Codec(format!("expected typed value, got {}", value)));
    };
    let Some((kind, inner)) = object.iter().next() else {
        return Err(DatabaseError::Codec("empty typed value".to_string()));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" | "geoPointValue" => Ok(inner.clone()),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(Number::from(i)))
                .ok_or_else(|| DatabaseError::Codec(format!("invalid integerValue {}", inner)))
        }
        "arrayValue" => {
            let items = match inner.get("values") {
                Some(Value::Array(values)) => values.iter().map(decode_value).collect::<Result<_, _>>()?,
                _ => Vec::new(),
            };
            Ok(Value::Array(items))
        }
        "mapValue" => {
            let fields = match inner.get("fields") {
                Some(fields) => decode_fields(fields)?,
                None => Fields::new(),
            };
            Ok(Value::Object(fields))
        }
        other => Err(DatabaseError::Codec(format!("unsupported Firestore value type '{}'", other))),
    }
}

pub fn decode_fields(fields: &Value) -> Result<Fields, DatabaseError> {
    let Some(object) = fields.as_object() else {
        return Err(DatabaseError::Codec("document fields must be an object".to_string()));
    };

    object
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
        .collect()
}

/// Decode a Firestore document resource (`{name, fields, createTime, ...}`).
pub fn decode_document(document: &Value) -> Result<Document, DatabaseError> {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| DatabaseError::Codec("document without name".to_string()))?;

    let fields = match document.get("fields") {
        Some(fields) => decode_fields(fields)?,
        None => Fields::new(),
    };

    Ok(Document { id: document_id(name).to_string(), fields })
}

/// Last path segment of a document resource name.
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
