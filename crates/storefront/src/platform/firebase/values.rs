//! Conversion between plain JSON fields and Firestore's typed value encoding.
//!
//! Firestore wraps every value in a single-key object naming its type
//! (`{"stringValue": "Jollof"}`, `{"integerValue": "2"}`). Integers travel as
//! strings. Timestamps, references and bytes decode to strings.

use serde_json::{Map, Number, Value};

use crate::platform::Fields;

/// Encode a JSON value as a Firestore value.
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    let mut wrapped = Map::new();
    match value {
        Value::Null => {
            wrapped.insert("nullValue".to_owned(), Value::Null);
        }
        Value::Bool(b) => {
            wrapped.insert("booleanValue".to_owned(), Value::Bool(*b));
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                wrapped.insert("integerValue".to_owned(), Value::String(i.to_string()));
            } else {
                wrapped.insert(
                    "doubleValue".to_owned(),
                    n.as_f64().map_or(Value::Null, Value::from),
                );
            }
        }
        Value::String(s) => {
            wrapped.insert("stringValue".to_owned(), Value::String(s.clone()));
        }
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            let mut array = Map::new();
            array.insert("values".to_owned(), Value::Array(values));
            wrapped.insert("arrayValue".to_owned(), Value::Object(array));
        }
        Value::Object(map) => {
            let mut inner = Map::new();
            inner.insert("fields".to_owned(), Value::Object(encode_fields(map)));
            wrapped.insert("mapValue".to_owned(), Value::Object(inner));
        }
    }
    Value::Object(wrapped)
}

/// Encode a field map.
#[must_use]
pub fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decode a Firestore value into plain JSON. Unknown shapes decode to `null`.
#[must_use]
pub fn decode_value(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = map.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map_or(Value::Null, Value::from),
            Value::Number(n) => Value::Number(n.clone()),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            Value::Number(n) => Value::Number(n.clone()),
            // NaN and infinities arrive as strings and have no JSON form.
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number),
            _ => Value::Null,
        },
        "booleanValue" | "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            inner.clone()
        }
        "geoPointValue" => inner.clone(),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

/// Decode a Firestore field map.
#[must_use]
pub fn decode_fields(fields: &Map<String, Value>) -> Fields {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

/// Quote a field path segment for use in `updateMask.fieldPaths` and
/// structured queries. Segments that are not simple identifiers get backticks.
#[must_use]
pub fn quote_field_path(path: &str) -> String {
    path.split('.')
        .map(|segment| {
            let simple = segment
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if simple {
                segment.to_owned()
            } else {
                format!("`{}`", segment.replace('\\', "\\\\").replace('`', "\\`"))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
