//! Conversion between [`Value`] and the Firestore REST JSON value encoding.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, json};

use crate::{Document, DocumentPath, StoreError, Value};

/// Encode a value as a Firestore `Value` object.
pub fn encode_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Boolean(b) => json!({ "booleanValue": b }),
        // int64 travels as a decimal string
        Value::Integer(i) => json!({ "integerValue": i.to_string() }),
        Value::Double(d) => json!({ "doubleValue": d }),
        Value::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Bytes(bytes) => json!({ "bytesValue": STANDARD.encode(bytes) }),
        Value::Reference(r) => json!({ "referenceValue": r }),
        Value::GeoPoint {
            latitude,
            longitude,
        } => json!({ "geoPointValue": { "latitude": latitude, "longitude": longitude } }),
        Value::Array(items) => {
            let values: Vec<_> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Encode a field map as the `fields` object of a document or map value.
pub fn encode_fields(fields: &BTreeMap<String, Value>) -> serde_json::Value {
    let map: Map<String, serde_json::Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    serde_json::Value::Object(map)
}

fn invalid(msg: impl Into<String>) -> StoreError {
    StoreError::InvalidResponse(msg.into())
}

/// Decode a Firestore `Value` object.
pub fn decode_value(raw: &serde_json::Value) -> Result<Value, StoreError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid(format!("value is not an object: {raw}")))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| invalid("value object has no type key"))?;

    let value = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Boolean(
            inner
                .as_bool()
                .ok_or_else(|| invalid(format!("bad booleanValue: {inner}")))?,
        ),
        "integerValue" => {
            // Usually a string, but tolerate bare numbers.
            let parsed = match inner {
                serde_json::Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            Value::Integer(parsed.ok_or_else(|| invalid(format!("bad integerValue: {inner}")))?)
        }
        "doubleValue" => {
            let parsed = match inner {
                serde_json::Value::String(s) => match s.as_str() {
                    "NaN" => Some(f64::NAN),
                    "Infinity" => Some(f64::INFINITY),
                    "-Infinity" => Some(f64::NEG_INFINITY),
                    _ => s.parse::<f64>().ok(),
                },
                other => other.as_f64(),
            };
            Value::Double(parsed.ok_or_else(|| invalid(format!("bad doubleValue: {inner}")))?)
        }
        "timestampValue" => {
            let s = inner
                .as_str()
                .ok_or_else(|| invalid(format!("bad timestampValue: {inner}")))?;
            Value::Timestamp(parse_timestamp(s)?)
        }
        "stringValue" => Value::String(
            inner
                .as_str()
                .ok_or_else(|| invalid(format!("bad stringValue: {inner}")))?
                .to_string(),
        ),
        "bytesValue" => {
            let s = inner
                .as_str()
                .ok_or_else(|| invalid(format!("bad bytesValue: {inner}")))?;
            Value::Bytes(
                STANDARD
                    .decode(s)
                    .map_err(|e| invalid(format!("bad bytesValue: {e}")))?,
            )
        }
        "referenceValue" => Value::Reference(
            inner
                .as_str()
                .ok_or_else(|| invalid(format!("bad referenceValue: {inner}")))?
                .to_string(),
        ),
        "geoPointValue" => Value::GeoPoint {
            latitude: inner.get("latitude").and_then(|v| v.as_f64()).unwrap_or(0.0),
            longitude: inner.get("longitude").and_then(|v| v.as_f64()).unwrap_or(0.0),
        },
        "arrayValue" => {
            // Empty arrays omit `values` entirely.
            let items = match inner.get("values").and_then(|v| v.as_array()) {
                Some(values) => values
                    .iter()
                    .map(decode_value)
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Value::Array(items)
        }
        "mapValue" => Value::Map(decode_fields(inner.get("fields"))?),
        other => return Err(invalid(format!("unknown value type: {other}"))),
    };

    Ok(value)
}

/// Decode an optional `fields` object.
pub fn decode_fields(
    raw: Option<&serde_json::Value>,
) -> Result<BTreeMap<String, Value>, StoreError> {
    let Some(raw) = raw else {
        return Ok(BTreeMap::new());
    };
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid(format!("fields is not an object: {raw}")))?;
    obj.iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| invalid(format!("bad timestamp {s:?}: {e}")))
}

/// Document resource as returned by the REST API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    pub name: String,
    #[serde(default)]
    pub fields: Option<serde_json::Value>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

impl RawDocument {
    /// Convert to a [`Document`], resolving the name relative to `documents_root`.
    pub fn into_document(self, documents_root: &str) -> Result<Document, StoreError> {
        let relative = self
            .name
            .strip_prefix(documents_root)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| {
                invalid(format!(
                    "document name {} outside of {}",
                    self.name, documents_root
                ))
            })?;
        let path = DocumentPath::parse(relative)?;
        let fields = decode_fields(self.fields.as_ref())?;
        Ok(Document {
            path,
            fields,
            create_time: self.create_time.as_deref().map(parse_timestamp).transpose()?,
            update_time: self.update_time.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Quote a field name for use in an update mask or transform.
///
/// Simple identifiers pass through; anything else is wrapped in backticks.
pub fn quote_field_path(field: &str) -> String {
    let mut chars = field.chars();
    let simple = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
