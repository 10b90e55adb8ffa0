// Push envelope normalization
// Decodes transport values once at the boundary and strips the transport key prefix

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix the transport puts in front of application payload keys
pub const PAYLOAD_KEY_PREFIX: &str = "data.";

/// A single value inside a raw push envelope
///
/// The transport delivers heterogeneous values; only text and integers survive
/// normalization. Serde goes through plain JSON values, so an unsupported value is
/// written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum EnvelopeValue {
    Text(String),
    Integer(i64),
    /// Any other non-null value, tagged with a type name for diagnostics
    Unsupported { type_name: String },
    Null,
}

impl EnvelopeValue {
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Self::Unsupported {
            type_name: type_name.into(),
        }
    }

    /// Short type name used in diagnostics
    pub fn type_name(&self) -> &str {
        match self {
            EnvelopeValue::Text(_) => "string",
            EnvelopeValue::Integer(_) => "integer",
            EnvelopeValue::Unsupported { type_name } => type_name,
            EnvelopeValue::Null => "null",
        }
    }
}

impl From<&str> for EnvelopeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EnvelopeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for EnvelopeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for EnvelopeValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<serde_json::Value> for EnvelopeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None if n.is_u64() => Self::unsupported("unsigned integer"),
                None => Self::unsupported("float"),
            },
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(_) => Self::unsupported("boolean"),
            serde_json::Value::Array(_) => Self::unsupported("array"),
            serde_json::Value::Object(_) => Self::unsupported("object"),
        }
    }
}

impl From<EnvelopeValue> for serde_json::Value {
    fn from(value: EnvelopeValue) -> Self {
        match value {
            EnvelopeValue::Text(s) => serde_json::Value::String(s),
            EnvelopeValue::Integer(i) => serde_json::Value::from(i),
            EnvelopeValue::Unsupported { .. } | EnvelopeValue::Null => serde_json::Value::Null,
        }
    }
}

/// Raw key/value bundle as delivered by the push transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEnvelope(BTreeMap<String, EnvelopeValue>);

impl RawEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<EnvelopeValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<EnvelopeValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&EnvelopeValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EnvelopeValue)> {
        self.0.iter()
    }

    /// Decode a JSON object into an envelope; non-object input yields an empty envelope
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, EnvelopeValue::from(v)))
                .collect(),
            _ => Self::default(),
        }
    }
}

impl<K: Into<String>, V: Into<EnvelopeValue>> FromIterator<(K, V)> for RawEnvelope {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Canonical string-keyed payload handed to application callbacks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPayload(BTreeMap<String, String>);

impl NormalizedPayload {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NormalizedPayload {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Stateless normalizer for raw push envelopes
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadExtractor;

impl PayloadExtractor {
    /// Strip the transport prefix from a raw key
    pub fn canonical_key(key: &str) -> &str {
        key.strip_prefix(PAYLOAD_KEY_PREFIX).unwrap_or(key)
    }

    /// Convert one envelope value to its string form
    ///
    /// Returns `None` for null, unsupported and empty values. Never fails.
    pub fn convert(key: &str, value: &EnvelopeValue) -> Option<String> {
        let event_key = Self::canonical_key(key);
        let converted = match value {
            EnvelopeValue::Text(s) => s.clone(),
            EnvelopeValue::Integer(i) => i.to_string(),
            EnvelopeValue::Unsupported { type_name } => {
                tracing::warn!(key, event_key, type_name = %type_name, "No support for envelope value type");
                return None;
            },
            EnvelopeValue::Null => {
                tracing::warn!(key, event_key, "No data for envelope key");
                return None;
            },
        };

        if converted.is_empty() {
            tracing::debug!(key, event_key, "Dropping empty envelope value");
            return None;
        }

        tracing::debug!(key, event_key, value = %converted, "Converted envelope value");
        Some(converted)
    }

    /// Yield each accepted key as a `(canonical_key, value)` pair, in key order
    pub fn extract_each(envelope: &RawEnvelope) -> impl Iterator<Item = (String, String)> + '_ {
        envelope.iter().filter_map(|(key, value)| {
            Self::convert(key, value).map(|v| (Self::canonical_key(key).to_string(), v))
        })
    }

    /// Build the full normalized payload for an envelope
    pub fn normalize(envelope: &RawEnvelope) -> NormalizedPayload {
        Self::extract_each(envelope).collect()
    }
}
