//! Payload normalization.
//!
//! Website builders post leads in several shapes: plain JSON objects, form
//! encoded bodies, and either of those wrapped in an envelope key. Everything
//! here reduces those shapes to a [`LeadFields`] projection and then to a
//! validated [`Lead`].

use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::{Lead, LeadFields};

/// Envelope keys, in the order they are tried.
pub const ENVELOPE_KEYS: [&str; 4] = ["data", "fields", "body", "payload"];

/// How the inbound body was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Form,
    /// Nothing usable was found; the body is treated as an empty record.
    Empty,
}

/// Decoded inbound body, before envelope unwrapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub format: PayloadFormat,
    pub record: Map<String, Value>,
}

impl Submission {
    fn empty() -> Self {
        Self {
            format: PayloadFormat::Empty,
            record: Map::new(),
        }
    }
}

/// Decodes a raw body as JSON, falling back to form encoding.
///
/// Malformed input never fails here: it is logged and decoded as an empty
/// record so the missing-field check produces the response.
pub fn parse_submission(body: &[u8]) -> Submission {
    let Ok(text) = std::str::from_utf8(body) else {
        tracing::warn!("Malformed submission: body is not valid UTF-8");
        return Submission::empty();
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        tracing::debug!("Empty submission body");
        return Submission::empty();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(record)) => {
            return Submission {
                format: PayloadFormat::Json,
                record,
            }
        }
        Ok(other) => {
            tracing::warn!(
                "Malformed submission: JSON body is not an object ({})",
                json_kind(&other)
            );
            return Submission::empty();
        }
        Err(e) if trimmed.starts_with('{') || trimmed.starts_with('[') => {
            tracing::warn!("Malformed submission: invalid JSON body: {}", e);
            return Submission::empty();
        }
        Err(_) => {}
    }

    let record = group_form_pairs(url::form_urlencoded::parse(trimmed.as_bytes()).into_owned());
    if record.is_empty() {
        tracing::warn!("Malformed submission: neither JSON nor form fields");
        return Submission::empty();
    }

    Submission {
        format: PayloadFormat::Form,
        record,
    }
}

/// Unwraps one level of envelope, trying [`ENVELOPE_KEYS`] in order. The
/// first key holding an object wins; otherwise the record is returned as is.
pub fn unwrap_envelope(mut record: Map<String, Value>) -> Map<String, Value> {
    let envelope = ENVELOPE_KEYS
        .iter()
        .find(|key| matches!(record.get(**key), Some(Value::Object(_))));

    match envelope.and_then(|key| record.remove(*key)) {
        Some(Value::Object(inner)) => inner,
        _ => record,
    }
}

/// Reads the lead fields from a leaf record. Values are coerced to trimmed
/// strings; the email is lower-cased.
pub fn extract_fields(record: &Map<String, Value>) -> LeadFields {
    let text = |key: &str| record.get(key).and_then(coerce_text);

    LeadFields {
        name: text("name").or_else(|| text("fullname")).unwrap_or_default(),
        email: text("email").map(|e| e.to_lowercase()).unwrap_or_default(),
        phone: text("phone"),
        area: text("area"),
        meet: text("meet"),
        product: text("product"),
        utm_campaign: text("utm_campaign"),
        utm_source: text("utm_source"),
        utm_medium: text("utm_medium"),
    }
}

impl LeadFields {
    /// Validates the required fields.
    pub fn into_lead(self) -> Result<Lead, AppError> {
        if self.name.is_empty() || self.email.is_empty() {
            return Err(AppError::MissingRequiredField(self));
        }

        Ok(Lead {
            name: self.name,
            email: self.email,
            phone: self.phone,
            area: self.area,
            meet: self.meet,
            product: self.product,
            utm_campaign: self.utm_campaign,
            utm_source: self.utm_source,
            utm_medium: self.utm_medium,
        })
    }
}

/// Full pipeline: decode, unwrap, extract, validate.
pub fn normalize(body: &[u8]) -> Result<Lead, AppError> {
    let submission = parse_submission(body);
    tracing::debug!("Submission decoded as {:?}", submission.format);

    let record = unwrap_envelope(submission.record);
    extract_fields(&record).into_lead()
}

/// Coerces a JSON value to a trimmed, non-empty string.
fn coerce_text(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Multi-select inputs arrive as arrays of scalars
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_array())
            .filter_map(coerce_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => return None,
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Builds a record from form pairs. `data[name]=x` becomes
/// `{"data": {"name": "x"}}`; repeated keys (and `key[]`) become arrays.
fn group_form_pairs<I>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut record = Map::new();

    for (key, value) in pairs {
        let split = split_bracketed(&key).map(|(outer, inner)| (outer.to_string(), inner.to_string()));

        match split {
            Some((outer, inner)) if !inner.is_empty() => {
                let entry = record
                    .entry(outer)
                    .or_insert_with(|| Value::Object(Map::new()));
                // A plain `data=...` seen earlier keeps its value
                if let Value::Object(nested) = entry {
                    push_value(nested, inner, value);
                }
            }
            Some((outer, _)) => push_value(&mut record, outer, value),
            None if key.is_empty() => {}
            None => push_value(&mut record, key, value),
        }
    }

    record
}

fn split_bracketed(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    if open == 0 || !key.ends_with(']') {
        return None;
    }
    Some((&key[..open], &key[open + 1..key.len() - 1]))
}

fn push_value(map: &mut Map<String, Value>, key: String, value: String) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(Value::String(value)),
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, Value::String(value)]);
        }
        None => {
            map.insert(key, Value::String(value));
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
