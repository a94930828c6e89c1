//! Payload validation for book writes.
//!
//! The accepted shape is described by [`BOOK_SCHEMA`]; [`validate_book`] walks
//! that table and collects one message per offending field.

use serde_json::{Map, Value};

use super::models::Book;

/// Expected JSON type of a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-empty string
    Text,
    /// String holding an absolute URL
    Uri,
    /// Integer fitting in an `i32`
    Integer,
    /// Integer of at least 1
    PositiveInteger,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

/// Every field is required; no other properties are accepted.
pub const BOOK_SCHEMA: &[FieldSpec] = &[
    field("isbn", FieldKind::Text),
    field("amazon_url", FieldKind::Uri),
    field("author", FieldKind::Text),
    field("language", FieldKind::Text),
    field("pages", FieldKind::PositiveInteger),
    field("publisher", FieldKind::Text),
    field("title", FieldKind::Text),
    field("year", FieldKind::Integer),
];

/// Validate `payload` against `schema`, returning every failure message.
pub fn validate(schema: &[FieldSpec], payload: &Value) -> Result<(), Vec<String>> {
    let Some(object) = payload.as_object() else {
        return Err(vec!["book payload must be a JSON object".to_string()]);
    };

    let mut errors: Vec<String> = schema
        .iter()
        .filter_map(|spec| check_field(spec, object))
        .collect();

    errors.extend(
        object
            .keys()
            .filter(|key| !schema.iter().any(|spec| spec.name == key.as_str()))
            .map(|key| format!("{} is not an allowed property", key)),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a book payload and convert it into a [`Book`].
pub fn validate_book(payload: &Value) -> Result<Book, Vec<String>> {
    validate(BOOK_SCHEMA, payload)?;
    serde_json::from_value(payload.clone()).map_err(|e| vec![e.to_string()])
}

fn check_field(spec: &FieldSpec, object: &Map<String, Value>) -> Option<String> {
    let name = spec.name;
    let Some(value) = object.get(name) else {
        return Some(format!("{} is required", name));
    };

    match spec.kind {
        FieldKind::Text => match value.as_str() {
            Some(s) if !s.trim().is_empty() => None,
            Some(_) => Some(format!("{} must not be empty", name)),
            None => Some(format!("{} must be a string", name)),
        },
        FieldKind::Uri => match value.as_str() {
            Some(s) if url::Url::parse(s).is_ok() => None,
            Some(_) => Some(format!("{} must be a valid URL", name)),
            None => Some(format!("{} must be a string", name)),
        },
        FieldKind::Integer => as_i32(value)
            .is_none()
            .then(|| format!("{} must be an integer", name)),
        FieldKind::PositiveInteger => match as_i32(value) {
            Some(n) if n >= 1 => None,
            Some(_) => Some(format!("{} must be greater than or equal to 1", name)),
            None => Some(format!("{} must be an integer", name)),
        },
    }
}

fn as_i32(value: &Value) -> Option<i32> {
    value.as_i64().and_then(|n| i32::try_from(n).ok())
}
