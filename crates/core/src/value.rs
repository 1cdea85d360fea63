//! Semantic value types and the driver-value conversion function.
//!
//! The external driver is unreliable about types: numeric fields sometimes
//! arrive as strings, booleans as "Yes"/"No" tokens, dates as `YYYYMMDD`
//! digit runs. [`convert`] centralizes normalization so every collection
//! shares one parser, and it is total: a malformed cell becomes
//! [`Value::Null`], never an error, because a single bad field must not
//! abort an entire collection fetch.

use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A scalar as returned by the driver, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Int(i64),
    Real(f64),
    Date(NaiveDate),
}

/// A normalized scalar ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the inner text, if this is a non-null text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A fetched row keyed by semantic key, as produced by the fetch layer and
/// consumed by the persistence layer.
pub type Record = std::collections::HashMap<&'static str, Value>;

/// Declared semantic type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Boolean,
    Integer,
    Real,
    Date,
    Text,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Truth tokens accepted for [`FieldKind::Boolean`] fields.
const TRUE_TOKENS: [&str; 3] = ["yes", "true", "1"];

/// Convert a raw driver scalar to its declared semantic type.
///
/// Total over all inputs:
/// - `Null` and empty/whitespace-only text convert to [`Value::Null`].
/// - `Boolean`: case-insensitive membership in yes/true/1; anything else
///   is `false`.
/// - `Integer`/`Real`: unparseable text yields [`Value::Null`]; the caller
///   decides whether that is worth a log line.
/// - `Date`: structured dates and valid `YYYYMMDD` strings become ISO-8601
///   text; any other shape passes through as trimmed text.
/// - `Text`: stringified and trimmed.
pub fn convert(raw: &RawValue, kind: FieldKind) -> Value {
    let text = match raw {
        RawValue::Null => return Value::Null,
        RawValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Value::Null;
            }
            Some(trimmed)
        }
        _ => None,
    };

    match kind {
        FieldKind::Boolean => {
            let token = match raw {
                RawValue::Text(_) => text.unwrap_or_default().to_lowercase(),
                RawValue::Int(i) => i.to_string(),
                RawValue::Real(f) => f.to_string(),
                RawValue::Date(d) => d.to_string(),
                RawValue::Null => unreachable!(),
            };
            Value::Bool(TRUE_TOKENS.contains(&token.as_str()))
        }
        FieldKind::Integer => match raw {
            RawValue::Int(i) => Value::Int(*i),
            RawValue::Real(f) => Value::Int(*f as i64),
            RawValue::Text(_) => text
                .unwrap_or_default()
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        FieldKind::Real => match raw {
            RawValue::Real(f) => Value::Real(*f),
            RawValue::Int(i) => Value::Real(*i as f64),
            RawValue::Text(_) => text
                .unwrap_or_default()
                .parse::<f64>()
                .map(Value::Real)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        FieldKind::Date => match raw {
            RawValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
            RawValue::Text(_) => {
                let s = text.unwrap_or_default();
                match parse_compact_date(s) {
                    Some(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
                    // Best effort: unknown shapes pass through untouched.
                    None => Value::Text(s.to_string()),
                }
            }
            RawValue::Int(i) => match parse_compact_date(&i.to_string()) {
                Some(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
                None => Value::Text(i.to_string()),
            },
            RawValue::Real(f) => Value::Text(f.to_string()),
            RawValue::Null => unreachable!(),
        },
        FieldKind::Text => match raw {
            RawValue::Text(_) => Value::Text(text.unwrap_or_default().to_string()),
            RawValue::Int(i) => Value::Text(i.to_string()),
            RawValue::Real(f) => Value::Text(f.to_string()),
            RawValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
            RawValue::Null => unreachable!(),
        },
    }
}

/// Parse an 8-digit `YYYYMMDD` string into a date, if it is one.
fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
