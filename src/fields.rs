//! Field normalization.
//!
//! Bitable cells arrive as loosely typed JSON: plain strings, booleans,
//! numbers, arrays of options, or rich objects such as URL cells
//! (`{"text": ..., "link": ...}`). [`FieldValue`] gives that union an explicit
//! shape, and [`to_text`] maps every shape to a display string without ever
//! failing, so one malformed cell cannot halt a run.
//!
//! Dates are stored by the service as epoch milliseconds. [`DateResolver`]
//! turns them into `YYYY-MM-DD` strings and falls back to today's date when
//! the value is missing or unparseable: every synced document carries a date.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};
use serde_json::Value;
use std::fmt;

/// A single cell value from a remote record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Bool(bool),
    Number(serde_json::Number),
    List(Vec<FieldValue>),
    Object(RichObject),
}

/// A structured cell (URL, user, attachment, ...).
///
/// Only `text` and `link` are interpreted; the full object is kept so it
/// can still be coerced to a string when neither is present.
#[derive(Debug, Clone, PartialEq)]
pub struct RichObject {
    pub text: Option<String>,
    pub link: Option<String>,
    raw: serde_json::Map<String, Value>,
}

impl RichObject {
    fn from_map(map: &serde_json::Map<String, Value>) -> Self {
        let sub = |key: &str| {
            map.get(key)
                .filter(|v| !v.is_null())
                .map(|v| FieldValue::from(v).to_string())
        };
        Self {
            text: sub("text"),
            link: sub("link"),
            raw: map.clone(),
        }
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => FieldValue::Number(n.clone()),
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(items) => FieldValue::List(items.iter().map(FieldValue::from).collect()),
            Value::Object(map) => FieldValue::Object(RichObject::from_map(map)),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::from(&value)
    }
}

impl FieldValue {
    /// Whether the value counts as "set" for title and date discovery.
    ///
    /// Null, empty strings, empty lists, empty objects, zero and `false`
    /// are all treated as unset.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Bool(b) => *b,
            FieldValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            FieldValue::List(items) => !items.is_empty(),
            FieldValue::Object(obj) => !obj.raw.is_empty(),
        }
    }

    /// Elements of a list value, or nothing for any other shape.
    pub fn list_items(&self) -> &[FieldValue] {
        match self {
            FieldValue::List(items) => items,
            _ => &[],
        }
    }
}

/// Plain string coercion, used for list elements and as the generic fallback.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            FieldValue::Object(obj) => match (&obj.text, &obj.link) {
                (Some(text), _) => f.write_str(text),
                (None, Some(link)) => f.write_str(link),
                (None, None) => {
                    let json = serde_json::to_string(&obj.raw).map_err(|_| fmt::Error)?;
                    f.write_str(&json)
                }
            },
        }
    }
}

/// How booleans are rendered by [`to_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolStyle {
    /// Checkbox cells become `Yes` / `No`.
    YesNo,
    /// Booleans fall through to plain coercion (`true` / `false`).
    Plain,
}

/// Convert a cell into display text. Never fails.
pub fn to_text(value: &FieldValue, bools: BoolStyle) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Bool(b) => match bools {
            BoolStyle::YesNo => (if *b { "Yes" } else { "No" }).to_string(),
            BoolStyle::Plain => b.to_string(),
        },
        FieldValue::Number(n) => n.to_string(),
        FieldValue::List(_) | FieldValue::Object(_) => value.to_string(),
    }
}

/// Like [`to_text`], treating a missing field as empty.
pub fn opt_text(value: Option<&FieldValue>, bools: BoolStyle) -> String {
    value.map(|v| to_text(v, bools)).unwrap_or_default()
}

/// Resolves epoch-millisecond cells to calendar dates in a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    offset: FixedOffset,
    today: NaiveDate,
}

impl DateResolver {
    /// Resolver for `offset`, with "today" taken from the current clock.
    pub fn new(offset: FixedOffset) -> Self {
        let today = Utc::now().with_timezone(&offset).date_naive();
        Self { offset, today }
    }

    /// Resolver using the host's current local offset.
    pub fn local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    /// Resolver with a pinned "today", for deterministic rendering.
    pub fn with_today(offset: FixedOffset, today: NaiveDate) -> Self {
        Self { offset, today }
    }

    pub fn today(&self) -> String {
        self.today.format("%Y-%m-%d").to_string()
    }

    /// Format an epoch-millisecond value as `YYYY-MM-DD`.
    ///
    /// Missing values, non-numeric values and out-of-range timestamps all
    /// resolve to today's date.
    pub fn to_date(&self, value: Option<&FieldValue>) -> String {
        value
            .and_then(epoch_millis)
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| {
                dt.with_timezone(&self.offset)
                    .format("%Y-%m-%d")
                    .to_string()
            })
            .unwrap_or_else(|| self.today())
    }
}

fn epoch_millis(value: &FieldValue) -> Option<i64> {
    match value {
        FieldValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        FieldValue::Text(s) => s.trim().parse::<i64>().ok(),
        FieldValue::Null | FieldValue::Bool(_) | FieldValue::List(_) | FieldValue::Object(_) => {
            None
        }
    }
}

/// Parse a `+HH:MM` / `-HH:MM` offset string.
pub fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    let b = s.as_bytes();
    if b.len() != 6 || !matches!(b[0], b'+' | b'-') || b[3] != b':' {
        return None;
    }
    s.parse::<FixedOffset>().ok()
}
