//! Source-side book records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The kind of a [`BookValue`], used by destination capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Number,
    Date,
    Link,
    Image,
}

impl ValueKind {
    /// Kinds the sync engine knows how to write into a table cell.
    /// Images need an upload step first and are not in this set.
    pub const WRITABLE: [ValueKind; 4] = [
        ValueKind::Text,
        ValueKind::Number,
        ValueKind::Date,
        ValueKind::Link,
    ];
}

/// One attribute value of a book.
///
/// Serialized as `{"kind": "text", "value": "Dune"}` so every leaf stays a
/// plain string or number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BookValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Link(String),
    /// Reference to an image (usually a cover URL).
    Image(String),
}

impl BookValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn number(n: f64) -> Self {
        Self::Number(n)
    }

    pub fn link(url: impl Into<String>) -> Self {
        Self::Link(url.into())
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::Image(url.into())
    }

    /// Returns the value's kind.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Number(_) => ValueKind::Number,
            Self::Date(_) => ValueKind::Date,
            Self::Link(_) => ValueKind::Link,
            Self::Image(_) => ValueKind::Image,
        }
    }

    /// Renders the value as text. Whole numbers print without a fraction,
    /// dates as `YYYY-MM-DD`.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) | Self::Link(s) | Self::Image(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Returns the numeric value for number values.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<&str> for BookValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for BookValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for BookValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for BookValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<NaiveDate> for BookValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

/// Errors constructing a [`BookRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("book record has no title")]
    MissingTitle,
}

/// Bibliographic data for one book, keyed by attribute name.
///
/// A record always has a non-empty `title`; the title is stored as text.
/// Keys iterate in sorted order so everything derived from a record is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, BookValue>", into = "BTreeMap<String, BookValue>")]
pub struct BookRecord {
    values: BTreeMap<String, BookValue>,
}

impl BookRecord {
    pub const TITLE: &'static str = "title";

    /// Creates a record with the given title.
    pub fn new(title: impl Into<String>) -> Result<Self, RecordError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(RecordError::MissingTitle);
        }
        let mut values = BTreeMap::new();
        values.insert(Self::TITLE.to_string(), BookValue::Text(title));
        Ok(Self { values })
    }

    /// Adds or replaces a value. Setting `title` stores the value's text form
    /// and is ignored when that text is blank.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<BookValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces a value; see [`BookRecord::with`].
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<BookValue>) {
        let key = key.into();
        let value = value.into();
        if key == Self::TITLE {
            let text = value.as_text();
            if !text.trim().is_empty() {
                self.values.insert(key, BookValue::Text(text));
            }
            return;
        }
        self.values.insert(key, value);
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        match self.values.get(Self::TITLE) {
            Some(BookValue::Text(t)) => t,
            _ => "",
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BookValue> {
        self.values.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterates keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterates `(key, value)` pairs in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BookValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TryFrom<BTreeMap<String, BookValue>> for BookRecord {
    type Error = RecordError;

    fn try_from(values: BTreeMap<String, BookValue>) -> Result<Self, Self::Error> {
        let title = values
            .get(Self::TITLE)
            .map(BookValue::as_text)
            .ok_or(RecordError::MissingTitle)?;
        let mut record = Self::new(title)?;
        for (key, value) in values {
            if key != Self::TITLE {
                record.values.insert(key, value);
            }
        }
        Ok(record)
    }
}

impl From<BookRecord> for BTreeMap<String, BookValue> {
    fn from(record: BookRecord) -> Self {
        record.values
    }
}
