// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use time::Date;

use crate::billing::parse_reading_date;

/// A single column value, as seen by sorting, filtering and dirty tracking.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
    Date(Date),
    /// Object-valued field. Equality is pointer identity, never structural.
    Nested(Rc<serde_json::Value>),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Int(left), Self::Int(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::Text(left), Self::Text(right)) => left == right,
            (Self::Date(left), Self::Date(right)) => left == right,
            (Self::Nested(left), Self::Nested(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl FieldValue {
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(*flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => number.as_f64().map_or(Self::Null, Self::Number),
            },
            serde_json::Value::String(text) => Self::Text(text.clone()),
            nested => Self::Nested(Rc::new(nested.clone())),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Plain-text rendering used for tables and text filtering.
    pub fn display_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(flag) => flag.to_string(),
            Self::Int(int) => int.to_string(),
            Self::Number(number) => number.to_string(),
            Self::Text(text) => text.clone(),
            Self::Date(date) => format_iso_date(*date),
            Self::Nested(value) => value.to_string(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(int) => Some(*int as f64),
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<Date> {
        match self {
            Self::Date(date) => Some(*date),
            Self::Text(text) => parse_reading_date(text),
            _ => None,
        }
    }

    pub fn into_text(self, field: &str) -> Result<String> {
        match self {
            Self::Null => Ok(String::new()),
            Self::Text(text) => Ok(text),
            other => bail!("field `{field}` expects text, got {other}"),
        }
    }

    pub fn into_bool(self, field: &str) -> Result<bool> {
        match self {
            Self::Null => Ok(false),
            Self::Bool(flag) => Ok(flag),
            other => bail!("field `{field}` expects true/false, got {other}"),
        }
    }

    pub fn into_id<T: From<i64>>(self, field: &str) -> Result<T> {
        match self {
            Self::Null => Ok(T::from(0)),
            Self::Int(int) => Ok(T::from(int)),
            Self::Text(text) if text.trim().is_empty() => Ok(T::from(0)),
            Self::Text(text) => match text.trim().parse::<i64>() {
                Ok(int) => Ok(T::from(int)),
                Err(_) => bail!("field `{field}` expects an id, got {text:?}"),
            },
            other => bail!("field `{field}` expects an id, got {other}"),
        }
    }

    pub fn into_number(self, field: &str) -> Result<Option<f64>> {
        match self {
            Self::Null => Ok(None),
            Self::Int(int) => Ok(Some(int as f64)),
            Self::Number(number) if number.is_finite() => Ok(Some(number)),
            Self::Text(text) if text.trim().is_empty() => Ok(None),
            Self::Text(text) => match text.trim().parse::<f64>() {
                Ok(number) if number.is_finite() => Ok(Some(number)),
                _ => bail!("field `{field}` expects a number, got {text:?}"),
            },
            other => bail!("field `{field}` expects a number, got {other}"),
        }
    }

    pub fn into_date(self, field: &str) -> Result<Option<Date>> {
        match self {
            Self::Null => Ok(None),
            Self::Date(date) => Ok(Some(date)),
            Self::Text(text) if text.trim().is_empty() => Ok(None),
            Self::Text(text) => match parse_reading_date(&text) {
                Some(date) => Ok(Some(date)),
                None => bail!("field `{field}` expects a YYYY-MM-DD date, got {text:?}"),
            },
            other => bail!("field `{field}` expects a date, got {other}"),
        }
    }

    /// Like [`FieldValue::into_date`], but unparsable text reads as no date.
    /// Used for the dates that feed a billing period.
    pub fn into_billing_date(self, field: &str) -> Result<Option<Date>> {
        match self {
            Self::Text(text) => Ok(parse_reading_date(&text)),
            other => other.into_date(field),
        }
    }

    pub fn into_nested(self, field: &str) -> Result<Option<Rc<serde_json::Value>>> {
        match self {
            Self::Null => Ok(None),
            Self::Nested(value) => Ok(Some(value)),
            other => bail!("field `{field}` expects an object, got {other}"),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Text(text) => write!(f, "{text:?}"),
            other => f.write_str(&other.display_text()),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Date> for FieldValue {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

pub fn format_iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Field names containing "date" are compared as timestamps when both sides
/// parse.
pub fn is_date_like(field: &str) -> bool {
    field.to_ascii_lowercase().contains("date")
}

/// Ordering used by listing sorts. Nulls go last in both directions.
pub fn compare_for_sort(
    field: &str,
    left: &FieldValue,
    right: &FieldValue,
    ascending: bool,
) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let ordering = compare_values(field, left, right);
    if ascending {
        ordering
    } else {
        ordering.reverse()
    }
}

fn compare_values(field: &str, left: &FieldValue, right: &FieldValue) -> Ordering {
    if let (Some(left), Some(right)) = (left.as_number(), right.as_number()) {
        return left.partial_cmp(&right).unwrap_or(Ordering::Equal);
    }

    if (is_date_like(field) || matches!((left, right), (FieldValue::Date(_), FieldValue::Date(_))))
        && let (Some(left), Some(right)) = (left.as_date(), right.as_date())
    {
        return left.to_julian_day().cmp(&right.to_julian_day());
    }

    if let (FieldValue::Bool(left), FieldValue::Bool(right)) = (left, right) {
        return left.cmp(right);
    }

    left.display_text()
        .to_lowercase()
        .cmp(&right.display_text().to_lowercase())
}

/// A row that a listing can sort, filter and expand.
pub trait Record {
    type Id: Copy + Eq + fmt::Debug + fmt::Display;

    fn record_id(&self) -> Self::Id;

    fn field(&self, name: &str) -> FieldValue;
}

/// An entity editable through an edit session. `FIELDS` lists every key the
/// dirty check compares.
pub trait Entity: Record + Clone + Default + Serialize + DeserializeOwned {
    const FIELDS: &'static [&'static str];

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()>;

    /// Hook for fields derived from other fields, run after every successful
    /// `set_field`.
    fn field_changed(&mut self, _name: &str) {}

    fn is_new(&self) -> bool;
}

/// Keys whose values differ between two entities, compared one level deep.
pub fn changed_fields<E: Entity>(snapshot: &E, current: &E) -> Vec<&'static str> {
    E::FIELDS
        .iter()
        .copied()
        .filter(|name| snapshot.field(name) != current.field(name))
        .collect()
}

impl Record for serde_json::Value {
    type Id = i64;

    fn record_id(&self) -> i64 {
        self.get("id")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or_default()
    }

    fn field(&self, name: &str) -> FieldValue {
        self.get(name)
            .map_or(FieldValue::Null, FieldValue::from_json)
    }
}
