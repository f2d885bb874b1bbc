use super::utils;
use crate::obis_utils::{self, ValueKind};
use chrono::{DateTime, FixedOffset};
use log::debug;
use serde::Serialize;
use std::convert::Infallible;

/// Turns one `identifier(value)` record into a domain reading.
///
/// The decoder calls this once per committed record with a non-empty
/// identifier. Returning `Ok(None)` declines the record, returning an error
/// aborts the current `feed` call and hands the error to its caller.
pub trait ReadingFactory {
    type Reading;
    type Error;

    fn decode_reading(&mut self, identifier: &str, raw_value: &str) -> Result<Option<Self::Reading>, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawReading {
    pub identifier: String,
    pub value: String,
}

/// Passes every record through untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct RawReadingFactory;

impl ReadingFactory for RawReadingFactory {
    type Reading = RawReading;
    type Error = Infallible;

    fn decode_reading(&mut self, identifier: &str, raw_value: &str) -> Result<Option<RawReading>, Infallible> {
        Ok(Some(RawReading {
            identifier: identifier.to_string(),
            value: raw_value.to_string(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum ReadingValue {
    Decimal { value: f64, unit: Option<String> },
    Integer { value: i64, unit: Option<String> },
    Timestamp(DateTime<FixedOffset>),
    Text(String),
    Empty,
}

impl ReadingValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ReadingValue::Decimal { value, .. } => serde_json::Value::from(*value),
            ReadingValue::Integer { value, .. } => serde_json::Value::from(*value),
            ReadingValue::Timestamp(ts) => serde_json::Value::from(ts.to_rfc3339()),
            ReadingValue::Text(text) => serde_json::Value::from(text.clone()),
            ReadingValue::Empty => serde_json::Value::Null,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            ReadingValue::Decimal { unit, .. } | ReadingValue::Integer { unit, .. } => unit.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub obis: String,
    pub name: Option<&'static str>,
    pub description: Option<&'static str>,
    pub values: Vec<ReadingValue>,
}

impl Reading {
    /// Key used when the reading is exported, the field name if one is known
    pub fn key(&self) -> &str {
        self.name.unwrap_or(self.obis.as_str())
    }

    /// Last value group, which carries the measurement on M-Bus records
    /// (`(timestamp)(value)`) and is the only group everywhere else.
    pub fn value(&self) -> Option<&ReadingValue> {
        self.values.last()
    }
}

/// Decodes records into typed [`Reading`]s based on their OBIS code.
///
/// Identifiers that are not valid OBIS codes are declined, values that do
/// not fit the expected shape are kept as text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObisReadingFactory;

impl ObisReadingFactory {
    pub fn new() -> Self {
        Self
    }

    fn decode_group(kind: ValueKind, group: &str) -> ReadingValue {
        if group.is_empty() {
            return ReadingValue::Empty;
        }

        match kind {
            ValueKind::Timestamp => match utils::parse_timestamp(group) {
                Some(ts) => ReadingValue::Timestamp(ts),
                None => ReadingValue::Text(group.to_string()),
            },
            ValueKind::HexText => match utils::decode_hex_text(group) {
                Some(text) => ReadingValue::Text(text),
                None => ReadingValue::Text(group.to_string()),
            },
            ValueKind::Text => ReadingValue::Text(group.to_string()),
            ValueKind::Auto => Self::guess_group(group),
        }
    }

    fn guess_group(group: &str) -> ReadingValue {
        if let Some(ts) = utils::parse_timestamp(group) {
            return ReadingValue::Timestamp(ts);
        }

        let (number, unit) = match group.split_once('*') {
            Some((number, _)) => (number, utils::extract_unit(group)),
            None => (group, None),
        };

        let numeric = !number.is_empty()
            && number.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+');
        if numeric {
            if !number.contains('.') {
                if let Ok(value) = number.parse::<i64>() {
                    return ReadingValue::Integer { value, unit };
                }
            }
            if let Some(value) = utils::extract_numeric_value(number) {
                return ReadingValue::Decimal { value, unit };
            }
        }

        ReadingValue::Text(group.to_string())
    }
}

impl ReadingFactory for ObisReadingFactory {
    type Reading = Reading;
    type Error = Infallible;

    fn decode_reading(&mut self, identifier: &str, raw_value: &str) -> Result<Option<Reading>, Infallible> {
        let obis = obis_utils::normalize_obis_code(identifier);
        if !obis_utils::validate_obis_code(&obis) {
            debug!("Declining record with invalid OBIS code '{}'", obis);
            return Ok(None);
        }

        let kind = obis_utils::get_value_kind(&obis);
        let values = utils::split_value_groups(raw_value)
            .into_iter()
            .map(|group| Self::decode_group(kind, group))
            .collect();

        Ok(Some(Reading {
            name: obis_utils::get_field_name(&obis),
            description: obis_utils::get_obis_description(&obis),
            obis,
            values,
        }))
    }
}
