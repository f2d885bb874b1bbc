use super::structs::DeviceIdentification;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

lazy_static! {
    static ref TIMESTAMP_PATTERN: Regex = Regex::new(r"^[0-9]{12}[SW]$").unwrap();
}

/// Splits the identification line into its parts. Accepts the line with or
/// without the leading `/`.
///
/// Example formats:
/// - `ISk5\2MT382-1000`
/// - `KFM5KAIFA-METER`
/// - `XMX5LGBBFFB231215493`
pub fn parse_identification_line(line: &str) -> Option<DeviceIdentification> {
    let content = line.trim().trim_start_matches('/');

    /* Manufacturer is a three letter flag followed by the baud rate character */
    let manufacturer = content.get(..3)?;
    if !manufacturer.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let rest = &content[3..];
    let baud_rate = rest.chars().next();
    let identification = match baud_rate {
        Some(c) => rest[c.len_utf8()..].to_string(),
        None => String::new(),
    };

    debug!("Parsed identification - Manufacturer: {}, ID: {}", manufacturer, identification);

    Some(DeviceIdentification {
        manufacturer: manufacturer.to_string(),
        baud_rate,
        identification,
        full_id: content.to_string(),
    })
}

/// Trailer digits for a checksum as transmitted after the `!`
pub fn format_checksum(crc: u16) -> String {
    format!("{:04X}", crc)
}

pub fn extract_numeric_value(value_str: &str) -> Option<f64> {
    // Extract numeric value from strings like "000123.456" or "123.456*kWh"
    let cleaned = value_str
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect::<String>();

    cleaned.parse::<f64>().ok()
}

pub fn extract_unit(value_str: &str) -> Option<String> {
    let (_, unit) = value_str.rsplit_once('*')?;
    if unit.is_empty() {
        return None;
    }
    Some(unit.to_string())
}

pub fn is_timestamp(value_str: &str) -> bool {
    TIMESTAMP_PATTERN.is_match(value_str)
}

/// Parses `YYMMDDhhmmssX` where X is `S` for summer time (UTC+2) and `W` for
/// winter time (UTC+1).
pub fn parse_timestamp(value_str: &str) -> Option<DateTime<FixedOffset>> {
    if !is_timestamp(value_str) {
        return None;
    }

    let offset_hours = match value_str.chars().last()? {
        'S' => 2,
        _ => 1,
    };
    let offset = FixedOffset::east_opt(offset_hours * 3600)?;
    let naive = NaiveDateTime::parse_from_str(&value_str[..12], "%y%m%d%H%M%S").ok()?;

    offset.from_local_datetime(&naive).single()
}

/// Decodes text that was sent as hex octets, e.g. equipment identifiers.
pub fn decode_hex_text(value_str: &str) -> Option<String> {
    let bytes = hex::decode(value_str).ok()?;
    let text = String::from_utf8(bytes).ok()?;

    if text.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        Some(text)
    } else {
        None
    }
}

/// Value groups of a record. The decoder keeps the `)(` between groups.
pub fn split_value_groups(raw_value: &str) -> Vec<&str> {
    raw_value.split(")(").collect()
}
