use std::collections::HashMap;
use lazy_static::lazy_static;

/// How the value groups of an OBIS record should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Guess from the shape of the value
    Auto,
    Timestamp,
    /// ASCII text transmitted as hex octets
    HexText,
    Text,
}

lazy_static! {
    static ref OBIS_DESCRIPTIONS: HashMap<&'static str, &'static str> = get_standard_obis_descriptions();
    static ref DSMR_FIELD_MAPPING: HashMap<&'static str, &'static str> = get_dsmr_field_mapping();
}

pub fn get_obis_description(obis_code: &str) -> Option<&'static str> {
    OBIS_DESCRIPTIONS.get(obis_code).copied()
}

pub fn get_field_name(obis_code: &str) -> Option<&'static str> {
    DSMR_FIELD_MAPPING.get(obis_code).copied()
}

pub fn get_standard_obis_descriptions() -> HashMap<&'static str, &'static str> {
    let mut map = HashMap::new();

    // Meta data
    map.insert("1-3:0.2.8", "Version information");
    map.insert("0-0:1.0.0", "Date and time");
    map.insert("0-0:96.1.1", "Equipment identifier");
    map.insert("0-0:96.1.4", "Version information (Belgium)");
    map.insert("0-0:96.14.0", "Tariff indicator");
    map.insert("0-0:96.13.0", "Text message");
    map.insert("0-0:96.13.1", "Text message code");
    map.insert("0-0:17.0.0", "Actual threshold electricity");
    map.insert("0-0:96.3.10", "Switch position electricity");

    // Energy values
    map.insert("1-0:1.8.0", "Active energy + (total)");
    map.insert("1-0:1.8.1", "Active energy + (tariff 1)");
    map.insert("1-0:1.8.2", "Active energy + (tariff 2)");
    map.insert("1-0:2.8.0", "Active energy - (total)");
    map.insert("1-0:2.8.1", "Active energy - (tariff 1)");
    map.insert("1-0:2.8.2", "Active energy - (tariff 2)");

    // Power values
    map.insert("1-0:1.7.0", "Active power + (total)");
    map.insert("1-0:2.7.0", "Active power - (total)");
    map.insert("1-0:21.7.0", "Active power + (L1)");
    map.insert("1-0:41.7.0", "Active power + (L2)");
    map.insert("1-0:61.7.0", "Active power + (L3)");
    map.insert("1-0:22.7.0", "Active power - (L1)");
    map.insert("1-0:42.7.0", "Active power - (L2)");
    map.insert("1-0:62.7.0", "Active power - (L3)");

    // Voltage values
    map.insert("1-0:32.7.0", "Voltage (L1)");
    map.insert("1-0:52.7.0", "Voltage (L2)");
    map.insert("1-0:72.7.0", "Voltage (L3)");

    // Current values
    map.insert("1-0:31.7.0", "Current (L1)");
    map.insert("1-0:51.7.0", "Current (L2)");
    map.insert("1-0:71.7.0", "Current (L3)");

    // Power quality
    map.insert("0-0:96.7.21", "Number of power failures");
    map.insert("0-0:96.7.9", "Number of long power failures");
    map.insert("1-0:99.97.0", "Power failure event log");
    map.insert("1-0:32.32.0", "Number of voltage sags (L1)");
    map.insert("1-0:52.32.0", "Number of voltage sags (L2)");
    map.insert("1-0:72.32.0", "Number of voltage sags (L3)");
    map.insert("1-0:32.36.0", "Number of voltage swells (L1)");
    map.insert("1-0:52.36.0", "Number of voltage swells (L2)");
    map.insert("1-0:72.36.0", "Number of voltage swells (L3)");

    // M-Bus devices (gas, water, heat) on channel 1
    map.insert("0-1:24.1.0", "M-Bus device type");
    map.insert("0-1:96.1.0", "M-Bus equipment identifier");
    map.insert("0-1:24.2.1", "M-Bus delivered value");
    map.insert("0-1:24.4.0", "M-Bus valve position");

    map
}

pub fn get_dsmr_field_mapping() -> HashMap<&'static str, &'static str> {
    let mut map = HashMap::new();

    map.insert("1-3:0.2.8", "version");
    map.insert("0-0:1.0.0", "timestamp");
    map.insert("0-0:96.1.1", "equipment_identifier");
    map.insert("0-0:96.14.0", "tariff_indicator");
    map.insert("0-0:96.13.0", "text_message");
    map.insert("1-0:1.8.1", "energy_consumed_t1");
    map.insert("1-0:1.8.2", "energy_consumed_t2");
    map.insert("1-0:2.8.1", "energy_delivered_t1");
    map.insert("1-0:2.8.2", "energy_delivered_t2");
    map.insert("1-0:1.8.0", "total_energy_consumed");
    map.insert("1-0:2.8.0", "total_energy_delivered");
    map.insert("1-0:1.7.0", "power_consumed");
    map.insert("1-0:2.7.0", "power_delivered");
    map.insert("1-0:21.7.0", "power_consumed_l1");
    map.insert("1-0:41.7.0", "power_consumed_l2");
    map.insert("1-0:61.7.0", "power_consumed_l3");
    map.insert("1-0:22.7.0", "power_delivered_l1");
    map.insert("1-0:42.7.0", "power_delivered_l2");
    map.insert("1-0:62.7.0", "power_delivered_l3");
    map.insert("1-0:32.7.0", "voltage_l1");
    map.insert("1-0:52.7.0", "voltage_l2");
    map.insert("1-0:72.7.0", "voltage_l3");
    map.insert("1-0:31.7.0", "current_l1");
    map.insert("1-0:51.7.0", "current_l2");
    map.insert("1-0:71.7.0", "current_l3");
    map.insert("0-0:96.7.21", "power_failures");
    map.insert("0-0:96.7.9", "long_power_failures");
    map.insert("0-1:96.1.0", "mbus_equipment_identifier");
    map.insert("0-1:24.2.1", "mbus_delivered");

    map
}

/// Value interpretation for codes whose payload cannot be told apart by
/// shape alone. Equipment identifiers are all digits but hex encoded text.
pub fn get_value_kind(code: &str) -> ValueKind {
    let (medium, cde) = match code.split_once(':') {
        Some((ab, cde)) => (ab.split('-').next().unwrap_or(""), cde),
        None => return ValueKind::Auto,
    };

    match (medium, cde) {
        ("0", "96.1.0") | ("0", "96.1.1") | ("0", "96.13.0") => ValueKind::HexText,
        ("0", "1.0.0") => ValueKind::Timestamp,
        ("0", "96.1.4") | ("0", "96.13.1") => ValueKind::Text,
        _ => ValueKind::Auto,
    }
}

pub fn validate_obis_code(code: &str) -> bool {
    // OBIS code format: A-B:C.D.E*F
    // A: Medium (0=abstract, 1=electricity, 6=heat, 7=gas, 8=water)
    // B: Channel (0-64)
    // C: Physical value (1-255)
    // D: Processing method (0-255)
    // E: Tariff/Time (0-255)
    // F: Storage (optional, 0-255)

    let parts: Vec<&str> = code.split(':').collect();
    if parts.len() != 2 {
        return false;
    }

    let ab_parts: Vec<&str> = parts[0].split('-').collect();
    if ab_parts.len() != 2 {
        return false;
    }

    let (cde_part, storage) = match parts[1].split_once('*') {
        Some((cde, f)) => (cde, Some(f)),
        None => (parts[1], None),
    };

    let cde_parts: Vec<&str> = cde_part.split('.').collect();
    if cde_parts.len() != 3 {
        return false;
    }

    for part in ab_parts.iter().chain(cde_parts.iter()).chain(storage.iter()) {
        if part.parse::<u8>().is_err() {
            return false;
        }
    }

    true
}

pub fn normalize_obis_code(code: &str) -> String {
    code.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_obis_code() {
        assert!(validate_obis_code("1-0:1.8.1"));
        assert!(validate_obis_code("0-0:1.0.0"));
        assert!(validate_obis_code("1-0:15.7.0"));
        assert!(validate_obis_code("1-0:1.8.0*255"));
        assert!(!validate_obis_code("invalid"));
        assert!(!validate_obis_code("1:2.3.4"));
        assert!(!validate_obis_code("1-0:1.8"));
        assert!(!validate_obis_code("1-0:1.8.0*"));
        assert!(!validate_obis_code(".0"));
    }

    #[test]
    fn test_get_obis_description() {
        assert_eq!(get_obis_description("1-0:1.8.1"), Some("Active energy + (tariff 1)"));
        assert_eq!(get_obis_description("0-0:96.1.1"), Some("Equipment identifier"));
        assert_eq!(get_obis_description("nonexistent"), None);
    }

    #[test]
    fn test_get_field_name() {
        assert_eq!(get_field_name("1-0:1.7.0"), Some("power_consumed"));
        assert_eq!(get_field_name("0-1:24.2.1"), Some("mbus_delivered"));
        assert_eq!(get_field_name("9-9:9.9.9"), None);
    }

    #[test]
    fn test_get_value_kind() {
        assert_eq!(get_value_kind("0-0:96.1.1"), ValueKind::HexText);
        assert_eq!(get_value_kind("0-1:96.1.0"), ValueKind::HexText);
        assert_eq!(get_value_kind("0-0:1.0.0"), ValueKind::Timestamp);
        assert_eq!(get_value_kind("1-0:1.8.1"), ValueKind::Auto);
        assert_eq!(get_value_kind("garbage"), ValueKind::Auto);
    }

    #[test]
    fn test_normalize_obis_code() {
        assert_eq!(normalize_obis_code("  1-0:1.8.1  "), "1-0:1.8.1");
        assert_eq!(normalize_obis_code("1-0:15.7.0"), "1-0:15.7.0");
    }
}
