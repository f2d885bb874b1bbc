use serde::{Deserialize, Serialize};
use crate::metering_p1::structs::TelegramStatus;

/// A telegram flattened for export, one entry per reading in `metered_values`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeteringData {
    pub id: String,
    pub meter_name: String,
    pub protocol: String,
    pub status: TelegramStatus,
    pub transmission_time: u64,
    pub metered_time: u64,
    pub metered_values: serde_json::Map<String, serde_json::Value>,
}

impl MeteringData {
    pub fn new() -> Self {
        return MeteringData {
            id: "".to_string(),
            meter_name: "".to_string(),
            protocol: "p1".to_string(),
            status: TelegramStatus::Ok,
            transmission_time: 0,
            metered_time: 0,
            metered_values: serde_json::Map::new(),
        };
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Default for MeteringData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metering_data_serialization() {
        let mut data = MeteringData::new();
        data.meter_name = "ISk5\\2MT382-1000".to_string();
        data.status = TelegramStatus::ChecksumMismatch;
        data.metered_values.insert("power_consumed".to_string(), serde_json::json!(1.193));

        let json = data.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["protocol"], "p1");
        assert_eq!(value["status"], "ChecksumMismatch");
        assert_eq!(value["metered_values"]["power_consumed"], 1.193);

        let back: MeteringData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.meter_name, data.meter_name);
        assert_eq!(back.status, TelegramStatus::ChecksumMismatch);
    }
}
