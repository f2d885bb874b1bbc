//! P1 smart meter reader library
//!
//! Decodes the DSMR / P1 telegram stream of electricity meters into
//! structured readings and converts them into JSON metering data.

pub mod checksum;
pub mod config;
pub mod metering_p1;
pub mod models;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod obis_utils;

// Re-export common types for easier access
pub use checksum::Crc16;
pub use config::{Config, ConfigHolder};
pub use metering_p1::parser::TelegramDecoder;
pub use metering_p1::reading::{ObisReadingFactory, RawReadingFactory, Reading, ReadingFactory};
pub use metering_p1::structs::{P1Telegram, TelegramStatus};
pub use metering_p1::P1Manager;
pub use models::MeteringData;

pub fn get_unix_ts() -> u64 {
    return std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
}

pub fn get_id(protocol: String, meter_name: &String) -> String {
    return format!("{}-{}-{:?}", protocol, meter_name, get_unix_ts());
}
