use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelegramStatus {
    Ok,
    ChecksumMismatch,
    Corrupted,
}

impl TelegramStatus {
    pub fn to_string(&self) -> String {
        match self {
            TelegramStatus::Ok => "Ok".to_string(),
            TelegramStatus::ChecksumMismatch => "ChecksumMismatch".to_string(),
            TelegramStatus::Corrupted => "Corrupted".to_string(),
        }
    }
}

/// One complete telegram as recognized by the decoder.
///
/// The decoder hands ownership to the listener and keeps nothing, so the
/// telegram can only be read, never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct P1Telegram<R> {
    header: String,
    readings: Vec<R>,
    unknown_readings: Vec<(String, String)>,
    status: TelegramStatus,
    raw: Vec<u8>,
}

impl<R> P1Telegram<R> {
    pub(crate) fn new(
        header: String,
        readings: Vec<R>,
        unknown_readings: Vec<(String, String)>,
        status: TelegramStatus,
        raw: Vec<u8>,
    ) -> Self {
        Self {
            header,
            readings,
            unknown_readings,
            status,
            raw,
        }
    }

    /// Identification line without the leading `/`
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn readings(&self) -> &[R] {
        &self.readings
    }

    /// Records the reading factory declined, as `(identifier, raw value)`
    pub fn unknown_readings(&self) -> &[(String, String)] {
        &self.unknown_readings
    }

    pub fn status(&self) -> TelegramStatus {
        self.status
    }

    /// Unmodified telegram bytes, empty unless raw capture was enabled.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Raw bytes as text, each byte taken as one character like the other
    /// decoder buffers do.
    pub fn raw_text(&self) -> String {
        self.raw.iter().map(|b| *b as char).collect()
    }

    pub fn is_ok(&self) -> bool {
        self.status == TelegramStatus::Ok
    }

    pub fn into_readings(self) -> Vec<R> {
        self.readings
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentification {
    pub manufacturer: String,
    pub baud_rate: Option<char>,
    pub identification: String,
    pub full_id: String,
}
