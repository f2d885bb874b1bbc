use crate::config::{DecoderConfig, SourceConfig};
use crate::MeteringData;
use log::{debug, info, warn};
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::Sender;

pub mod utils;
pub mod structs;
pub mod parser;
pub mod reading;

use parser::TelegramDecoder;
use reading::{ObisReadingFactory, Reading, ReadingValue};
use structs::{P1Telegram, TelegramStatus};

#[derive(Error, Debug)]
pub enum P1Error {
    #[error("I/O error on P1 source: {0}")]
    Io(#[from] std::io::Error),
    #[error("P1 source closed")]
    SourceClosed,
    #[error("Output channel closed")]
    ChannelClosed,
}

pub struct P1Manager {
    sender: Sender<MeteringData>,
    source: SourceConfig,
    config: DecoderConfig,
}

impl P1Manager {
    pub fn new(sender: Sender<MeteringData>, source: SourceConfig, config: DecoderConfig) -> Self {
        Self { sender, source, config }
    }

    pub async fn start_thread(&mut self) {
        info!("Starting P1 thread reading from {:?}", self.source);

        loop {
            let result = match &self.source {
                SourceConfig::Tcp { host, port } => {
                    match tokio::net::TcpStream::connect((host.as_str(), *port)).await {
                        Ok(stream) => {
                            info!("Connected to {}:{}", host, port);
                            self.read_telegrams(stream).await
                        }
                        Err(e) => Err(P1Error::Io(e)),
                    }
                }
                SourceConfig::File { path } => match tokio::fs::File::open(path).await {
                    Ok(file) => self.read_telegrams(file).await,
                    Err(e) => Err(P1Error::Io(e)),
                },
                SourceConfig::Stdin => self.read_telegrams(tokio::io::stdin()).await,
            };

            match result {
                Err(P1Error::ChannelClosed) => {
                    info!("Nobody is listening anymore, stopping P1 thread");
                    return;
                }
                /* Only a network bridge comes back after hanging up */
                Err(P1Error::SourceClosed) if !matches!(self.source, SourceConfig::Tcp { .. }) => {
                    info!("Input closed, stopping P1 thread");
                    return;
                }
                Err(e) => warn!("P1 source failed: {}", e),
                Ok(()) => {}
            }

            tokio::time::sleep(Duration::from_secs(self.config.reconnect_delay)).await;
        }
    }

    /// Runs a fresh decoder over `reader` until it is exhausted. Every
    /// telegram is converted and sent to the output channel.
    pub async fn read_telegrams<R: AsyncRead + Unpin>(&self, mut reader: R) -> Result<(), P1Error> {
        let (tx, rx) = mpsc::channel::<P1Telegram<Reading>>();
        let mut decoder = TelegramDecoder::new(ObisReadingFactory::new(), move |telegram: P1Telegram<Reading>| {
            let _ = tx.send(telegram);
        });
        decoder.set_lenient(self.config.lenient);
        decoder.set_raw_capture(self.config.raw_capture);

        let mut buffer = vec![0u8; self.config.read_buffer.max(1)];
        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                /* Whatever was collected of the current telegram is lost */
                decoder.reset();
                return Err(P1Error::SourceClosed);
            }

            if let Err(e) = decoder.feed(&buffer[..n]) {
                match e {}
            }

            let telegrams: Vec<P1Telegram<Reading>> = rx.try_iter().collect();
            for telegram in telegrams {
                match telegram.status() {
                    TelegramStatus::Ok => debug!(
                        "Telegram from {} with {} readings",
                        telegram.header(),
                        telegram.readings().len()
                    ),
                    status => warn!(
                        "Telegram from {} has status {}",
                        telegram.header(),
                        status.to_string()
                    ),
                }

                if !telegram.raw().is_empty() {
                    debug!("Raw telegram: {:?}", telegram.raw_text());
                }

                let data = telegram_to_metering_data(&telegram);
                if self.sender.send(data).await.is_err() {
                    return Err(P1Error::ChannelClosed);
                }
            }
        }
    }
}

pub fn telegram_to_metering_data(telegram: &P1Telegram<Reading>) -> MeteringData {
    let mut mr = MeteringData::new();
    let device_info = utils::parse_identification_line(telegram.header());

    mr.meter_name = match &device_info {
        Some(info) => info.full_id.clone(),
        None => telegram.header().to_string(),
    };
    mr.id = crate::get_id("p1".to_string(), &mr.meter_name);
    mr.status = telegram.status();
    mr.transmission_time = crate::get_unix_ts();
    mr.metered_time = mr.transmission_time;

    for reading in telegram.readings() {
        let key = reading.key().to_string();

        if reading.obis == "0-0:1.0.0" {
            if let Some(ReadingValue::Timestamp(ts)) = reading.value() {
                mr.metered_time = ts.timestamp().max(0) as u64;
            }
        }

        if let Some(value) = reading.value() {
            if let Some(unit) = value.unit() {
                mr.metered_values.insert(format!("{}_unit", key), unit.into());
            }
            mr.metered_values.insert(key, value.to_json());
        }
    }

    let mut protocol_map = serde_json::Map::new();
    protocol_map.insert("type".to_string(), "p1".into());
    protocol_map.insert("status".to_string(), telegram.status().to_string().into());
    if let Some(info) = device_info {
        protocol_map.insert("manufacturer".to_string(), info.manufacturer.into());
        protocol_map.insert("identification".to_string(), info.identification.into());
    }
    if !telegram.unknown_readings().is_empty() {
        let unknown: serde_json::Map<String, serde_json::Value> = telegram
            .unknown_readings()
            .iter()
            .map(|(id, value)| (id.clone(), serde_json::Value::from(value.clone())))
            .collect();
        protocol_map.insert("unknown".to_string(), unknown.into());
    }

    mr.metered_values.insert("proto".to_string(), protocol_map.into());
    return mr;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Crc16;
    use crate::metering_p1::utils::format_checksum;

    fn with_checksum(body: &str) -> String {
        let crc = Crc16::new().compute(body.as_bytes(), 0);
        format!("{}{}\r\n", body, format_checksum(crc))
    }

    const TELEGRAM: &str = "/ISk5\\2MT382-1000\r\n\r\n1-3:0.2.8(50)\r\n0-0:1.0.0(101209113020W)\r\n0-0:96.1.1(4B384547303034303436333935353037)\r\n1-0:1.8.1(123456.789*kWh)\r\n1-0:1.7.0(01.193*kW)\r\n0-1:24.2.1(101209112500W)(12785.123*m3)\r\n!";

    fn decode(input: &str) -> Vec<P1Telegram<Reading>> {
        let (tx, rx) = mpsc::channel();
        let mut decoder = TelegramDecoder::new(ObisReadingFactory::new(), move |t: P1Telegram<Reading>| tx.send(t).unwrap());
        if let Err(e) = decoder.feed(input.as_bytes()) {
            match e {}
        }
        rx.try_iter().collect()
    }

    #[test]
    fn test_telegram_to_metering_data() {
        let telegrams = decode(&with_checksum(TELEGRAM));
        assert_eq!(telegrams.len(), 1);

        let data = telegram_to_metering_data(&telegrams[0]);
        assert_eq!(data.meter_name, "ISk5\\2MT382-1000");
        assert!(data.id.starts_with("p1-ISk5"));
        assert_eq!(data.status, TelegramStatus::Ok);
        /* 2010-12-09 11:30:20 +01:00 */
        assert_eq!(data.metered_time, 1291890620);

        let values = &data.metered_values;
        assert_eq!(values["version"], 50);
        assert_eq!(values["equipment_identifier"], "K8EG004046395507");
        assert_eq!(values["energy_consumed_t1"], 123456.789);
        assert_eq!(values["energy_consumed_t1_unit"], "kWh");
        assert_eq!(values["power_consumed"], 1.193);
        assert_eq!(values["mbus_delivered"], 12785.123);
        assert_eq!(values["mbus_delivered_unit"], "m3");
        assert_eq!(values["proto"]["manufacturer"], "ISk");
        assert_eq!(values["proto"]["status"], "Ok");
        assert!(values["proto"].get("unknown").is_none());
    }

    #[test]
    fn test_unknown_readings_are_reported() {
        let body = "/XMX5LGBBFFB231215493\r\n\r\n1-0:1.8.1(000123.456*kWh)\r\n1-0:1.8(5)\r\n!";
        let telegrams = decode(&with_checksum(body));

        let data = telegram_to_metering_data(&telegrams[0]);
        assert_eq!(data.metered_values["proto"]["unknown"]["1-0:1.8"], "5");
        assert_eq!(data.metered_values["energy_consumed_t1"], 123.456);
    }

    #[tokio::test]
    async fn test_read_telegrams_forwards_all_telegrams() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        let manager = P1Manager::new(tx, SourceConfig::Stdin, DecoderConfig { read_buffer: 7, ..DecoderConfig::default() });

        let input = format!("{}{}", with_checksum(TELEGRAM), with_checksum(TELEGRAM));
        let result = manager.read_telegrams(input.as_bytes()).await;
        assert!(matches!(result, Err(P1Error::SourceClosed)));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.status, TelegramStatus::Ok);
        assert_eq!(second.status, TelegramStatus::Ok);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_file_source_is_read_once() {
        let path = std::env::temp_dir().join(format!("p1reader-capture-{}.txt", std::process::id()));
        std::fs::write(&path, with_checksum(TELEGRAM)).unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        let source = SourceConfig::File { path: path.to_string_lossy().to_string() };
        let mut manager = P1Manager::new(tx, source, DecoderConfig { reconnect_delay: 0, ..DecoderConfig::default() });

        let finished = tokio::time::timeout(Duration::from_secs(5), manager.start_thread()).await;
        std::fs::remove_file(&path).unwrap();
        assert!(finished.is_ok());

        drop(manager);
        let mut received = Vec::new();
        while let Some(data) = rx.recv().await {
            received.push(data);
        }
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].status, TelegramStatus::Ok);
    }

    #[tokio::test]
    async fn test_read_telegrams_stops_when_output_is_gone() {
        let (tx, rx) = tokio::sync::mpsc::channel(10);
        drop(rx);
        let manager = P1Manager::new(tx, SourceConfig::Stdin, DecoderConfig::default());

        let input = with_checksum(TELEGRAM);
        let result = manager.read_telegrams(input.as_bytes()).await;
        assert!(matches!(result, Err(P1Error::ChannelClosed)));
    }
}
