use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config found, tried {0}")]
    NotFound(String),
    #[error("Unable to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
}

/// Where the telegram bytes come from
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// Serial to network bridge like ser2net
    Tcp { host: String, port: u16 },
    Stdin,
    /// A capture file or a serial device node that is already configured,
    /// read until its end
    File { path: String },
}

fn source_default() -> SourceConfig { return SourceConfig::Stdin }

fn decoder_lenient_default() -> bool { return false }
fn decoder_raw_capture_default() -> bool { return false }
fn decoder_read_buffer_default() -> usize { return 1024 }
fn decoder_reconnect_delay_default() -> u64 { return 5 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DecoderConfig {
    #[serde(default="decoder_lenient_default")]
    pub lenient: bool,
    #[serde(default="decoder_raw_capture_default")]
    pub raw_capture: bool,
    #[serde(default="decoder_read_buffer_default")]
    pub read_buffer: usize,
    /// Seconds to wait before the source is opened again
    #[serde(default="decoder_reconnect_delay_default")]
    pub reconnect_delay: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            lenient: decoder_lenient_default(),
            raw_capture: decoder_raw_capture_default(),
            read_buffer: decoder_read_buffer_default(),
            reconnect_delay: decoder_reconnect_delay_default(),
        }
    }
}

fn mqtt_port_default() -> u16 { return 1883 }
fn mqtt_client_name_default() -> String { return "p1reader".to_string() }
fn mqtt_topic_prefix_default() -> String { return "p1reader".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default="mqtt_port_default")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
    #[serde(default="mqtt_topic_prefix_default")]
    pub topic_prefix: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default="source_default")]
    pub source: SourceConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: source_default(),
            decoder: DecoderConfig::default(),
            mqtt: None,
        }
    }
}

pub struct ConfigHolder {
    pub config: Config,
    pub path: PathBuf,
}

impl ConfigHolder {
    /// Loads the file named by `P1_CONFIG`, otherwise the first of
    /// `config/p1reader.yaml` and `p1reader.yaml` that exists.
    pub fn load() -> Result<Self, ConfigError> {
        let candidates: Vec<PathBuf> = match std::env::var("P1_CONFIG") {
            Ok(path) => vec![PathBuf::from(path)],
            Err(_) => vec![PathBuf::from("config/p1reader.yaml"), PathBuf::from("p1reader.yaml")],
        };

        for path in candidates.iter() {
            if path.exists() {
                return Self::load_from(path);
            }
            debug!("No config at {}", path.display());
        }

        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(ConfigError::NotFound(tried.join(", ")))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::parse(&contents)?;
        info!("Config loaded from {}", path.display());

        Ok(ConfigHolder {
            config,
            path: path.to_path_buf(),
        })
    }

    pub fn parse(contents: &str) -> Result<Config, ConfigError> {
        let c: Config = serde_yml::from_str(contents)?;
        Ok(c)
    }

    pub fn get_complete_config(&self) -> Config {
        return self.config.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_source_with_defaults() {
        let yaml = r#"
source:
  type: Tcp
  host: 192.168.1.10
  port: 2001
"#;
        let config = ConfigHolder::parse(yaml).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Tcp { host: "192.168.1.10".to_string(), port: 2001 }
        );
        assert_eq!(config.decoder, DecoderConfig::default());
        assert!(config.mqtt.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
source:
  type: File
  path: /dev/ttyUSB0
decoder:
  lenient: true
  raw_capture: true
  reconnect_delay: 30
mqtt:
  host: broker.local
  user: meter
  pass: secret
"#;
        let config = ConfigHolder::parse(yaml).unwrap();
        assert_eq!(config.source, SourceConfig::File { path: "/dev/ttyUSB0".to_string() });
        assert!(config.decoder.lenient);
        assert!(config.decoder.raw_capture);
        assert_eq!(config.decoder.read_buffer, 1024);
        assert_eq!(config.decoder.reconnect_delay, 30);

        let mqtt = config.mqtt.unwrap();
        assert_eq!(mqtt.host, "broker.local");
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.client_name, "p1reader");
        assert_eq!(mqtt.topic_prefix, "p1reader");
    }

    #[test]
    fn test_empty_config_uses_stdin() {
        let config = ConfigHolder::parse("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_error() {
        let result = ConfigHolder::parse("source: [1, 2");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = ConfigHolder::load_from(Path::new("/nonexistent/p1reader.yaml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
