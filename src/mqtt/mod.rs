use crate::config::MqttConfig;
use crate::MeteringData;
use log::{debug, error, info};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;

pub struct MqttManager {
    client: AsyncClient,
    topic_prefix: String,
}

impl MqttManager {
    /// Connects in the background, the event loop is polled by its own task.
    pub fn new(config: &MqttConfig) -> Self {
        info!("MQTT connection starting up");
        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if !config.user.is_empty() {
            mqttoptions.set_credentials(config.user.clone(), config.pass.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);

        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT connected");
                    }
                    Ok(event) => {
                        debug!("MQTT event: {:?}", event);
                    }
                    Err(e) => {
                        error!("MQTT connection error: {e:?}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        MqttManager {
            client,
            topic_prefix: config.topic_prefix.clone(),
        }
    }

    pub fn topic_for(&self, data: &MeteringData) -> String {
        let meter = match data.meter_name.is_empty() {
            true => "unknown".to_string(),
            false => sanitize_topic_level(&data.meter_name),
        };
        format!("{}/{}", self.topic_prefix, meter)
    }

    pub async fn publish(&self, data: &MeteringData) {
        let payload = match data.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Unable to serialize metering data: {e:?}");
                return;
            }
        };

        let topic = self.topic_for(data);
        debug!("Publishing to {topic}");
        if let Err(e) = self.client.publish(topic, QoS::AtLeastOnce, false, payload).await {
            error!("Failed to publish metering data: {e:?}");
        }
    }
}

/// Topic levels must not contain wildcards or separators
pub fn sanitize_topic_level(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '+' | '#' | '\\' => '_',
            c if c.is_ascii_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_topic_level() {
        assert_eq!(sanitize_topic_level("ISk5\\2MT382-1000"), "ISk5_2MT382-1000");
        assert_eq!(sanitize_topic_level("a/b+c#d e"), "a_b_c_d_e");
        assert_eq!(sanitize_topic_level("KFM5KAIFA-METER"), "KFM5KAIFA-METER");
    }

    #[tokio::test]
    async fn test_topic_for() {
        let config = MqttConfig {
            host: "localhost".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            client_name: "p1reader-test".to_string(),
            topic_prefix: "home/meter".to_string(),
        };
        let manager = MqttManager::new(&config);

        let mut data = MeteringData::new();
        assert_eq!(manager.topic_for(&data), "home/meter/unknown");

        data.meter_name = "XMX5LGBBFFB231215493".to_string();
        assert_eq!(manager.topic_for(&data), "home/meter/XMX5LGBBFFB231215493");
    }
}
