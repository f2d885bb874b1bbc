use log::{error, info};
use p1reader::{config::Config, ConfigHolder, MeteringData, P1Manager};
use tokio::sync::mpsc::Receiver;

#[cfg(feature = "mqtt")]
use p1reader::mqtt::MqttManager;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter = std::env::var("P1_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config = match ConfigHolder::load() {
        Ok(holder) => holder.get_complete_config(),
        Err(e) => {
            info!("{e}, reading telegrams from stdin");
            Config::default()
        }
    };

    let (tx, rx) = tokio::sync::mpsc::channel(100);

    let mut p1 = P1Manager::new(tx, config.source.clone(), config.decoder.clone());
    let reader = tokio::spawn(async move {
        p1.start_thread().await;
    });

    let output = tokio::spawn(output_thread(rx, config));

    if let Err(e) = reader.await {
        error!("P1 thread failed: {e:?}");
    }
    /* The reader dropped its sender, the output drains what is left */
    if let Err(e) = output.await {
        error!("Output thread failed: {e:?}");
    }

    info!("P1 reader stopped");
    Ok(())
}

async fn output_thread(mut rx: Receiver<MeteringData>, config: Config) {
    #[cfg(feature = "mqtt")]
    let mqtt = config.mqtt.as_ref().map(MqttManager::new);
    #[cfg(not(feature = "mqtt"))]
    let _ = &config;

    while let Some(data) = rx.recv().await {
        match data.to_json() {
            Ok(line) => println!("{line}"),
            Err(e) => error!("Unable to serialize metering data: {e:?}"),
        }

        #[cfg(feature = "mqtt")]
        if let Some(mqtt) = &mqtt {
            mqtt.publish(&data).await;
        }
    }
}
