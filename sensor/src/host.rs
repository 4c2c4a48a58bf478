use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{info, warn};

use fancontrol_common::{
    Reading, SimulationConfig, StdSimulatedFeed, TOPIC_SENSOR_STATUS, TOPIC_SENSOR_TEMP,
};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = simulation_from_env();
    let period = Duration::from_millis(config.interval_ms);
    let mut feed = StdSimulatedFeed::from_config(config);

    let mqtt = connect(mqtt_options_from_env()).await?;
    info!("simulated sensor publishing every {} ms", period.as_millis());

    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;

        let reading = feed.advance();
        mqtt.publish(TOPIC_SENSOR_TEMP, QoS::AtLeastOnce, false, payload(reading))
            .await
            .context("failed to publish sensor temperature")?;
    }
}

/// Broker address and credentials, `MQTT_*` variables over local defaults.
fn mqtt_options_from_env() -> MqttOptions {
    let host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mut options = MqttOptions::new("fancontrol-sensor", host, port);
    if let Ok(user) = std::env::var("MQTT_USER") {
        options.set_credentials(user, std::env::var("MQTT_PASS").unwrap_or_default());
    }
    options
}

/// Announces the sensor as online and keeps the event loop polled in the background.
async fn connect(options: MqttOptions) -> anyhow::Result<AsyncClient> {
    let (mqtt, mut eventloop) = AsyncClient::new(options, 32);

    mqtt.publish(TOPIC_SENSOR_STATUS, QoS::AtLeastOnce, true, "online")
        .await
        .context("failed to queue sensor online status")?;

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    Ok(mqtt)
}

fn simulation_from_env() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    if let Some(interval_ms) = std::env::var("SENSOR_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
    {
        config.interval_ms = interval_ms;
    }
    config.seed = std::env::var("SENSOR_SEED")
        .ok()
        .and_then(|value| value.parse::<u64>().ok());
    config.sanitize();
    config
}

fn payload(reading: Reading) -> String {
    if reading.valid {
        format!("{:.1}", reading.value_c)
    } else {
        "nan".to_string()
    }
}
