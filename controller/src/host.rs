use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::{
    net::TcpListener,
    sync::{mpsc, Mutex},
};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use fancontrol_common::{
    ContactForm, ControlPolicy, CycleResult, FanController, InMemoryContactBook,
    LatestReadingFeed, Reading, RelayActuator, RuntimeConfig, SensorFeed, SensorSource,
    StdSimulatedFeed, TracingReporter, TOPIC_CMD_LOOP, TOPIC_CMD_POLICY, TOPIC_CONTROLLER_STATE,
    TOPIC_CONTROLLER_STATUS_LINE, TOPIC_SENSOR_TEMP,
};

use crate::{
    api::{apply_policy, build_router, ApiState},
    clock::monotonic_ms,
    runner::{spawn_control_loop, LoopHandle},
    store::AppStore,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

/// Where the controller gets its temperature from.
#[derive(Debug)]
pub enum HostFeed {
    Simulated(StdSimulatedFeed),
    Mqtt(LatestReadingFeed),
}

impl HostFeed {
    fn from_runtime(runtime: &RuntimeConfig) -> Self {
        match runtime.sensor_source {
            SensorSource::Simulated => {
                HostFeed::Simulated(StdSimulatedFeed::from_config(runtime.simulation.clone()))
            }
            SensorSource::Mqtt => HostFeed::Mqtt(LatestReadingFeed::new(
                runtime.controller.sensor,
                runtime.controller.sensor_stale_timeout_ms,
            )),
        }
    }

    /// Returns false when the feed does not take pushed samples.
    pub fn push(&mut self, raw_c: f32, now_ms: u64) -> bool {
        match self {
            HostFeed::Mqtt(feed) => {
                feed.push(raw_c, now_ms);
                true
            }
            HostFeed::Simulated(_) => false,
        }
    }
}

impl SensorFeed for HostFeed {
    fn read(&mut self, now_ms: u64) -> Reading {
        match self {
            HostFeed::Simulated(feed) => feed.read(now_ms),
            HostFeed::Mqtt(feed) => feed.read(now_ms),
        }
    }
}

pub type HostController = FanController<HostFeed, RelayActuator, TracingReporter>;

/// Simulated readings step once per simulation interval.
fn cycle_interval_ms(runtime: &RuntimeConfig) -> u64 {
    match runtime.sensor_source {
        SensorSource::Simulated => runtime.simulation.interval_ms,
        SensorSource::Mqtt => runtime.controller.cycle_interval_ms,
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    if let Ok(value) = std::env::var("FANCONTROL_SENSOR_SOURCE") {
        match SensorSource::parse(&value) {
            Some(source) => runtime.sensor_source = source,
            None => warn!("ignoring unknown FANCONTROL_SENSOR_SOURCE value {value:?}"),
        }
    }
    runtime.sanitize();

    let contacts = store.load_contacts().await.unwrap_or_else(|err| {
        warn!("failed to load contacts from store: {err:#}");
        Vec::new()
    });

    let mut controller_config = runtime.controller.clone();
    controller_config.cycle_interval_ms = cycle_interval_ms(&runtime);
    let period = Duration::from_millis(controller_config.cycle_interval_ms);

    let controller = FanController::new(
        controller_config,
        runtime.policy,
        HostFeed::from_runtime(&runtime),
        RelayActuator::from_wiring(&runtime.wiring),
        TracingReporter::new(runtime.controller.status_precision),
    );
    info!(
        "starting fan controller: policy {}, source {:?}, period {} ms",
        runtime.policy,
        runtime.sensor_source,
        period.as_millis()
    );

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("fancontrol-controller", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let (cycles_tx, cycles_rx) = mpsc::unbounded_channel();
    let control = Arc::new(spawn_control_loop(
        Arc::new(Mutex::new(controller)),
        period,
        cycles_tx,
    ));

    let state = ApiState {
        control: Arc::clone(&control),
        contact_form: Arc::new(Mutex::new(ContactForm::new(
            runtime.controller.notice_dismiss_ms,
        ))),
        runtime: Arc::new(Mutex::new(runtime)),
        contacts: Arc::new(InMemoryContactBook::with_records(contacts)),
        store,
    };

    subscribe_topics(&mqtt).await?;
    spawn_mqtt_loop(state.clone(), eventloop);
    spawn_publish_loop(Arc::clone(&control), mqtt, cycles_rx);

    let web_root = std::env::var("FANCONTROL_WEB_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(format!("{}/web", env!("CARGO_MANIFEST_DIR"))));
    let app = build_router(state).fallback_service(ServeDir::new(web_root));

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    control.shutdown().await;
    info!("controller stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    for topic in [TOPIC_SENSOR_TEMP, TOPIC_CMD_LOOP, TOPIC_CMD_POLICY] {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(state: ApiState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&state, &message.topic, &message.payload).await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_publish_loop(
    control: Arc<LoopHandle<HostController>>,
    mqtt: AsyncClient,
    mut cycles_rx: mpsc::UnboundedReceiver<CycleResult>,
) {
    tokio::spawn(async move {
        while let Some(cycle) = cycles_rx.recv().await {
            let (payload, line) = {
                let controller = control.driver().lock().await;
                let precision = controller.config().status_precision;
                (
                    serde_json::to_vec(&controller.state_payload()),
                    fancontrol_common::status_line(&cycle, precision),
                )
            };

            match payload {
                Ok(body) => {
                    if let Err(err) = mqtt
                        .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("controller state publish failed: {err}");
                    }
                }
                Err(err) => warn!("controller state serialization failed: {err}"),
            }

            if let Err(err) = mqtt
                .publish(TOPIC_CONTROLLER_STATUS_LINE, QoS::AtMostOnce, false, line)
                .await
            {
                warn!("status line publish failed: {err}");
            }
        }
    });
}

async fn handle_mqtt_message(state: &ApiState, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = std::str::from_utf8(payload).context("non utf8 mqtt payload")?;

    match topic {
        TOPIC_SENSOR_TEMP => {
            let raw = parse_temperature(message);
            let accepted = {
                let mut controller = state.control.driver().lock().await;
                controller.feed_mut().push(raw, monotonic_ms())
            };
            if !accepted {
                warn!("ignoring MQTT temperature sample; controller uses the simulated source");
            }
        }
        TOPIC_CMD_LOOP => match message.trim().to_ascii_lowercase().as_str() {
            "pause" | "stop" => {
                state.control.pause().await;
            }
            "resume" | "run" | "start" => {
                state.control.resume().await;
            }
            other => warn!("unknown loop command {other:?}"),
        },
        TOPIC_CMD_POLICY => {
            let policy = serde_json::from_str::<ControlPolicy>(message)
                .context("invalid policy command")?;
            apply_policy(&state.control, &state.runtime, &state.store, policy).await?;
        }
        _ => {}
    }

    Ok(())
}

/// Unparseable payloads become NaN so the next cycle reports a sensor fault.
fn parse_temperature(message: &str) -> f32 {
    message.trim().parse::<f32>().unwrap_or(f32::NAN)
}
