use serde::{Deserialize, Serialize};

use crate::policy::ControlPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorRange {
    pub min_valid_c: f32,
    pub max_valid_c: f32,
}

impl Default for SensorRange {
    // DHT11 datasheet measuring range.
    fn default() -> Self {
        Self {
            min_valid_c: 0.0,
            max_valid_c: 50.0,
        }
    }
}

impl SensorRange {
    pub fn contains(&self, value_c: f32) -> bool {
        (self.min_valid_c..=self.max_valid_c).contains(&value_c)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub cycle_interval_ms: u64,
    pub sensor_stale_timeout_ms: u64,
    pub status_precision: usize,
    pub notice_dismiss_ms: u64,
    #[serde(default)]
    pub sensor: SensorRange,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 2_000,
            sensor_stale_timeout_ms: 10_000,
            status_precision: 2,
            notice_dismiss_ms: 5_000,
            sensor: SensorRange::default(),
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        self.cycle_interval_ms = self.cycle_interval_ms.clamp(100, 3_600_000);
        self.sensor_stale_timeout_ms = self.sensor_stale_timeout_ms.max(self.cycle_interval_ms);
        self.status_precision = self.status_precision.min(4);

        let range = &mut self.sensor;
        if !range.min_valid_c.is_finite()
            || !range.max_valid_c.is_finite()
            || range.min_valid_c >= range.max_valid_c
        {
            *range = SensorRange::default();
        }
    }
}

/// Simulation bounds beyond this magnitude are replaced by the defaults.
pub const SIMULATION_LIMIT_C: f32 = 1_000.0;

/// Random-walk parameters for the simulated sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub start_c: f32,
    pub step_c: f32,
    pub min_c: f32,
    pub max_c: f32,
    pub interval_ms: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_c: 25.0,
            step_c: 1.0,
            min_c: 20.0,
            max_c: 35.0,
            interval_ms: 1_000,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        let physical = -SIMULATION_LIMIT_C..=SIMULATION_LIMIT_C;
        if !physical.contains(&self.min_c)
            || !physical.contains(&self.max_c)
            || self.min_c >= self.max_c
        {
            self.min_c = defaults.min_c;
            self.max_c = defaults.max_c;
        }
        if !self.start_c.is_finite() {
            self.start_c = defaults.start_c;
        }
        self.start_c = self.start_c.clamp(self.min_c, self.max_c);
        if !self.step_c.is_finite() || self.step_c < 0.0 {
            self.step_c = defaults.step_c;
        }
        self.step_c = self.step_c.min(self.max_c - self.min_c);
        self.interval_ms = self.interval_ms.clamp(100, 3_600_000);
    }
}

/// Pin assignment for the generated firmware listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WiringConfig {
    pub sensor_pin: u8,
    pub relay_pin: u8,
    pub relay_active_low: bool,
    pub led_pin: Option<u8>,
    pub baud_rate: u32,
}

impl Default for WiringConfig {
    fn default() -> Self {
        Self {
            sensor_pin: 6,
            relay_pin: 8,
            relay_active_low: true,
            led_pin: Some(12),
            baud_rate: 9_600,
        }
    }
}

impl WiringConfig {
    pub fn sanitize(&mut self) {
        if self.relay_pin == self.sensor_pin {
            let defaults = Self::default();
            self.sensor_pin = defaults.sensor_pin;
            self.relay_pin = defaults.relay_pin;
        }
        if self
            .led_pin
            .is_some_and(|led| led == self.relay_pin || led == self.sensor_pin)
        {
            self.led_pin = None;
        }
        if !matches!(
            self.baud_rate,
            300 | 1_200 | 2_400 | 4_800 | 9_600 | 19_200 | 38_400 | 57_600 | 115_200
        ) {
            self.baud_rate = 9_600;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    #[default]
    Simulated,
    Mqtt,
}

impl SensorSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Some(Self::Simulated),
            "mqtt" => Some(Self::Mqtt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub controller: ControllerConfig,
    pub policy: ControlPolicy,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub wiring: WiringConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub sensor_source: SensorSource,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            policy: ControlPolicy::default(),
            simulation: SimulationConfig::default(),
            wiring: WiringConfig::default(),
            network: NetworkConfig::default(),
            sensor_source: SensorSource::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.controller.sanitize();
        self.simulation.sanitize();
        self.wiring.sanitize();
    }
}
