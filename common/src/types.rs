use serde::{Deserialize, Serialize};

use crate::config::SensorRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActuatorState {
    On,
    Off,
}

impl ActuatorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }

    pub fn from_bool(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoopState {
    Running,
    Paused,
}

impl LoopState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
        }
    }
}

/// One temperature sample in degrees Celsius.
///
/// An invalid reading carries whatever the sensor returned (possibly NaN);
/// controllers must not act on its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    #[serde(rename = "valueC")]
    pub value_c: f32,
    pub valid: bool,
}

impl Reading {
    pub fn valid(value_c: f32) -> Self {
        Self {
            value_c,
            valid: true,
        }
    }

    pub fn invalid(value_c: f32) -> Self {
        Self {
            value_c,
            valid: false,
        }
    }

    pub fn from_sensor(raw_c: f32, range: &SensorRange) -> Self {
        if raw_c.is_finite() && range.contains(raw_c) {
            Self::valid(raw_c)
        } else {
            Self::invalid(raw_c)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleResult {
    pub reading: Reading,
    #[serde(rename = "previousState")]
    pub previous_state: ActuatorState,
    #[serde(rename = "newState")]
    pub new_state: ActuatorState,
}

impl CycleResult {
    pub fn changed(&self) -> bool {
        self.previous_state != self.new_state
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    #[serde(rename = "currentTemp")]
    pub current_temp: Option<f32>,
    #[serde(rename = "sensorValid")]
    pub sensor_valid: bool,
    #[serde(rename = "fanState")]
    pub fan_state: &'static str,
    #[serde(rename = "fanOn")]
    pub fan_on: bool,
    #[serde(rename = "relayLevel")]
    pub relay_level: &'static str,
    #[serde(rename = "ledLevel")]
    pub led_level: Option<&'static str>,
    #[serde(rename = "loopState")]
    pub loop_state: &'static str,
    pub policy: String,
    pub cycles: u64,
    #[serde(rename = "cycleIntervalMs")]
    pub cycle_interval_ms: u64,
    #[serde(rename = "lastCycleMs")]
    pub last_cycle_ms: Option<u64>,
    #[serde(rename = "statusLine")]
    pub status_line: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FanStatePayload {
    pub temp: Option<f32>,
    pub valid: bool,
    pub fan: &'static str,
    pub changed: bool,
    pub cycle: u64,
}
