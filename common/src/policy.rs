use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ActuatorState, Reading};

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("on threshold {on} must be greater than off threshold {off}")]
    InvertedBand { on: f32, off: f32 },

    #[error("threshold {0} is not a finite temperature")]
    NonFiniteThreshold(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleThreshold {
    threshold: f32,
}

impl SimpleThreshold {
    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Two-threshold band. Only constructible through [`ControlPolicy::hysteresis`],
/// so `on > off` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisBand {
    on: f32,
    off: f32,
}

impl HysteresisBand {
    pub fn on(&self) -> f32 {
        self.on
    }

    pub fn off(&self) -> f32 {
        self.off
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicySpec", into = "PolicySpec")]
pub enum ControlPolicy {
    Simple(SimpleThreshold),
    Hysteresis(HysteresisBand),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum PolicySpec {
    Simple { threshold: f32 },
    Hysteresis { on: f32, off: f32 },
}

impl TryFrom<PolicySpec> for ControlPolicy {
    type Error = ConfigurationError;

    fn try_from(spec: PolicySpec) -> Result<Self, Self::Error> {
        match spec {
            PolicySpec::Simple { threshold } => Self::simple(threshold),
            PolicySpec::Hysteresis { on, off } => Self::hysteresis(on, off),
        }
    }
}

impl From<ControlPolicy> for PolicySpec {
    fn from(policy: ControlPolicy) -> Self {
        match policy {
            ControlPolicy::Simple(simple) => Self::Simple {
                threshold: simple.threshold,
            },
            ControlPolicy::Hysteresis(band) => Self::Hysteresis {
                on: band.on,
                off: band.off,
            },
        }
    }
}

impl Default for ControlPolicy {
    // Fan ON at 27 °C, OFF at 26 °C.
    fn default() -> Self {
        Self::Hysteresis(HysteresisBand {
            on: 27.0,
            off: 26.0,
        })
    }
}

impl ControlPolicy {
    pub fn simple(threshold: f32) -> Result<Self, ConfigurationError> {
        ensure_finite(threshold)?;
        Ok(Self::Simple(SimpleThreshold { threshold }))
    }

    pub fn hysteresis(on: f32, off: f32) -> Result<Self, ConfigurationError> {
        ensure_finite(on)?;
        ensure_finite(off)?;
        if on <= off {
            return Err(ConfigurationError::InvertedBand { on, off });
        }
        Ok(Self::Hysteresis(HysteresisBand { on, off }))
    }

    pub fn transition(&self, reading: Reading, previous: ActuatorState) -> ActuatorState {
        transition(self, reading, previous)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Simple(_) => "simple",
            Self::Hysteresis(_) => "hysteresis",
        }
    }
}

impl fmt::Display for ControlPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(simple) => write!(f, "simple threshold {:.1} C", simple.threshold),
            Self::Hysteresis(band) => {
                write!(f, "hysteresis on {:.1} C / off {:.1} C", band.on, band.off)
            }
        }
    }
}

/// Next actuator state for one reading.
///
/// Invalid readings hold the previous state. Both band edges are inclusive.
pub fn transition(
    policy: &ControlPolicy,
    reading: Reading,
    previous: ActuatorState,
) -> ActuatorState {
    if !reading.valid {
        return previous;
    }

    let value = reading.value_c;
    match policy {
        ControlPolicy::Simple(simple) => ActuatorState::from_bool(value >= simple.threshold),
        ControlPolicy::Hysteresis(band) => match previous {
            ActuatorState::Off if value >= band.on => ActuatorState::On,
            ActuatorState::On if value <= band.off => ActuatorState::Off,
            held => held,
        },
    }
}

fn ensure_finite(threshold: f32) -> Result<(), ConfigurationError> {
    if threshold.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::NonFiniteThreshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use ActuatorState::{Off, On};

    #[test]
    fn hysteresis_follows_documented_sequence() {
        let policy = ControlPolicy::hysteresis(27.0, 26.0).unwrap();
        let mut state = Off;
        let mut observed = Vec::new();

        for value in [25.0, 26.0, 27.0, 26.5, 26.0, 25.0] {
            state = policy.transition(Reading::valid(value), state);
            observed.push(state);
        }

        assert_eq!(observed, vec![Off, Off, On, On, Off, Off]);
    }

    #[test]
    fn simple_threshold_is_inclusive_on_the_on_side() {
        let policy = ControlPolicy::simple(28.0).unwrap();

        assert_eq!(policy.transition(Reading::valid(27.9), Off), Off);
        assert_eq!(policy.transition(Reading::valid(28.0), Off), On);
        assert_eq!(policy.transition(Reading::valid(27.9), On), Off);
    }

    #[test]
    fn invalid_reading_holds_state_under_every_policy() {
        let policies = [
            ControlPolicy::simple(28.0).unwrap(),
            ControlPolicy::hysteresis(27.0, 26.0).unwrap(),
        ];

        for policy in policies {
            assert_eq!(policy.transition(Reading::invalid(f32::NAN), On), On);
            assert_eq!(policy.transition(Reading::invalid(10.0), On), On);
            assert_eq!(policy.transition(Reading::invalid(99.0), Off), Off);
        }
    }

    #[test]
    fn dead_zone_preserves_previous_state() {
        let policy = ControlPolicy::hysteresis(27.0, 26.0).unwrap();

        assert_eq!(policy.transition(Reading::valid(26.5), On), On);
        assert_eq!(policy.transition(Reading::valid(26.5), Off), Off);
    }

    #[test]
    fn inverted_or_flat_band_is_rejected() {
        assert_eq!(
            ControlPolicy::hysteresis(26.0, 27.0),
            Err(ConfigurationError::InvertedBand { on: 26.0, off: 27.0 })
        );
        assert!(matches!(
            ControlPolicy::hysteresis(26.0, 26.0),
            Err(ConfigurationError::InvertedBand { .. })
        ));
    }

    #[test]
    fn non_finite_thresholds_are_rejected() {
        assert!(matches!(
            ControlPolicy::simple(f32::NAN),
            Err(ConfigurationError::NonFiniteThreshold(_))
        ));
        assert!(matches!(
            ControlPolicy::hysteresis(f32::INFINITY, 20.0),
            Err(ConfigurationError::NonFiniteThreshold(_))
        ));
    }

    #[test]
    fn serde_round_trip_uses_tagged_shape() {
        let policy = ControlPolicy::hysteresis(27.0, 26.0).unwrap();
        let json = serde_json::to_value(policy).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"kind": "hysteresis", "on": 27.0, "off": 26.0})
        );
    }

    #[test]
    fn deserializing_inverted_band_fails() {
        let result =
            serde_json::from_str::<ControlPolicy>(r#"{"kind":"hysteresis","on":20.0,"off":25.0}"#);

        let err = result.unwrap_err().to_string();
        assert!(err.contains("must be greater than"), "{err}");
    }

    #[test]
    fn display_names_thresholds() {
        assert_eq!(
            ControlPolicy::default().to_string(),
            "hysteresis on 27.0 C / off 26.0 C"
        );
        assert_eq!(
            ControlPolicy::simple(28.0).unwrap().to_string(),
            "simple threshold 28.0 C"
        );
    }
}
