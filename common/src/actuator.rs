use crate::{config::WiringConfig, types::ActuatorState};

/// Sink for controller decisions.
pub trait Actuator {
    fn apply(&mut self, state: ActuatorState);
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn apply(&mut self, state: ActuatorState) {
        (**self).apply(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    High,
    Low,
}

impl PinLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Low => "LOW",
        }
    }
}

/// Relay output with an optional LED that mirrors it.
///
/// Polarity is a wiring detail: an active-low relay energizes on `LOW`.
#[derive(Debug, Clone)]
pub struct RelayActuator {
    active_low: bool,
    has_indicator: bool,
    state: ActuatorState,
    writes: u64,
}

impl RelayActuator {
    pub fn new(active_low: bool, has_indicator: bool) -> Self {
        Self {
            active_low,
            has_indicator,
            state: ActuatorState::Off,
            writes: 0,
        }
    }

    pub fn from_wiring(wiring: &WiringConfig) -> Self {
        Self::new(wiring.relay_active_low, wiring.led_pin.is_some())
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    /// Physical output changes performed so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn relay_level(&self) -> PinLevel {
        relay_level(self.state, self.active_low)
    }

    pub fn led_level(&self) -> Option<PinLevel> {
        self.has_indicator.then(|| {
            if self.state.is_on() {
                PinLevel::High
            } else {
                PinLevel::Low
            }
        })
    }
}

impl Actuator for RelayActuator {
    fn apply(&mut self, state: ActuatorState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.writes = self.writes.saturating_add(1);
    }
}

pub fn relay_level(state: ActuatorState, active_low: bool) -> PinLevel {
    match (state.is_on(), active_low) {
        (true, true) | (false, false) => PinLevel::Low,
        (true, false) | (false, true) => PinLevel::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_low_relay_idles_high() {
        let mut relay = RelayActuator::new(true, true);
        assert_eq!(relay.relay_level(), PinLevel::High);
        assert_eq!(relay.led_level(), Some(PinLevel::Low));

        relay.apply(ActuatorState::On);
        assert_eq!(relay.relay_level(), PinLevel::Low);
        assert_eq!(relay.led_level(), Some(PinLevel::High));
    }

    #[test]
    fn active_high_relay_follows_state() {
        let mut relay = RelayActuator::new(false, false);
        relay.apply(ActuatorState::On);

        assert_eq!(relay.relay_level(), PinLevel::High);
        assert_eq!(relay.led_level(), None);
    }

    #[test]
    fn applying_same_state_twice_is_a_no_op() {
        let mut relay = RelayActuator::new(true, true);

        relay.apply(ActuatorState::On);
        relay.apply(ActuatorState::On);
        assert_eq!(relay.writes(), 1);

        relay.apply(ActuatorState::Off);
        relay.apply(ActuatorState::Off);
        assert_eq!(relay.writes(), 2);
    }

    #[test]
    fn initial_off_needs_no_write() {
        let mut relay = RelayActuator::from_wiring(&WiringConfig::default());
        relay.apply(ActuatorState::Off);

        assert_eq!(relay.writes(), 0);
        assert_eq!(relay.state(), ActuatorState::Off);
    }
}
