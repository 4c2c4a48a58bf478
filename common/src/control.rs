use tracing::{info, warn};

use crate::{
    actuator::{Actuator, RelayActuator},
    config::ControllerConfig,
    policy::ControlPolicy,
    report::{status_line, Reporter},
    simulation::SensorFeed,
    types::{ActuatorState, ControllerStatus, CycleResult, FanStatePayload, LoopState, Reading},
};

/// Actuator memory plus the RUNNING/PAUSED switch.
///
/// The actuator state only changes inside [`ControlLoop::step`].
#[derive(Debug, Clone)]
pub struct ControlLoop {
    policy: ControlPolicy,
    state: ActuatorState,
    loop_state: LoopState,
    cycles: u64,
}

impl ControlLoop {
    pub fn new(policy: ControlPolicy) -> Self {
        Self {
            policy,
            state: ActuatorState::Off,
            loop_state: LoopState::Running,
            cycles: 0,
        }
    }

    pub fn policy(&self) -> &ControlPolicy {
        &self.policy
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    pub fn is_running(&self) -> bool {
        self.loop_state == LoopState::Running
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn pause(&mut self) -> bool {
        if self.loop_state == LoopState::Paused {
            return false;
        }
        self.loop_state = LoopState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.loop_state == LoopState::Running {
            return false;
        }
        self.loop_state = LoopState::Running;
        true
    }

    /// Takes effect on the next cycle; the actuator state is kept.
    pub fn set_policy(&mut self, policy: ControlPolicy) -> bool {
        if self.policy == policy {
            return false;
        }
        self.policy = policy;
        true
    }

    pub fn step(&mut self, reading: Reading) -> Option<CycleResult> {
        if !self.is_running() {
            return None;
        }

        let previous_state = self.state;
        let new_state = self.policy.transition(reading, previous_state);
        self.state = new_state;
        self.cycles = self.cycles.saturating_add(1);

        Some(CycleResult {
            reading,
            previous_state,
            new_state,
        })
    }
}

/// A control loop wired to its feed, actuator and reporter.
#[derive(Debug)]
pub struct FanController<F, A, R> {
    config: ControllerConfig,
    control: ControlLoop,
    feed: F,
    actuator: A,
    reporter: R,
    last_cycle: Option<(CycleResult, u64)>,
    report_failures: u64,
}

impl<F: SensorFeed, A: Actuator, R: Reporter> FanController<F, A, R> {
    pub fn new(
        mut config: ControllerConfig,
        policy: ControlPolicy,
        feed: F,
        actuator: A,
        reporter: R,
    ) -> Self {
        config.sanitize();
        Self {
            config,
            control: ControlLoop::new(policy),
            feed,
            actuator,
            reporter,
            last_cycle: None,
            report_failures: 0,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    pub fn feed_mut(&mut self) -> &mut F {
        &mut self.feed
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn report_failures(&self) -> u64 {
        self.report_failures
    }

    pub fn last_cycle(&self) -> Option<&CycleResult> {
        self.last_cycle.as_ref().map(|(cycle, _)| cycle)
    }

    pub fn pause(&mut self) -> bool {
        let changed = self.control.pause();
        if changed {
            info!("control loop paused, fan held {}", self.control.state().as_str());
        }
        changed
    }

    pub fn resume(&mut self) -> bool {
        let changed = self.control.resume();
        if changed {
            info!("control loop resumed");
        }
        changed
    }

    pub fn set_policy(&mut self, policy: ControlPolicy) -> bool {
        let changed = self.control.set_policy(policy);
        if changed {
            info!("control policy set to {policy}");
        }
        changed
    }

    /// Read, decide, apply, report. Draws nothing while paused.
    pub fn run_cycle(&mut self, now_ms: u64) -> Option<CycleResult> {
        if !self.control.is_running() {
            return None;
        }

        let reading = self.feed.read(now_ms);
        if !reading.valid {
            warn!(
                "sensor fault (raw {}), holding fan {}",
                reading.value_c,
                self.control.state().as_str()
            );
        }

        let cycle = self.control.step(reading)?;
        self.actuator.apply(cycle.new_state);

        if let Err(err) = self.reporter.report(&cycle) {
            self.report_failures = self.report_failures.saturating_add(1);
            warn!("status report failed: {err}");
        }

        self.last_cycle = Some((cycle, now_ms));
        Some(cycle)
    }

    pub fn state_payload(&self) -> FanStatePayload {
        let reading = self.last_cycle().map(|cycle| cycle.reading);
        FanStatePayload {
            temp: reading.filter(|r| r.valid).map(|r| r.value_c),
            valid: reading.is_some_and(|r| r.valid),
            fan: self.control.state().as_str(),
            changed: self.last_cycle().is_some_and(CycleResult::changed),
            cycle: self.control.cycles(),
        }
    }
}

impl<F: SensorFeed, R: Reporter> FanController<F, RelayActuator, R> {
    pub fn status(&self) -> ControllerStatus {
        let reading = self.last_cycle().map(|cycle| cycle.reading);
        ControllerStatus {
            current_temp: reading.filter(|r| r.valid).map(|r| r.value_c),
            sensor_valid: reading.is_some_and(|r| r.valid),
            fan_state: self.control.state().as_str(),
            fan_on: self.control.state().is_on(),
            relay_level: self.actuator.relay_level().as_str(),
            led_level: self.actuator.led_level().map(|level| level.as_str()),
            loop_state: self.control.loop_state().as_str(),
            policy: self.control.policy().to_string(),
            cycles: self.control.cycles(),
            cycle_interval_ms: self.config.cycle_interval_ms,
            last_cycle_ms: self.last_cycle.map(|(_, at)| at),
            status_line: self
                .last_cycle()
                .map(|cycle| status_line(cycle, self.config.status_precision)),
        }
    }
}
