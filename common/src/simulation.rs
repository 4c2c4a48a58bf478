use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::{SensorRange, SimulationConfig},
    types::Reading,
};

/// Source of one reading per control cycle.
pub trait SensorFeed {
    fn read(&mut self, now_ms: u64) -> Reading;
}

impl<F: SensorFeed + ?Sized> SensorFeed for Box<F> {
    fn read(&mut self, now_ms: u64) -> Reading {
        (**self).read(now_ms)
    }
}

pub type StdSimulatedFeed = SimulatedFeed<StdRng>;

/// Bounded random walk: each step adds a uniform perturbation in
/// `[-step_c, +step_c]` and clamps into `[min_c, max_c]`.
#[derive(Debug, Clone)]
pub struct SimulatedFeed<R> {
    config: SimulationConfig,
    current_c: f32,
    rng: R,
}

impl SimulatedFeed<StdRng> {
    pub fn seeded(config: SimulationConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(config: SimulationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Seeded when the config pins a seed, entropy-backed otherwise.
    pub fn from_config(config: SimulationConfig) -> Self {
        match config.seed {
            Some(seed) => Self::seeded(config, seed),
            None => Self::from_entropy(config),
        }
    }
}

impl<R: Rng> SimulatedFeed<R> {
    pub fn with_rng(mut config: SimulationConfig, rng: R) -> Self {
        config.sanitize();
        Self {
            current_c: config.start_c,
            config,
            rng,
        }
    }

    pub fn current_c(&self) -> f32 {
        self.current_c
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Back to the start value. The random source keeps its position.
    pub fn restart(&mut self) {
        self.current_c = self.config.start_c;
    }

    pub fn advance(&mut self) -> Reading {
        let step = self.config.step_c;
        let delta = if step > 0.0 {
            self.rng.gen_range(-step..=step)
        } else {
            0.0
        };
        self.current_c = (self.current_c + delta).clamp(self.config.min_c, self.config.max_c);
        Reading::valid(self.current_c)
    }
}

impl<R: Rng> SensorFeed for SimulatedFeed<R> {
    fn read(&mut self, _now_ms: u64) -> Reading {
        self.advance()
    }
}

impl<R: Rng> Iterator for SimulatedFeed<R> {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        Some(self.advance())
    }
}

/// Feed backed by samples pushed from elsewhere (e.g. an MQTT subscription).
///
/// No sample yet, or a sample older than the stale timeout, reads as a fault.
#[derive(Debug, Clone)]
pub struct LatestReadingFeed {
    range: SensorRange,
    stale_after_ms: u64,
    latest: Option<(f32, u64)>,
}

impl LatestReadingFeed {
    pub fn new(range: SensorRange, stale_after_ms: u64) -> Self {
        Self {
            range,
            stale_after_ms,
            latest: None,
        }
    }

    pub fn push(&mut self, raw_c: f32, now_ms: u64) {
        self.latest = Some((raw_c, now_ms));
    }

    pub fn last_update_ms(&self) -> Option<u64> {
        self.latest.map(|(_, at)| at)
    }
}

impl SensorFeed for LatestReadingFeed {
    fn read(&mut self, now_ms: u64) -> Reading {
        match self.latest {
            None => Reading::invalid(f32::NAN),
            Some((raw, at)) if now_ms.saturating_sub(at) >= self.stale_after_ms => {
                Reading::invalid(raw)
            }
            Some((raw, _)) => Reading::from_sensor(raw, &self.range),
        }
    }
}

/// Replays a fixed list, then keeps returning the last entry.
#[derive(Debug, Clone)]
pub struct ScriptedFeed {
    readings: Vec<Reading>,
    index: usize,
}

impl ScriptedFeed {
    pub fn new(readings: Vec<Reading>) -> Self {
        Self { readings, index: 0 }
    }

    pub fn from_values(values: &[f32]) -> Self {
        Self::new(values.iter().copied().map(Reading::valid).collect())
    }

    pub fn drawn(&self) -> usize {
        self.index
    }
}

impl SensorFeed for ScriptedFeed {
    fn read(&mut self, _now_ms: u64) -> Reading {
        let reading = match self.readings.get(self.index) {
            Some(reading) => *reading,
            None => self
                .readings
                .last()
                .copied()
                .unwrap_or(Reading::invalid(f32::NAN)),
        };
        self.index = self.index.saturating_add(1);
        reading
    }
}
