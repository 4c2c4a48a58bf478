pub mod actuator;
pub mod config;
pub mod contact;
pub mod control;
pub mod policy;
pub mod report;
pub mod simulation;
pub mod sketch;
pub mod topics;
pub mod types;

pub use actuator::{Actuator, PinLevel, RelayActuator};
pub use config::{
    ControllerConfig, NetworkConfig, RuntimeConfig, SensorRange, SensorSource, SimulationConfig,
    WiringConfig,
};
pub use contact::{
    submit_contact, ContactBackend, ContactError, ContactForm, ContactNotice, ContactRecord,
    ContactSubmission, InMemoryContactBook, NoticeKind,
};
pub use control::{ControlLoop, FanController};
pub use policy::{transition, ConfigurationError, ControlPolicy};
pub use report::{status_line, ReportError, Reporter, TracingReporter, WriterReporter};
pub use simulation::{
    LatestReadingFeed, ScriptedFeed, SensorFeed, SimulatedFeed, StdSimulatedFeed,
};
pub use sketch::render_sketch;
pub use topics::*;
pub use types::{ActuatorState, ControllerStatus, CycleResult, FanStatePayload, LoopState, Reading};
