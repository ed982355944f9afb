//! maskwatch turns the per-frame output of a mask detector into a few debounced events
//! (alarm raised, alarm cleared, people entered) and drives the station hardware once
//! per transition.
//!
//! The crate is organized as follows:
//! - [`frame`]: what the perception engine reports for each frame.
//! - [`controller`]: the hysteresis state machine.
//! - [`actuation`]: mapping of the controller events to LED codes, alarm and snapshots.
//! - [`task`]: the traits to implement to plug a collaborator into the station.
//! - [`runtime`]: the run loop.

pub mod actuation;
pub mod clock;
pub mod config;
pub mod controller;
pub mod frame;
pub mod mock;
pub mod runtime;
pub mod task;


pub use maskwatch_traits::{MwError, MwResult, WriteStream};

pub mod prelude {
    pub use crate::actuation::{signal_for, IdlePolicy, SignalCode};
    pub use crate::clock::{partition_key, snapshot_tag, WallClock, WallClockMock};
    pub use crate::config::{ComponentConfig, NodeConfig, StationConfig, Value};
    pub use crate::controller::{ControllerEvent, ControllerState, HysteresisController, Transition};
    pub use crate::frame::{
        FrameImage, FrameSummary, PerceivedFrame, RawFrameSummary, DEFAULT_MASK_SENSITIVITY,
    };
    pub use crate::runtime::{Collaborators, RunPhase, RunReport, StationRuntime, StopSignal};
    pub use crate::task::{
        AudibleAlarm, PerceptionEngine, SignalDriver, SnapshotStore, StationLifecycle,
        StatsRecorder,
    };
    pub use crate::{MwError, MwResult, WriteStream};
}
