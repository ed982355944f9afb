//! This module contains the definition of the traits you need to implement
//! to plug an external collaborator (camera pipeline, LED driver, alarm, ...) into the station.

use crate::actuation::SignalCode;
use crate::clock::WallClock;
use crate::config::ComponentConfig;
use crate::frame::{FrameImage, PerceivedFrame};
use crate::MwResult;
use chrono::NaiveDateTime;

/// The StationLifecycle trait is the base trait for all the collaborators of a station.
/// It provides a default empty implementation as all those execution steps are optional.
pub trait StationLifecycle: Send {
    fn new(config: Option<&ComponentConfig>) -> MwResult<Self>
    where
        Self: Sized;

    /// Start is called once before the first frame.
    /// Here you need to acquire everything your component will need for the duration of the run
    /// (open a port, a stream, ...).
    fn start(&mut self, _clock: &WallClock) -> MwResult<()> {
        Ok(())
    }

    /// Called once at the end of the run, whatever the reason of the stop.
    /// It must release the acquired resources and tolerate a previous failed or missing `start`.
    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        Ok(())
    }
}

/// Produces one frame summary per call. It may block, waiting on a camera for example.
/// Any error is considered fatal to the run.
pub trait PerceptionEngine: StationLifecycle {
    fn next_frame(&mut self, clock: &WallClock) -> MwResult<PerceivedFrame>;
}

/// The LED hardware: it accepts one of the three signal codes.
pub trait SignalDriver: StationLifecycle {
    fn send_signal(&mut self, code: SignalCode) -> MwResult<()>;
}

/// Fire and forget audible alarm.
pub trait AudibleAlarm: StationLifecycle {
    fn trigger(&mut self) -> MwResult<()>;
}

/// Keeps a picture of the scene when an alarm is raised.
pub trait SnapshotStore: StationLifecycle {
    fn save(&mut self, image: &FrameImage, taken_at: NaiveDateTime) -> MwResult<()>;
}

/// Persists the people counting events, one record per counting step.
pub trait StatsRecorder: StationLifecycle {
    fn record(&mut self, count_delta: u32, at: NaiveDateTime) -> MwResult<()>;
}
