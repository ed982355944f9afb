//! StationRuntime is the heart of what is running on the station.
//! One frame in, one decision, one actuation out, per iteration, until the stop signal is raised
//! or a collaborator fails for good.

use crate::actuation::{ActuationDispatcher, IdlePolicy};
use crate::clock::WallClock;
use crate::controller::{ControllerEvent, HysteresisController};
use crate::frame::FrameSummary;
use crate::task::{AudibleAlarm, PerceptionEngine, SignalDriver, SnapshotStore, StatsRecorder};
use crate::MwResult;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag, checked once per iteration.
/// Clones share the same flag so it can be handed to a signal handler or a keyboard watcher.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Built, collaborators not started yet.
    Ready,
    Running,
    Stopping,
    /// Terminal.
    Stopped,
}

/// Everything the station talks to.
pub struct Collaborators {
    pub perception: Box<dyn PerceptionEngine>,
    pub led: Box<dyn SignalDriver>,
    pub alarm: Option<Box<dyn AudibleAlarm>>,
    pub snapshots: Option<Box<dyn SnapshotStore>>,
    pub stats: Option<Box<dyn StatsRecorder>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Frames pulled from the perception engine, rejected ones included.
    pub frames: u64,
    pub rejected_frames: u64,
    pub total_counted: u64,
    /// Counting rows lost because the statistics log could not be written.
    pub log_failures: u64,
}

pub struct StationRuntime {
    clock: WallClock,
    controller: HysteresisController,
    perception: Box<dyn PerceptionEngine>,
    actuation: ActuationDispatcher,
    stats: Option<Box<dyn StatsRecorder>>,
    phase: RunPhase,
    started: bool,
    report: RunReport,
}

impl StationRuntime {
    pub fn new(clock: WallClock, collaborators: Collaborators, idle_policy: IdlePolicy) -> Self {
        let Collaborators {
            perception,
            led,
            alarm,
            snapshots,
            stats,
        } = collaborators;
        Self {
            clock,
            controller: HysteresisController::new(),
            perception,
            actuation: ActuationDispatcher::new(led, alarm, snapshots, idle_policy),
            stats,
            phase: RunPhase::Ready,
            started: false,
            report: RunReport::default(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn controller(&self) -> &HysteresisController {
        &self.controller
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            total_counted: self.controller.total_counted(),
            ..self.report
        }
    }

    pub fn start_all_tasks(&mut self) -> MwResult<()> {
        self.started = true;
        self.perception.start(&self.clock)?;
        self.actuation.start_all(&self.clock)?;
        if let Some(stats) = self.stats.as_mut() {
            stats.start(&self.clock)?;
        }
        self.phase = RunPhase::Running;
        Ok(())
    }

    /// Releases every collaborator, even if some of them fail to stop.
    pub fn stop_all_tasks(&mut self) -> MwResult<()> {
        if !self.started {
            self.phase = RunPhase::Stopped;
            return Ok(());
        }
        self.phase = RunPhase::Stopping;
        let mut result = self.perception.stop(&self.clock);
        result = result.and(self.actuation.stop_all(&self.clock));
        if let Some(stats) = self.stats.as_mut() {
            result = result.and(stats.stop(&self.clock));
        }
        self.started = false;
        self.phase = RunPhase::Stopped;
        result
    }

    /// Pulls one frame and handles it.
    /// Returns None if the frame has been rejected, errors are fatal to the run.
    pub fn run_one_iteration(&mut self) -> MwResult<Option<ControllerEvent>> {
        let frame = self.perception.next_frame(&self.clock)?;
        self.report.frames += 1;

        let summary = match FrameSummary::try_from(frame.summary) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Frame #{} dropped: {e}", self.report.frames);
                self.report.rejected_frames += 1;
                return Ok(None);
            }
        };

        let event = self.controller.step(summary);
        let now = self.clock.now();
        self.actuation.dispatch(&event, frame.image.as_ref(), now)?;

        if event.counted() {
            if let Some(stats) = self.stats.as_mut() {
                // A lost row never stops the station, whatever the cause.
                if let Err(e) = stats.record(event.count_delta, now) {
                    warn!("Lost a counting row of {}: {e}", event.count_delta);
                    self.report.log_failures += 1;
                }
            }
        }
        debug!("People counted: {}", self.controller.total_counted());
        Ok(Some(event))
    }

    /// Runs until the stop signal is raised or a collaborator fails.
    /// The collaborators are stopped on every exit path.
    pub fn run(&mut self, stop: &StopSignal) -> MwResult<RunReport> {
        info!("Starting the station at {}.", self.clock);
        let outcome = self.start_all_tasks().and_then(|_| loop {
            if stop.is_raised() {
                info!("Stop requested.");
                break Ok(());
            }
            if let Err(e) = self.run_one_iteration() {
                error!("Station failure: {e}");
                break Err(e);
            }
        });
        let stopped = self.stop_all_tasks();
        if let Err(e) = &stopped {
            warn!("Could not cleanly release the collaborators: {e}");
        }
        outcome?;
        stopped?;
        let report = self.report();
        info!(
            "Station stopped after {} frame(s), {} people counted.",
            report.frames, report.total_counted
        );
        Ok(report)
    }
}

impl Drop for StationRuntime {
    fn drop(&mut self) {
        if self.started {
            if let Err(e) = self.stop_all_tasks() {
                error!("Release on drop failed: {e}");
            }
        }
    }
}
