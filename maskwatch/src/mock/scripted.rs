use super::Journal;
use crate::clock::{snapshot_tag, WallClock};
use crate::config::ComponentConfig;
use crate::frame::{FrameImage, PerceivedFrame, RawFrameSummary};
use crate::runtime::StopSignal;
use crate::task::{AudibleAlarm, PerceptionEngine, SnapshotStore, StationLifecycle, StatsRecorder};
use crate::{MwError, MwResult};
use chrono::NaiveDateTime;
use std::collections::VecDeque;

/// Plays a fixed list of frames then either raises the stop signal or fails like a lost camera.
pub struct ScriptedPerception {
    frames: VecDeque<PerceivedFrame>,
    journal: Journal,
    stop_when_done: Option<StopSignal>,
}

impl ScriptedPerception {
    pub fn new(frames: Vec<PerceivedFrame>, journal: Journal) -> Self {
        Self {
            frames: frames.into(),
            journal,
            stop_when_done: None,
        }
    }

    pub fn from_counts(counts: &[(i64, i64)], journal: Journal) -> Self {
        let frames = counts
            .iter()
            .map(|(p, v)| PerceivedFrame::from_summary(RawFrameSummary::new(*p, *v)))
            .collect();
        Self::new(frames, journal)
    }

    /// Raise this stop signal along with the last frame instead of failing afterwards.
    pub fn stop_when_done(mut self, stop: StopSignal) -> Self {
        self.stop_when_done = Some(stop);
        self
    }
}

impl StationLifecycle for ScriptedPerception {
    fn new(_config: Option<&ComponentConfig>) -> MwResult<Self> {
        Ok(Self::new(Vec::new(), Journal::new()))
    }

    fn start(&mut self, _clock: &WallClock) -> MwResult<()> {
        self.journal.push("perception.start");
        Ok(())
    }

    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        self.journal.push("perception.stop");
        Ok(())
    }
}

impl PerceptionEngine for ScriptedPerception {
    fn next_frame(&mut self, _clock: &WallClock) -> MwResult<PerceivedFrame> {
        let frame = self
            .frames
            .pop_front()
            .ok_or_else(|| MwError::collaborator("perception", "script exhausted"))?;
        if self.frames.is_empty() {
            if let Some(stop) = &self.stop_when_done {
                stop.raise();
            }
        }
        Ok(frame)
    }
}

pub struct MockAlarm {
    journal: Journal,
    fail: bool,
}

impl MockAlarm {
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            fail: false,
        }
    }

    pub fn failing(journal: Journal) -> Self {
        Self {
            journal,
            fail: true,
        }
    }
}

impl StationLifecycle for MockAlarm {
    fn new(_config: Option<&ComponentConfig>) -> MwResult<Self> {
        Ok(Self::with_journal(Journal::new()))
    }

    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        self.journal.push("alarm.stop");
        Ok(())
    }
}

impl AudibleAlarm for MockAlarm {
    fn trigger(&mut self) -> MwResult<()> {
        if self.fail {
            return Err(MwError::collaborator("alarm", "no audio device"));
        }
        self.journal.push("alarm.trigger");
        Ok(())
    }
}

pub struct MockSnapshots {
    journal: Journal,
    fail: bool,
}

impl MockSnapshots {
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            fail: false,
        }
    }

    pub fn failing(journal: Journal) -> Self {
        Self {
            journal,
            fail: true,
        }
    }
}

impl StationLifecycle for MockSnapshots {
    fn new(_config: Option<&ComponentConfig>) -> MwResult<Self> {
        Ok(Self::with_journal(Journal::new()))
    }
}

impl SnapshotStore for MockSnapshots {
    fn save(&mut self, _image: &FrameImage, taken_at: NaiveDateTime) -> MwResult<()> {
        if self.fail {
            return Err(MwError::collaborator("snapshots", "read-only filesystem"));
        }
        self.journal
            .push(format!("snapshot.{}", snapshot_tag(&taken_at)));
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StatsFailure {
    DiskFull,
    Unreachable,
}

pub struct MockStats {
    journal: Journal,
    failure: Option<StatsFailure>,
}

impl MockStats {
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            failure: None,
        }
    }

    /// Every write fails as a full disk would.
    pub fn failing(journal: Journal) -> Self {
        Self {
            journal,
            failure: Some(StatsFailure::DiskFull),
        }
    }

    /// Every write fails as an unreachable remote store would.
    pub fn unreachable(journal: Journal) -> Self {
        Self {
            journal,
            failure: Some(StatsFailure::Unreachable),
        }
    }
}

impl StationLifecycle for MockStats {
    fn new(_config: Option<&ComponentConfig>) -> MwResult<Self> {
        Ok(Self::with_journal(Journal::new()))
    }

    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        self.journal.push("stats.stop");
        Ok(())
    }
}

impl StatsRecorder for MockStats {
    fn record(&mut self, count_delta: u32, _at: NaiveDateTime) -> MwResult<()> {
        match self.failure {
            Some(StatsFailure::DiskFull) => {
                return Err(MwError::LogWriteFailure("disk full".to_string()))
            }
            Some(StatsFailure::Unreachable) => {
                return Err(MwError::collaborator("stats", "connection refused"))
            }
            None => {}
        }
        self.journal.push(format!("stats.{count_delta}"));
        Ok(())
    }
}
