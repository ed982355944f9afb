//! Wall clock used to date statistics rows, day partitions and snapshots.
//! It can be mocked so a whole station run can be replayed at a fixed date.

use chrono::{Local, NaiveDateTime, TimeDelta};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Directory name of a daily partition, ie. `2024_03_18`.
pub const PARTITION_FORMAT: &str = "%Y_%m_%d";

/// Tag appended to snapshot file names, ie. `2024_03_18_14_02_09`.
pub const SNAPSHOT_TAG_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

pub fn partition_key(at: &NaiveDateTime) -> String {
    at.format(PARTITION_FORMAT).to_string()
}

pub fn snapshot_tag(at: &NaiveDateTime) -> String {
    at.format(SNAPSHOT_TAG_FORMAT).to_string()
}

#[derive(Clone, Debug)]
enum TimeSource {
    Local,
    Mock(Arc<Mutex<NaiveDateTime>>),
}

/// The station wall clock.
/// It is clone resilient, ie a clone will be the same clock, even when mocked.
#[derive(Clone, Debug)]
pub struct WallClock {
    source: TimeSource,
}

/// A mock clock that can be controlled by the user.
#[derive(Clone, Debug)]
pub struct WallClockMock(Arc<Mutex<NaiveDateTime>>);

// A poisoned lock still holds a valid timestamp.
fn lock(time: &Mutex<NaiveDateTime>) -> MutexGuard<'_, NaiveDateTime> {
    time.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WallClockMock {
    pub fn set(&self, value: NaiveDateTime) {
        *lock(&self.0) = value;
    }

    pub fn advance(&self, amount: Duration) {
        let delta = TimeDelta::from_std(amount).unwrap_or(TimeDelta::zero());
        let mut time = lock(&self.0);
        *time += delta;
    }

    pub fn value(&self) -> NaiveDateTime {
        *lock(&self.0)
    }
}

impl WallClock {
    /// Clock following the local time of the station.
    pub fn new() -> Self {
        WallClock {
            source: TimeSource::Local,
        }
    }

    /// Build a fake clock frozen at `start`.
    /// The WallClockMock interface enables you to control all the clones of the clock given.
    pub fn mock(start: NaiveDateTime) -> (Self, WallClockMock) {
        let time = Arc::new(Mutex::new(start));
        (
            WallClock {
                source: TimeSource::Mock(time.clone()),
            },
            WallClockMock(time),
        )
    }

    pub fn now(&self) -> NaiveDateTime {
        match &self.source {
            TimeSource::Local => Local::now().naive_local(),
            TimeSource::Mock(time) => *lock(time),
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.source, TimeSource::Mock(_))
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for WallClock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.now().format("%Y-%m-%d %H:%M:%S"))
    }
}
