//! In-memory collaborators for tests and dry runs.
//! They all write what they are asked to do in a shared `Journal`, ie. `led.FAULT`,
//! `alarm.trigger`, `stats.2`, `perception.stop`, so the order of the effects can be checked.
//!
//! Only [`MockSignalDriver`] is part of the regular build, for stations without a LED board.
//! The other collaborators need the `mock` feature.

use crate::actuation::SignalCode;
use crate::clock::WallClock;
use crate::config::ComponentConfig;
use crate::task::{SignalDriver, StationLifecycle};
use crate::{MwError, MwResult};
use log::info;
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(any(test, feature = "mock"))]
mod scripted;
#[cfg(any(test, feature = "mock"))]
pub use scripted::{MockAlarm, MockSnapshots, MockStats, ScriptedPerception};

#[derive(Clone, Debug, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.lock().iter().filter(|e| e.as_str() == entry).count()
    }

    /// Entries starting with the given component prefix, ie. `led.`.
    pub fn of(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Records the codes instead of lighting LEDs.
pub struct MockSignalDriver {
    journal: Journal,
    fail: bool,
}

impl MockSignalDriver {
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            fail: false,
        }
    }

    #[cfg(any(test, feature = "mock"))]
    pub fn failing(journal: Journal) -> Self {
        Self {
            journal,
            fail: true,
        }
    }
}

impl StationLifecycle for MockSignalDriver {
    fn new(_config: Option<&ComponentConfig>) -> MwResult<Self> {
        Ok(Self::with_journal(Journal::new()))
    }

    fn start(&mut self, _clock: &WallClock) -> MwResult<()> {
        self.journal.push("led.start");
        Ok(())
    }

    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        self.journal.push("led.stop");
        Ok(())
    }
}

impl SignalDriver for MockSignalDriver {
    fn send_signal(&mut self, code: SignalCode) -> MwResult<()> {
        if self.fail {
            return Err(MwError::collaborator("led driver", "device disconnected"));
        }
        info!("Would send {code} to the LEDs.");
        self.journal.push(format!("led.{code}"));
        Ok(())
    }
}
