//! Translation of controller events into hardware effects.
//!
//! Exactly one decision per step: a signal code for the LED driver (or nothing),
//! plus the audible alarm and a snapshot when an alarm is raised.

use crate::clock::WallClock;
use crate::controller::{ControllerEvent, Transition};
use crate::frame::FrameImage;
use crate::task::{AudibleAlarm, SignalDriver, SnapshotStore};
use crate::MwResult;
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The codes understood by the LED microcontroller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SignalCode {
    Idle = 0,
    Clear = 1,
    Fault = 2,
}

impl SignalCode {
    pub fn value(self) -> u8 {
        self as u8
    }

    /// What goes on the wire: the ASCII digit of the code.
    pub fn as_byte(self) -> u8 {
        b'0' + self.value()
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(SignalCode::Idle),
            b'1' => Some(SignalCode::Clear),
            b'2' => Some(SignalCode::Fault),
            _ => None,
        }
    }
}

impl Display for SignalCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SignalCode::Idle => "IDLE",
            SignalCode::Clear => "CLEAR",
            SignalCode::Fault => "FAULT",
        };
        write!(f, "{name}")
    }
}

/// When to send IDLE while nobody is in front of the station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdlePolicy {
    /// Only when the scene just became empty.
    #[default]
    OnTransition,
    /// Also on every steady step with nobody present and no active alarm.
    EveryEmptyStep,
}

/// The signal to send for this event, if any.
pub fn signal_for(event: &ControllerEvent, policy: IdlePolicy) -> Option<SignalCode> {
    match event.transition {
        Transition::AlarmRaised => Some(SignalCode::Fault),
        Transition::AlarmCleared => Some(SignalCode::Clear),
        Transition::NoChange if event.is_scene_emptied() => Some(SignalCode::Idle),
        Transition::NoChange => match policy {
            IdlePolicy::EveryEmptyStep if event.person_count == 0 && !event.alarm_active => {
                Some(SignalCode::Idle)
            }
            _ => None,
        },
    }
}

/// Owns the hardware side of the station.
pub struct ActuationDispatcher {
    driver: Box<dyn SignalDriver>,
    alarm: Option<Box<dyn AudibleAlarm>>,
    snapshots: Option<Box<dyn SnapshotStore>>,
    policy: IdlePolicy,
}

impl ActuationDispatcher {
    pub fn new(
        driver: Box<dyn SignalDriver>,
        alarm: Option<Box<dyn AudibleAlarm>>,
        snapshots: Option<Box<dyn SnapshotStore>>,
        policy: IdlePolicy,
    ) -> Self {
        Self {
            driver,
            alarm,
            snapshots,
            policy,
        }
    }

    pub fn policy(&self) -> IdlePolicy {
        self.policy
    }

    /// Only the LED driver errors are returned, they are fatal to the run.
    /// The alarm and the snapshots are best effort.
    pub fn dispatch(
        &mut self,
        event: &ControllerEvent,
        image: Option<&FrameImage>,
        at: NaiveDateTime,
    ) -> MwResult<Option<SignalCode>> {
        let code = signal_for(event, self.policy);
        if let Some(code) = code {
            debug!("Sending {code} to the LED driver.");
            self.driver.send_signal(code)?;
        }

        if event.transition == Transition::AlarmRaised {
            if let Some(alarm) = self.alarm.as_mut() {
                if let Err(e) = alarm.trigger() {
                    warn!("Audible alarm failed: {e}");
                }
            }
            if let Some(snapshots) = self.snapshots.as_mut() {
                match image {
                    Some(image) => {
                        if let Err(e) = snapshots.save(image, at) {
                            warn!("Snapshot could not be saved: {e}");
                        }
                    }
                    None => debug!("No image attached to the frame, snapshot skipped."),
                }
            }
        }
        Ok(code)
    }

    pub fn start_all(&mut self, clock: &WallClock) -> MwResult<()> {
        self.driver.start(clock)?;
        if let Some(alarm) = self.alarm.as_mut() {
            alarm.start(clock)?;
        }
        if let Some(snapshots) = self.snapshots.as_mut() {
            snapshots.start(clock)?;
        }
        Ok(())
    }

    /// Stops everything even if one of them fails, returns the first error.
    pub fn stop_all(&mut self, clock: &WallClock) -> MwResult<()> {
        let mut result = self.driver.stop(clock);
        if let Some(alarm) = self.alarm.as_mut() {
            result = result.and(alarm.stop(clock));
        }
        if let Some(snapshots) = self.snapshots.as_mut() {
            result = result.and(snapshots.stop(clock));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::HysteresisController;
    use crate::frame::FrameSummary;
    use crate::mock::{Journal, MockAlarm, MockSignalDriver, MockSnapshots};
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 18)
            .unwrap()
            .and_hms_opt(14, 2, 9)
            .unwrap()
    }

    fn codes(frames: &[(u32, u32)], policy: IdlePolicy) -> Vec<Option<SignalCode>> {
        let mut controller = HysteresisController::new();
        frames
            .iter()
            .map(|(p, v)| signal_for(&controller.step(FrameSummary::new(*p, *v)), policy))
            .collect()
    }

    #[test]
    fn test_wire_bytes() {
        assert_eq!(SignalCode::Idle.as_byte(), b'0');
        assert_eq!(SignalCode::Clear.as_byte(), b'1');
        assert_eq!(SignalCode::Fault.as_byte(), b'2');
        assert_eq!(SignalCode::from_byte(b'2'), Some(SignalCode::Fault));
        assert_eq!(SignalCode::from_byte(b'7'), None);
        assert_eq!(SignalCode::Fault.to_string(), "FAULT");
    }

    #[test]
    fn test_idle_only_on_transition() {
        let frames = [(0, 0), (1, 1), (0, 0), (0, 0)];
        assert_eq!(
            codes(&frames, IdlePolicy::OnTransition),
            vec![None, Some(SignalCode::Fault), Some(SignalCode::Idle), None]
        );
    }

    #[test]
    fn test_idle_every_empty_step() {
        let frames = [(0, 0), (1, 1), (0, 0), (0, 0), (2, 0), (2, 0)];
        assert_eq!(
            codes(&frames, IdlePolicy::EveryEmptyStep),
            vec![
                Some(SignalCode::Idle),
                Some(SignalCode::Fault),
                Some(SignalCode::Idle),
                Some(SignalCode::Idle),
                Some(SignalCode::Clear),
                None
            ]
        );
    }

    #[test]
    fn test_steady_presence_is_silent() {
        let frames = [(2, 0), (2, 0), (2, 0)];
        assert_eq!(
            codes(&frames, IdlePolicy::OnTransition),
            vec![Some(SignalCode::Clear), None, None]
        );
    }

    #[test]
    fn test_raise_triggers_alarm_and_snapshot() {
        let journal = Journal::new();
        let mut dispatcher = ActuationDispatcher::new(
            Box::new(MockSignalDriver::with_journal(journal.clone())),
            Some(Box::new(MockAlarm::with_journal(journal.clone()))),
            Some(Box::new(MockSnapshots::with_journal(journal.clone()))),
            IdlePolicy::OnTransition,
        );
        let mut controller = HysteresisController::new();
        let image = FrameImage::new(1, 1, vec![0, 0, 0]);

        let raised = controller.step(FrameSummary::new(1, 1));
        let code = dispatcher.dispatch(&raised, Some(&image), at()).unwrap();
        assert_eq!(code, Some(SignalCode::Fault));
        assert_eq!(
            journal.entries(),
            vec![
                "led.FAULT".to_string(),
                "alarm.trigger".to_string(),
                "snapshot.2024_03_18_14_02_09".to_string()
            ]
        );

        journal.clear();
        let steady = controller.step(FrameSummary::new(1, 1));
        assert_eq!(dispatcher.dispatch(&steady, Some(&image), at()).unwrap(), None);
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn test_best_effort_side_effects() {
        let journal = Journal::new();
        let mut dispatcher = ActuationDispatcher::new(
            Box::new(MockSignalDriver::with_journal(journal.clone())),
            Some(Box::new(MockAlarm::failing(journal.clone()))),
            Some(Box::new(MockSnapshots::failing(journal.clone()))),
            IdlePolicy::OnTransition,
        );
        let event = HysteresisController::new().step(FrameSummary::new(1, 1));
        let image = FrameImage::new(1, 1, vec![0, 0, 0]);
        assert_eq!(
            dispatcher.dispatch(&event, Some(&image), at()).unwrap(),
            Some(SignalCode::Fault)
        );
    }

    #[test]
    fn test_driver_failure_is_returned() {
        let journal = Journal::new();
        let mut dispatcher = ActuationDispatcher::new(
            Box::new(MockSignalDriver::failing(journal.clone())),
            Some(Box::new(MockAlarm::with_journal(journal.clone()))),
            None,
            IdlePolicy::OnTransition,
        );
        let event = HysteresisController::new().step(FrameSummary::new(1, 1));
        let err = dispatcher.dispatch(&event, None, at()).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(journal.count("alarm.trigger"), 0);
    }
}
