//! The hysteresis controller turns the noisy stream of frame summaries into
//! a handful of transitions: alarm raised, alarm cleared and newly counted people.
//!
//! The scene is considered changed whenever the person count differs from the
//! previous frame. On a change the alarm is re-evaluated from scratch, so any
//! arrival or departure with a violation in view re-arms the alarm immediately.
//! While the count is stable, only real transitions are reported.
//! Only growth of the person count is counted, there is no tracking of identities.

use crate::frame::{FrameSummary, RawFrameSummary};
use crate::MwResult;
use log::debug;

/// The only persistent state of the decision loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub alarm_active: bool,
    pub last_person_count: u32,
    /// Running total of people ever counted, never decreases.
    pub total_counted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    AlarmRaised,
    AlarmCleared,
    NoChange,
}

/// Outcome of one controller step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerEvent {
    pub transition: Transition,
    /// Newly counted persons for this step, 0 most of the time.
    pub count_delta: u32,
    /// Person count of the frame that produced this event.
    pub person_count: u32,
    /// True if the person count differed from the previous frame.
    pub scene_changed: bool,
    /// Alarm state after the step.
    pub alarm_active: bool,
}

impl ControllerEvent {
    pub fn counted(&self) -> bool {
        self.count_delta > 0
    }

    /// The explicit "nobody is here anymore" outcome of a scene change.
    pub fn is_scene_emptied(&self) -> bool {
        self.transition == Transition::NoChange && self.scene_changed && self.person_count == 0
    }
}

/// Pure decision step.
pub fn transition(state: ControllerState, frame: FrameSummary) -> (ControllerState, ControllerEvent) {
    let faults = frame.violation_count();
    let new_count = frame.person_count();
    let last_count = state.last_person_count;

    let count_delta = new_count.saturating_sub(last_count);
    let scene_changed = new_count != last_count;

    let (alarm_active, transition) = if !scene_changed {
        if faults > 0 && !state.alarm_active {
            (true, Transition::AlarmRaised)
        } else if faults == 0 && new_count > 0 && state.alarm_active {
            (false, Transition::AlarmCleared)
        } else {
            (state.alarm_active, Transition::NoChange)
        }
    } else if faults > 0 {
        (true, Transition::AlarmRaised)
    } else if new_count > 0 {
        (false, Transition::AlarmCleared)
    } else {
        (false, Transition::NoChange)
    };

    let next = ControllerState {
        alarm_active,
        last_person_count: new_count,
        total_counted: state.total_counted.saturating_add(count_delta as u64),
    };
    let event = ControllerEvent {
        transition,
        count_delta,
        person_count: new_count,
        scene_changed,
        alarm_active,
    };
    (next, event)
}

/// Owns the controller state for the whole run, one `step` per frame.
#[derive(Debug, Default)]
pub struct HysteresisController {
    state: ControllerState,
}

impl HysteresisController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn total_counted(&self) -> u64 {
        self.state.total_counted
    }

    pub fn step(&mut self, frame: FrameSummary) -> ControllerEvent {
        let (next, event) = transition(self.state, frame);
        if event.transition != Transition::NoChange || event.counted() {
            debug!(
                "{:?}: {} -> {} person(s), {} violation(s), +{}",
                event.transition,
                self.state.last_person_count,
                frame.person_count(),
                frame.violation_count(),
                event.count_delta
            );
        }
        self.state = next;
        event
    }

    /// Validates the raw summary first, the state is left untouched if it is rejected.
    pub fn step_raw(&mut self, raw: RawFrameSummary) -> MwResult<ControllerEvent> {
        let frame = FrameSummary::try_from(raw)?;
        Ok(self.step(frame))
    }
}
