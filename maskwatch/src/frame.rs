//! Per-frame detection summaries, the only input of the decision loop.

use crate::{MwError, MwResult};
use serde::{Deserialize, Serialize};

/// Above this "no mask" probability a face is counted as a violation.
pub const DEFAULT_MASK_SENSITIVITY: f32 = 0.8;

fn saturating_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// What a perception engine reports for one frame, before any validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrameSummary {
    pub person_count: i64,
    pub violation_count: i64,
}

impl RawFrameSummary {
    pub fn new(person_count: i64, violation_count: i64) -> Self {
        Self {
            person_count,
            violation_count,
        }
    }
}

/// A validated frame summary.
///
/// `violation_count` is a count of faults only, it is never assumed to be bounded by
/// `person_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    person_count: u32,
    violation_count: u32,
}

impl FrameSummary {
    pub fn new(person_count: u32, violation_count: u32) -> Self {
        Self {
            person_count,
            violation_count,
        }
    }

    /// Reduce the per face "no mask" probabilities of a frame to a summary.
    pub fn from_mask_scores(no_mask_scores: &[f32], sensitivity: f32) -> Self {
        let violation_count = no_mask_scores
            .iter()
            .filter(|score| **score > sensitivity)
            .count();
        Self {
            person_count: saturating_count(no_mask_scores.len()),
            violation_count: saturating_count(violation_count),
        }
    }

    pub fn person_count(&self) -> u32 {
        self.person_count
    }

    pub fn violation_count(&self) -> u32 {
        self.violation_count
    }

    pub fn has_faults(&self) -> bool {
        self.violation_count > 0
    }
}

impl TryFrom<RawFrameSummary> for FrameSummary {
    type Error = MwError;

    fn try_from(raw: RawFrameSummary) -> MwResult<Self> {
        let invalid = || MwError::InvalidFrameSummary {
            person_count: raw.person_count,
            violation_count: raw.violation_count,
        };
        let person_count = u32::try_from(raw.person_count).map_err(|_| invalid())?;
        let violation_count = u32::try_from(raw.violation_count).map_err(|_| invalid())?;
        Ok(Self::new(person_count, violation_count))
    }
}

impl From<FrameSummary> for RawFrameSummary {
    fn from(summary: FrameSummary) -> Self {
        RawFrameSummary::new(
            summary.person_count as i64,
            summary.violation_count as i64,
        )
    }
}

/// Packed RGB8 picture of the frame, kept for snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl FrameImage {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Self {
        Self { width, height, rgb }
    }

    pub fn is_consistent(&self) -> bool {
        self.rgb.len() == (self.width as usize) * (self.height as usize) * 3
    }
}

/// One acquisition from the perception engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceivedFrame {
    pub summary: RawFrameSummary,
    pub image: Option<FrameImage>,
}

impl PerceivedFrame {
    pub fn from_summary(summary: RawFrameSummary) -> Self {
        Self {
            summary,
            image: None,
        }
    }

    pub fn with_image(mut self, image: FrameImage) -> Self {
        self.image = Some(image);
        self
    }
}
