//! Sex and age attached to each counting row.
//!
//! The station has no demographic classifier wired in: the default provider fills the row with a
//! fixed sex marker and a random plausible age, as the historical reports did.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Debug;
use std::ops::RangeInclusive;

pub const DEFAULT_SEX_MARKER: &str = "M";
pub const DEFAULT_AGE_RANGE: RangeInclusive<u32> = 15..=60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demographic {
    pub sex: String,
    pub age: u32,
}

pub trait Demographics: Send + Debug {
    fn estimate(&mut self) -> Demographic;
}

/// Fixed sex marker, uniformly random age.
#[derive(Debug)]
pub struct PlaceholderDemographics {
    sex: String,
    ages: RangeInclusive<u32>,
    rng: StdRng,
}

impl PlaceholderDemographics {
    pub fn new(sex: &str, ages: RangeInclusive<u32>) -> Self {
        Self {
            sex: sex.to_string(),
            ages,
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible ages, for tests and replays.
    pub fn with_seed(sex: &str, ages: RangeInclusive<u32>, seed: u64) -> Self {
        Self {
            sex: sex.to_string(),
            ages,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for PlaceholderDemographics {
    fn default() -> Self {
        Self::new(DEFAULT_SEX_MARKER, DEFAULT_AGE_RANGE)
    }
}

impl Demographics for PlaceholderDemographics {
    fn estimate(&mut self) -> Demographic {
        Demographic {
            sex: self.sex.clone(),
            age: self.rng.gen_range(self.ages.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixedDemographics(pub Demographic);

impl FixedDemographics {
    pub fn new(sex: &str, age: u32) -> Self {
        Self(Demographic {
            sex: sex.to_string(),
            age,
        })
    }
}

impl Demographics for FixedDemographics {
    fn estimate(&mut self) -> Demographic {
        self.0.clone()
    }
}
