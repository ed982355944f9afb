//! People counting statistics.
//!
//! One semicolon separated row per counting step, appended to a file partitioned by calendar day:
//! `<reports_dir>/<YYYY_MM_DD>/stats.csv`. A partition starts with the header row the first time
//! its day is written.

pub mod demographics;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use demographics::{
    Demographic, Demographics, FixedDemographics, PlaceholderDemographics, DEFAULT_AGE_RANGE,
    DEFAULT_SEX_MARKER,
};
use log::{debug, info};
use maskwatch::clock::{WallClock, PARTITION_FORMAT};
use maskwatch::config::{ComponentConfig, DEFAULT_REPORTS_DIR};
use maskwatch::task::{StationLifecycle, StatsRecorder};
use maskwatch::{MwError, MwResult, WriteStream};
use std::fmt::{Display, Formatter};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const STATS_FILE_NAME: &str = "stats.csv";
pub const STATS_HEADER: &str = "Count;Date;Time;Sex;Age";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRow {
    pub count: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub sex: String,
    pub age: u32,
}

impl StatsRow {
    pub fn new(count: u32, at: NaiveDateTime, demographic: Demographic) -> Self {
        Self {
            count,
            date: at.date(),
            time: at.time(),
            sex: demographic.sex,
            age: demographic.age,
        }
    }

    pub fn partition(&self) -> String {
        self.date.format(PARTITION_FORMAT).to_string()
    }
}

impl Display for StatsRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{};{};{};{};{}",
            self.count,
            self.date.format("%Y-%m-%d"),
            self.time.format("%H:%M"),
            self.sex,
            self.age
        )
    }
}

/// Path of the statistics file of a given day.
pub fn partition_path(reports_dir: &Path, date: NaiveDate) -> PathBuf {
    reports_dir
        .join(date.format(PARTITION_FORMAT).to_string())
        .join(STATS_FILE_NAME)
}

#[derive(Debug)]
struct OpenPartition {
    key: String,
    file: File,
}

#[derive(Debug)]
pub struct DailyStatsLog {
    reports_dir: PathBuf,
    demographics: Box<dyn Demographics>,
    current: Option<OpenPartition>,
}

impl DailyStatsLog {
    pub fn new_with(reports_dir: impl Into<PathBuf>, demographics: Box<dyn Demographics>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            demographics,
            current: None,
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    fn open_partition(&mut self, key: &str) -> MwResult<&mut File> {
        let reopen = self.current.as_ref().map_or(true, |p| p.key != key);
        if reopen {
            let dir = self.reports_dir.join(key);
            create_dir_all(&dir).map_err(|e| {
                MwError::log_write(&format!("Could not create {}", dir.display()), e)
            })?;
            let path = dir.join(STATS_FILE_NAME);
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| MwError::log_write(&format!("Could not open {}", path.display()), e))?;
            let empty = file
                .metadata()
                .map_err(|e| MwError::log_write("Could not stat the statistics file", e))?
                .len()
                == 0;
            if empty {
                writeln!(file, "{STATS_HEADER}")
                    .map_err(|e| MwError::log_write("Could not write the header", e))?;
                info!("New statistics partition {}.", path.display());
            }
            self.current = Some(OpenPartition {
                key: key.to_string(),
                file,
            });
        }
        match self.current.as_mut() {
            Some(partition) => Ok(&mut partition.file),
            None => Err(MwError::LogWriteFailure("No open partition".to_string())),
        }
    }
}

fn demographics_from_config(config: &ComponentConfig) -> MwResult<Box<dyn Demographics>> {
    let sex: String = config.get_or("sex", DEFAULT_SEX_MARKER.to_string())?;
    let kind: String = config.get_or("demographics", "placeholder".to_string())?;
    match kind.as_str() {
        "placeholder" => {
            let min_age: u32 = config.get_or("min_age", *DEFAULT_AGE_RANGE.start())?;
            let max_age: u32 = config.get_or("max_age", *DEFAULT_AGE_RANGE.end())?;
            if min_age > max_age {
                return Err(format!("Empty age range {min_age}..={max_age}").into());
            }
            Ok(match config.get::<u64>("seed")? {
                Some(seed) => Box::new(PlaceholderDemographics::with_seed(
                    &sex,
                    min_age..=max_age,
                    seed,
                )),
                None => Box::new(PlaceholderDemographics::new(&sex, min_age..=max_age)),
            })
        }
        "fixed" => Ok(Box::new(FixedDemographics::new(
            &sex,
            config.require("age")?,
        ))),
        other => Err(format!("Unknown demographics provider '{other}'").into()),
    }
}

impl StationLifecycle for DailyStatsLog {
    fn new(config: Option<&ComponentConfig>) -> MwResult<Self> {
        let default = ComponentConfig::new();
        let config = config.unwrap_or(&default);
        let reports_dir: String = config.get_or("reports_dir", DEFAULT_REPORTS_DIR.to_string())?;
        Ok(Self::new_with(reports_dir, demographics_from_config(config)?))
    }

    fn start(&mut self, _clock: &WallClock) -> MwResult<()> {
        debug!("Statistics go to {}.", self.reports_dir.display());
        Ok(())
    }

    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        if let Some(mut partition) = self.current.take() {
            partition
                .file
                .flush()
                .map_err(|e| MwError::log_write("Could not flush the statistics", e))?;
        }
        Ok(())
    }
}

impl WriteStream<StatsRow> for DailyStatsLog {
    fn log(&mut self, row: &StatsRow) -> MwResult<()> {
        let file = self.open_partition(&row.partition())?;
        writeln!(file, "{row}").map_err(|e| MwError::log_write("Could not append a row", e))?;
        file.flush()
            .map_err(|e| MwError::log_write("Could not flush the statistics", e))
    }
}

impl StatsRecorder for DailyStatsLog {
    fn record(&mut self, count_delta: u32, at: NaiveDateTime) -> MwResult<()> {
        let row = StatsRow::new(count_delta, at, self.demographics.estimate());
        self.log(&row)
    }
}
