//! Saves the scene as a JPEG when an alarm is raised:
//! `<reports_dir>/<YYYY_MM_DD>/file_<YYYY_MM_DD_HH_MM_SS>.jpg`.

use chrono::NaiveDateTime;
use image::{ImageFormat, RgbImage};
use log::{debug, info};
use maskwatch::clock::{partition_key, snapshot_tag, WallClock};
use maskwatch::config::{ComponentConfig, DEFAULT_REPORTS_DIR};
use maskwatch::frame::FrameImage;
use maskwatch::task::{SnapshotStore, StationLifecycle};
use maskwatch::{MwError, MwResult};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

pub fn snapshot_path(reports_dir: &Path, taken_at: &NaiveDateTime) -> PathBuf {
    reports_dir
        .join(partition_key(taken_at))
        .join(format!("file_{}.jpg", snapshot_tag(taken_at)))
}

#[derive(Debug)]
pub struct DirSnapshotStore {
    reports_dir: PathBuf,
    saved: u64,
}

impl DirSnapshotStore {
    pub fn in_dir(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            saved: 0,
        }
    }

    pub fn saved(&self) -> u64 {
        self.saved
    }
}

impl StationLifecycle for DirSnapshotStore {
    fn new(config: Option<&ComponentConfig>) -> MwResult<Self>
    where
        Self: Sized,
    {
        let default = ComponentConfig::new();
        let config = config.unwrap_or(&default);
        let reports_dir: String = config.get_or("reports_dir", DEFAULT_REPORTS_DIR.to_string())?;
        Ok(Self::in_dir(reports_dir))
    }

    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        if self.saved > 0 {
            info!("{} snapshot(s) saved under {}.", self.saved, self.reports_dir.display());
        }
        Ok(())
    }
}

impl SnapshotStore for DirSnapshotStore {
    fn save(&mut self, image: &FrameImage, taken_at: NaiveDateTime) -> MwResult<()> {
        let buffer = RgbImage::from_raw(image.width, image.height, image.rgb.clone())
            .ok_or_else(|| {
                MwError::collaborator(
                    "snapshot store",
                    &format!(
                        "{} bytes do not make a {}x{} RGB image",
                        image.rgb.len(),
                        image.width,
                        image.height
                    ),
                )
            })?;
        let path = snapshot_path(&self.reports_dir, &taken_at);
        if let Some(dir) = path.parent() {
            create_dir_all(dir).map_err(|e| {
                MwError::collaborator_with_cause(
                    "snapshot store",
                    &format!("Could not create {}", dir.display()),
                    e,
                )
            })?;
        }
        buffer
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|e| {
                MwError::collaborator_with_cause(
                    "snapshot store",
                    &format!("Could not write {}", path.display()),
                    e,
                )
            })?;
        self.saved += 1;
        debug!("Snapshot {}", path.display());
        Ok(())
    }
}
