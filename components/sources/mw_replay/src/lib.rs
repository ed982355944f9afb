//! Perception engines fed by already computed detections.
//!
//! - [`ReplayPerception`] plays a recorded RON script of frames, handy for demos and bench tests.
//! - [`StreamPerception`] reads one record per line from a pipe, a FIFO or stdin, so an external
//!   detector process can drive the station.
//!
//! A record either carries the counts directly or the "no mask" probability of every detected face,
//! optionally with the picture of the scene (a JPEG) used for the snapshot when an alarm is raised:
//! ```text
//! Counts(persons: 2, violations: 1)
//! Counts(persons: 2, violations: 1, image: "frames/0042.jpg")
//! Faces([0.12, 0.97])
//! Detections(faces: [0.12, 0.97], image: "frames/0043.jpg")
//! ```
//! Relative image paths are resolved from the directory of the script, or from `image_dir` for a
//! stream.

use log::{debug, info, warn};
use maskwatch::clock::WallClock;
use maskwatch::config::ComponentConfig;
use maskwatch::frame::{
    FrameImage, FrameSummary, PerceivedFrame, RawFrameSummary, DEFAULT_MASK_SENSITIVITY,
};
use maskwatch::task::{PerceptionEngine, StationLifecycle};
use maskwatch::{MwError, MwResult};
use ron::extensions::Extensions;
use ron::Options;
use serde::{Deserialize, Serialize};
use std::fs::{read_to_string, File};
use std::io::{stdin, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum FrameRecord {
    Counts {
        persons: i64,
        violations: i64,
        #[serde(default)]
        image: Option<PathBuf>,
    },
    Faces(Vec<f32>),
    Detections {
        faces: Vec<f32>,
        #[serde(default)]
        image: Option<PathBuf>,
    },
}

impl FrameRecord {
    pub fn to_summary(&self, sensitivity: f32) -> RawFrameSummary {
        match self {
            FrameRecord::Counts {
                persons,
                violations,
                ..
            } => RawFrameSummary::new(*persons, *violations),
            FrameRecord::Faces(scores) | FrameRecord::Detections { faces: scores, .. } => {
                FrameSummary::from_mask_scores(scores, sensitivity).into()
            }
        }
    }

    pub fn image_path(&self) -> Option<&Path> {
        match self {
            FrameRecord::Counts { image, .. } | FrameRecord::Detections { image, .. } => {
                image.as_deref()
            }
            FrameRecord::Faces(_) => None,
        }
    }

    /// The summary, with the picture attached when the record names one.
    /// A picture that cannot be read only costs the snapshot, the detections still count.
    pub fn to_frame(&self, sensitivity: f32, image_dir: Option<&Path>) -> PerceivedFrame {
        let frame = PerceivedFrame::from_summary(self.to_summary(sensitivity));
        let Some(path) = self.image_path() else {
            return frame;
        };
        let path = match image_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        match load_image(&path) {
            Ok(image) => frame.with_image(image),
            Err(e) => {
                warn!("{e}");
                frame
            }
        }
    }
}

/// Decodes a picture into the packed RGB8 layout of the snapshots.
pub fn load_image(path: &Path) -> MwResult<FrameImage> {
    let decoded = image::open(path).map_err(|e| {
        MwError::collaborator_with_cause(
            "perception",
            &format!("Could not decode {}", path.display()),
            e,
        )
    })?;
    let rgb = decoded.to_rgb8();
    Ok(FrameImage::new(rgb.width(), rgb.height(), rgb.into_raw()))
}

fn ron_options() -> Options {
    Options::default().with_default_extension(Extensions::IMPLICIT_SOME)
}

pub fn parse_script(script: &str) -> MwResult<Vec<FrameRecord>> {
    ron_options()
        .from_str(script)
        .map_err(|e| MwError::config_with_cause("Invalid frame script", e))
}

pub fn parse_record(line: &str) -> MwResult<FrameRecord> {
    ron_options()
        .from_str(line)
        .map_err(|e| MwError::config_with_cause("Invalid frame record", e))
}

fn sensitivity_from(config: &ComponentConfig) -> MwResult<f32> {
    let sensitivity: f64 = config.get_or("sensitivity", DEFAULT_MASK_SENSITIVITY as f64)?;
    if !(0.0..=1.0).contains(&sensitivity) {
        return Err(format!("Sensitivity {sensitivity} is not a probability").into());
    }
    Ok(sensitivity as f32)
}

/// Plays a list of frames, optionally in a loop and at a fixed rate.
pub struct ReplayPerception {
    frames: Vec<FrameRecord>,
    image_dir: Option<PathBuf>,
    cursor: usize,
    looping: bool,
    period: Option<Duration>,
    sensitivity: f32,
}

impl ReplayPerception {
    pub fn from_records(frames: Vec<FrameRecord>, sensitivity: f32) -> Self {
        Self {
            frames,
            image_dir: None,
            cursor: 0,
            looping: false,
            period: None,
            sensitivity,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Directory relative image paths are resolved from.
    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = Some(dir.into());
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }
}

impl StationLifecycle for ReplayPerception {
    fn new(config: Option<&ComponentConfig>) -> MwResult<Self> {
        let config = config.ok_or("ReplayPerception needs a config with a 'path' to a frame script")?;
        let path: String = config.require("path")?;
        let script = read_to_string(&path)
            .map_err(|e| MwError::config_with_cause(&format!("Could not read {path}"), e))?;
        let frames = parse_script(&script)?;
        if frames.is_empty() {
            return Err(format!("The frame script {path} is empty").into());
        }
        let period_ms: u64 = config.get_or("period_ms", 0)?;
        info!("Replaying {} frame(s) from {path}.", frames.len());
        Ok(Self {
            frames,
            image_dir: Path::new(&path).parent().map(Path::to_path_buf),
            cursor: 0,
            looping: config.get_or("loop", false)?,
            period: (period_ms > 0).then(|| Duration::from_millis(period_ms)),
            sensitivity: sensitivity_from(config)?,
        })
    }
}

impl PerceptionEngine for ReplayPerception {
    fn next_frame(&mut self, _clock: &WallClock) -> MwResult<PerceivedFrame> {
        if self.cursor >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return Err(MwError::collaborator("replay perception", "end of the script"));
            }
            self.cursor = 0;
        }
        if let Some(period) = self.period {
            sleep(period);
        }
        let record = &self.frames[self.cursor];
        self.cursor += 1;
        Ok(record.to_frame(self.sensitivity, self.image_dir.as_deref()))
    }
}

/// Reads one record per line, blocking until the detector writes the next one.
/// Blank lines and lines starting with `#` are ignored, unreadable ones are skipped.
pub struct StreamPerception {
    path: Option<PathBuf>,
    image_dir: Option<PathBuf>,
    reader: Option<Box<dyn BufRead + Send>>,
    sensitivity: f32,
    line_no: u64,
}

impl StreamPerception {
    pub fn from_reader(reader: impl BufRead + Send + 'static, sensitivity: f32) -> Self {
        Self {
            path: None,
            image_dir: None,
            reader: Some(Box::new(reader)),
            sensitivity,
            line_no: 0,
        }
    }

    pub fn reads_stdin(&self) -> bool {
        self.path.is_none()
    }
}

impl StationLifecycle for StreamPerception {
    fn new(config: Option<&ComponentConfig>) -> MwResult<Self> {
        let default = ComponentConfig::new();
        let config = config.unwrap_or(&default);
        let path: Option<String> = config.get("path")?;
        let image_dir: Option<String> = config.get("image_dir")?;
        Ok(Self {
            path: path.map(PathBuf::from),
            image_dir: image_dir.map(PathBuf::from),
            reader: None,
            sensitivity: sensitivity_from(config)?,
            line_no: 0,
        })
    }

    fn start(&mut self, _clock: &WallClock) -> MwResult<()> {
        if self.reader.is_some() {
            return Ok(());
        }
        let reader: Box<dyn BufRead + Send> = match &self.path {
            Some(path) => {
                let file = File::open(path).map_err(|e| {
                    MwError::collaborator_with_cause(
                        "stream perception",
                        &format!("Could not open {}", path.display()),
                        e,
                    )
                })?;
                info!("Reading detections from {}.", path.display());
                Box::new(BufReader::new(file))
            }
            None => {
                info!("Reading detections from stdin.");
                Box::new(BufReader::new(stdin()))
            }
        };
        self.reader = Some(reader);
        Ok(())
    }

    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        self.reader = None;
        Ok(())
    }
}

impl PerceptionEngine for StreamPerception {
    fn next_frame(&mut self, _clock: &WallClock) -> MwResult<PerceivedFrame> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| MwError::collaborator("stream perception", "not started"))?;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line).map_err(|e| {
                MwError::collaborator_with_cause("stream perception", "read failed", e)
            })?;
            if read == 0 {
                return Err(MwError::collaborator("stream perception", "stream closed"));
            }
            self.line_no += 1;
            let record = line.trim();
            if record.is_empty() || record.starts_with('#') {
                continue;
            }
            match parse_record(record) {
                Ok(record) => {
                    debug!("Line {}: {:?}", self.line_no, record);
                    return Ok(record.to_frame(self.sensitivity, self.image_dir.as_deref()));
                }
                Err(e) => warn!("Skipping unreadable line {}: {e}", self.line_no),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn summaries(engine: &mut dyn PerceptionEngine, n: usize) -> Vec<RawFrameSummary> {
        let clock = WallClock::new();
        (0..n)
            .map(|_| engine.next_frame(&clock).unwrap().summary)
            .collect()
    }

    #[test]
    fn test_parse_script() {
        let frames = parse_script(
            "[Counts(persons: 0, violations: 0), Faces([0.1, 0.95]), Counts(persons: -1, violations: 0)]",
        )
        .unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].to_summary(0.8), RawFrameSummary::new(2, 1));
        // Validation is the controller's business, negative counts go through.
        assert_eq!(frames[2].to_summary(0.8), RawFrameSummary::new(-1, 0));
        assert!(parse_script("[Counts(persons: 1)]").is_err());
    }

    #[test]
    fn test_replay_ends() {
        let mut replay = ReplayPerception::from_records(
            vec![FrameRecord::Counts {
                persons: 1,
                violations: 1,
                image: None,
            }],
            0.8,
        );
        let clock = WallClock::new();
        assert!(replay.next_frame(&clock).is_ok());
        assert_eq!(replay.remaining(), 0);
        let err = replay.next_frame(&clock).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_replay_loops() {
        let mut replay = ReplayPerception::from_records(
            vec![
                FrameRecord::Counts {
                    persons: 1,
                    violations: 0,
                    image: None,
                },
                FrameRecord::Faces(vec![0.9]),
            ],
            0.5,
        )
        .looping(true);
        assert_eq!(
            summaries(&mut replay, 4),
            vec![
                RawFrameSummary::new(1, 0),
                RawFrameSummary::new(1, 1),
                RawFrameSummary::new(1, 0),
                RawFrameSummary::new(1, 1)
            ]
        );
    }

    #[test]
    fn test_replay_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("frames.ron");
        std::fs::write(&path, "[Counts(persons: 3, violations: 1)]").unwrap();
        let mut config = ComponentConfig::new();
        config.set("path", path.to_string_lossy().to_string());
        config.set("loop", true);
        let mut replay = ReplayPerception::new(Some(&config)).unwrap();
        assert_eq!(
            summaries(&mut replay, 2),
            vec![RawFrameSummary::new(3, 1); 2]
        );

        config.set("sensitivity", 1.5);
        assert!(ReplayPerception::new(Some(&config)).is_err());
        assert!(ReplayPerception::new(None).is_err());
    }

    #[test]
    fn test_stream_skips_noise() {
        let input = "# detector v2\n\nCounts(persons: 1, violations: 0)\ngarbage\nFaces([0.99, 0.2, 0.85])\n";
        let mut stream = StreamPerception::from_reader(Cursor::new(input.to_string()), 0.8);
        assert_eq!(
            summaries(&mut stream, 2),
            vec![RawFrameSummary::new(1, 0), RawFrameSummary::new(3, 2)]
        );
        let err = stream.next_frame(&WallClock::new()).unwrap_err();
        assert!(matches!(err, MwError::CollaboratorUnavailable { .. }));
    }

    #[test]
    fn test_stream_needs_start() {
        let mut config = ComponentConfig::new();
        config.set("path", "/nonexistent/detections.fifo");
        let mut stream = StreamPerception::new(Some(&config)).unwrap();
        assert!(!stream.reads_stdin());
        let clock = WallClock::new();
        assert!(stream.next_frame(&clock).is_err());
        assert!(stream.start(&clock).is_err());
    }

    fn write_jpeg(path: &Path, width: u32, height: u32) {
        image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_replay_attaches_scene_picture() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_jpeg(&tmp.path().join("scene.jpg"), 8, 6);
        let path = tmp.path().join("frames.ron");
        std::fs::write(
            &path,
            r#"[
                Counts(persons: 1, violations: 1, image: "scene.jpg"),
                Detections(faces: [0.99], image: "scene.jpg"),
                Detections(faces: [0.99]),
                Faces([0.99]),
            ]"#,
        )
        .unwrap();
        let mut config = ComponentConfig::new();
        config.set("path", path.to_string_lossy().to_string());
        let mut replay = ReplayPerception::new(Some(&config)).unwrap();
        let clock = WallClock::new();

        for _ in 0..2 {
            let frame = replay.next_frame(&clock).unwrap();
            assert_eq!(frame.summary, RawFrameSummary::new(1, 1));
            let image = frame.image.expect("the record names a picture");
            assert_eq!((image.width, image.height), (8, 6));
            assert!(image.is_consistent());
        }
        for _ in 0..2 {
            assert!(replay.next_frame(&clock).unwrap().image.is_none());
        }
    }

    #[test]
    fn test_stream_attaches_scene_picture() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_jpeg(&tmp.path().join("0001.jpg"), 4, 4);
        let input = "Detections(faces: [0.99], image: \"0001.jpg\")\n";
        let mut stream = StreamPerception::from_reader(Cursor::new(input.to_string()), 0.8);
        stream.image_dir = Some(tmp.path().to_path_buf());
        let frame = stream.next_frame(&WallClock::new()).unwrap();
        assert_eq!(frame.summary, RawFrameSummary::new(1, 1));
        assert!(frame.image.is_some());
    }

    #[test]
    fn test_unreadable_picture_keeps_the_detections() {
        let record = FrameRecord::Counts {
            persons: 2,
            violations: 1,
            image: Some(PathBuf::from("/nonexistent/scene.jpg")),
        };
        let frame = record.to_frame(0.8, None);
        assert_eq!(frame.summary, RawFrameSummary::new(2, 1));
        assert!(frame.image.is_none());
        assert!(load_image(Path::new("/nonexistent/scene.jpg")).is_err());
    }
}
