//! Builds the collaborators of a station from its configuration.
//!
//! | node          | types                  |
//! |---------------|------------------------|
//! | `perception`  | `replay`, `stream`     |
//! | `led`         | `serial`, `mock`       |
//! | `alarm`       | `command`, `log`       |
//! | `snapshots`   | `jpeg_dir`             |
//! | `stats`       | `daily_csv`            |

use maskwatch::config::{NodeConfig, StationConfig};
use maskwatch::mock::MockSignalDriver;
use maskwatch::prelude::*;
use maskwatch_stats::DailyStatsLog;
use mw_alarm::{CommandAlarm, LogAlarm};
use mw_led_serial::SerialLedDriver;
use mw_replay::{ReplayPerception, StreamPerception};
use mw_snapshot::DirSnapshotStore;

fn unknown(node: &str, type_: &str) -> MwError {
    MwError::Config(format!("Unknown {node} type '{type_}'"))
}

/// Nodes writing under the reports directory get the station wide one unless they override it.
fn with_reports_dir(node: &NodeConfig, reports_dir: &str) -> NodeConfig {
    let mut node = node.clone();
    node.set_default_param("reports_dir", reports_dir);
    node
}

pub fn build_perception(node: &NodeConfig) -> MwResult<Box<dyn PerceptionEngine>> {
    let config = node.get_instance_config();
    let engine: Box<dyn PerceptionEngine> = match node.get_type() {
        "replay" => Box::new(ReplayPerception::new(config)?),
        "stream" => Box::new(StreamPerception::new(config)?),
        other => return Err(unknown("perception", other)),
    };
    Ok(engine)
}

pub fn build_led(node: &NodeConfig) -> MwResult<Box<dyn SignalDriver>> {
    let config = node.get_instance_config();
    let driver: Box<dyn SignalDriver> = match node.get_type() {
        "serial" => Box::new(SerialLedDriver::new(config)?),
        "mock" => Box::new(MockSignalDriver::new(config)?),
        other => return Err(unknown("led", other)),
    };
    Ok(driver)
}

pub fn build_alarm(node: &NodeConfig) -> MwResult<Box<dyn AudibleAlarm>> {
    let config = node.get_instance_config();
    let alarm: Box<dyn AudibleAlarm> = match node.get_type() {
        "command" => Box::new(CommandAlarm::new(config)?),
        "log" => Box::new(LogAlarm::new(config)?),
        other => return Err(unknown("alarm", other)),
    };
    Ok(alarm)
}

pub fn build_snapshots(node: &NodeConfig, reports_dir: &str) -> MwResult<Box<dyn SnapshotStore>> {
    let node = with_reports_dir(node, reports_dir);
    match node.get_type() {
        "jpeg_dir" => Ok(Box::new(DirSnapshotStore::new(node.get_instance_config())?)),
        other => Err(unknown("snapshots", other)),
    }
}

pub fn build_stats(node: &NodeConfig, reports_dir: &str) -> MwResult<Box<dyn StatsRecorder>> {
    let node = with_reports_dir(node, reports_dir);
    match node.get_type() {
        "daily_csv" => Ok(Box::new(DailyStatsLog::new(node.get_instance_config())?)),
        other => Err(unknown("stats", other)),
    }
}

pub fn build_collaborators(config: &StationConfig) -> MwResult<Collaborators> {
    let reports_dir = config.reports_dir.as_str();
    Ok(Collaborators {
        perception: build_perception(&config.perception)?,
        led: build_led(&config.led)?,
        alarm: config.alarm.as_ref().map(build_alarm).transpose()?,
        snapshots: config
            .snapshots
            .as_ref()
            .map(|node| build_snapshots(node, reports_dir))
            .transpose()?,
        stats: config
            .stats
            .as_ref()
            .map(|node| build_stats(node, reports_dir))
            .transpose()?,
    })
}

/// True when the perception engine consumes stdin, so the keyboard can't be used to quit.
pub fn perception_reads_stdin(config: &StationConfig) -> bool {
    config.perception.get_type() == "stream"
        && config
            .perception
            .get_instance_config()
            .map_or(true, |c| !c.contains("path"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use maskwatch_stats::{STATS_FILE_NAME, STATS_HEADER};
    use std::fs::{read_dir, read_to_string, write};

    fn demo_config(dir: &std::path::Path) -> StationConfig {
        let frames = dir.join("frames.ron");
        write(
            &frames,
            "[Counts(persons: 0, violations: 0), Faces([0.1, 0.95]), Counts(persons: 2, violations: 0)]",
        )
        .unwrap();
        StationConfig {
            perception: NodeConfig::new("replay")
                .with_param("path", frames.to_string_lossy().to_string()),
            led: NodeConfig::new("mock"),
            alarm: Some(NodeConfig::new("log")),
            snapshots: Some(NodeConfig::new("jpeg_dir")),
            stats: Some(
                NodeConfig::new("daily_csv")
                    .with_param("demographics", "fixed")
                    .with_param("age", 30u32),
            ),
            reports_dir: dir.join("reports").to_string_lossy().to_string(),
            idle_policy: IdlePolicy::OnTransition,
        }
    }

    #[test]
    fn test_unknown_types() {
        assert!(build_perception(&NodeConfig::new("webcam")).is_err());
        assert!(build_led(&NodeConfig::new("gpio")).is_err());
        assert!(build_alarm(&NodeConfig::new("siren")).is_err());
        assert!(build_snapshots(&NodeConfig::new("png_dir"), "reports").is_err());
        assert!(build_stats(&NodeConfig::new("sqlite"), "reports").is_err());
    }

    #[test]
    fn test_reports_dir_is_inherited_not_forced() {
        let node = with_reports_dir(&NodeConfig::new("daily_csv"), "/data");
        let dir: String = node.get_instance_config().unwrap().require("reports_dir").unwrap();
        assert_eq!(dir, "/data");

        let node = NodeConfig::new("daily_csv").with_param("reports_dir", "/elsewhere");
        let node = with_reports_dir(&node, "/data");
        let dir: String = node.get_instance_config().unwrap().require("reports_dir").unwrap();
        assert_eq!(dir, "/elsewhere");
    }

    #[test]
    fn test_stdin_detection() {
        let mut config = StationConfig::default();
        assert!(perception_reads_stdin(&config));
        config.perception.set_param("path", "/run/detections.fifo");
        assert!(!perception_reads_stdin(&config));
        config.perception = NodeConfig::new("replay");
        assert!(!perception_reads_stdin(&config));
    }

    #[test]
    fn test_replay_to_reports() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = demo_config(tmp.path());
        let collaborators = build_collaborators(&config).unwrap();
        let mut runtime =
            StationRuntime::new(WallClock::new(), collaborators, config.idle_policy);
        // The script runs out after three frames, which ends the run.
        let err = runtime.run(&StopSignal::new()).unwrap_err();
        assert!(matches!(err, MwError::CollaboratorUnavailable { .. }));
        assert_eq!(runtime.phase(), RunPhase::Stopped);
        assert_eq!(runtime.controller().total_counted(), 2);

        let reports = tmp.path().join("reports");
        let day = read_dir(&reports).unwrap().next().unwrap().unwrap();
        let stats = read_to_string(day.path().join(STATS_FILE_NAME)).unwrap();
        assert!(stats.starts_with(STATS_HEADER));
        assert_eq!(stats.lines().count(), 2);
    }

    #[test]
    fn test_raise_saves_the_scene() {
        let tmp = tempfile::TempDir::new().unwrap();
        image::RgbImage::from_pixel(16, 12, image::Rgb([10, 120, 10]))
            .save(tmp.path().join("scene.jpg"))
            .unwrap();
        let frames = tmp.path().join("frames.ron");
        write(
            &frames,
            r#"[
                Counts(persons: 0, violations: 0),
                Detections(faces: [0.97], image: "scene.jpg"),
                Detections(faces: [0.10], image: "scene.jpg"),
            ]"#,
        )
        .unwrap();
        let mut config = demo_config(tmp.path());
        config
            .perception
            .set_param("path", frames.to_string_lossy().to_string());
        let collaborators = build_collaborators(&config).unwrap();
        let mut runtime =
            StationRuntime::new(WallClock::new(), collaborators, config.idle_policy);
        assert!(runtime.run(&StopSignal::new()).is_err());

        // One raise, one snapshot, next to the statistics of the day.
        let day = read_dir(tmp.path().join("reports"))
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let snapshots: Vec<_> = read_dir(&day)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("file_") && name.ends_with(".jpg"))
            .collect();
        assert_eq!(snapshots.len(), 1);
        let saved = image::open(day.join(&snapshots[0])).unwrap();
        assert_eq!((saved.width(), saved.height()), (16, 12));
    }
}
