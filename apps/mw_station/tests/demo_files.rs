use maskwatch::config::read_configuration;
use maskwatch::prelude::*;
use mw_replay::parse_script;
use std::path::Path;

fn demo_file(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(name)
}

#[test]
fn demo_station_builds() {
    let config = read_configuration(&demo_file("station.ron")).unwrap();
    assert_eq!(config.perception.get_type(), "replay");
    assert!(!mw_station::perception_reads_stdin(&config));
    // The demo runs until stopped instead of failing at the end of the script.
    let replay = config.perception.get_instance_config().unwrap();
    assert!(replay.get_or("loop", false).unwrap());

    // Paths in the demo are relative to the workspace root.
    let mut config = config;
    config
        .perception
        .set_param("path", demo_file("frames.ron").to_string_lossy().to_string());
    let tmp = tempfile::TempDir::new().unwrap();
    config.reports_dir = tmp.path().to_string_lossy().to_string();
    config.perception.set_param("period_ms", 0u32);
    let collaborators = mw_station::build_collaborators(&config).unwrap();

    let mut station = StationRuntime::new(WallClock::new(), collaborators, config.idle_policy);
    station.start_all_tasks().unwrap();
    // Three full passes over the eight demo frames, without reaching an end of script.
    for _ in 0..24 {
        station.run_one_iteration().unwrap();
    }
    station.stop_all_tasks().unwrap();
    assert_eq!(station.report().frames, 24);
}

#[test]
fn demo_script_parses() {
    let script = std::fs::read_to_string(demo_file("frames.ron")).unwrap();
    assert_eq!(parse_script(&script).unwrap().len(), 8);
}
