use clap::Parser;
use log::{debug, error, info, warn};
use maskwatch::config::read_or_bootstrap_configuration;
use maskwatch::prelude::*;
use mw_station::{build_collaborators, perception_reads_stdin};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::io::{stdin, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

#[derive(Parser)]
#[command(author, version, about = "Mask monitoring station")]
struct Cli {
    /// Station configuration, written with the default parameters if it does not exist.
    #[arg(short, long, default_value = "station.ron")]
    config: PathBuf,

    /// Overrides the reports directory of the configuration.
    #[arg(long)]
    reports_dir: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Also write the log to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not watch stdin for `q`.
    #[arg(long)]
    no_keyboard_quit: bool,
}

fn setup_logging(level: LevelFilter, log_file: Option<&Path>) -> MwResult<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let file = File::create(path).map_err(|e| {
            MwError::config_with_cause(&format!("Could not create {}", path.display()), e)
        })?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
    }
    CombinedLogger::init(loggers)
        .map_err(|e| MwError::config_with_cause("Could not set up the logger", e))
}

fn watch_keyboard(stop: StopSignal) {
    let spawned = thread::Builder::new()
        .name("keyboard".to_string())
        .spawn(move || {
            for line in stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                        info!("Quit requested from the keyboard.");
                        stop.raise();
                        break;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        });
    if let Err(e) = spawned {
        warn!("No keyboard quit: {e}");
    }
}

fn run(cli: Cli) -> MwResult<RunReport> {
    let (mut config, bootstrapped) = read_or_bootstrap_configuration(&cli.config)?;
    if bootstrapped {
        info!("Default parameters loaded, written to {}.", cli.config.display());
    } else {
        debug!("Configuration read from {}.", cli.config.display());
    }
    if let Some(reports_dir) = cli.reports_dir {
        config.reports_dir = reports_dir;
    }

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.raise())
        .map_err(|e| MwError::config_with_cause("Error setting Ctrl-C handler", e))?;
    if cli.no_keyboard_quit {
        debug!("Keyboard quit disabled.");
    } else if perception_reads_stdin(&config) {
        info!("Detections come from stdin, use Ctrl-C to quit.");
    } else {
        info!("Type q then enter to quit.");
        watch_keyboard(stop.clone());
    }

    let collaborators = build_collaborators(&config)?;
    let mut station = StationRuntime::new(WallClock::new(), collaborators, config.idle_policy);
    station.run(&stop)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = setup_logging(cli.log_level, cli.log_file.as_deref()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    match run(cli) {
        Ok(report) => {
            info!(
                "{} frame(s), {} rejected, {} people counted, {} row(s) lost.",
                report.frames, report.rejected_frames, report.total_counted, report.log_failures
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
