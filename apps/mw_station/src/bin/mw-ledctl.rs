//! Bench tool for the LED board: type `a` (clear), `s` (fault), `i` (idle) or `q` to quit.

use clap::Parser;
use maskwatch::actuation::SignalCode;
use maskwatch::MwResult;
use mw_led_serial::{open_port, write_code};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::io::{stdin, BufRead};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about = "Drive the LED board by hand")]
struct Cli {
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    port: String,

    #[arg(short, long, default_value_t = 9600)]
    baudrate: u32,
}

fn code_for(key: &str) -> Option<SignalCode> {
    match key {
        "a" => Some(SignalCode::Clear),
        "s" => Some(SignalCode::Fault),
        "i" => Some(SignalCode::Idle),
        _ => None,
    }
}

fn run(cli: &Cli) -> MwResult<()> {
    let mut port = open_port(&cli.port, cli.baudrate, Duration::from_secs(1))?;
    log::info!("Connected to {}: a = clear, s = fault, i = idle, q = quit.", cli.port);
    for line in stdin().lock().lines() {
        let Ok(line) = line else { break };
        let key = line.trim();
        if key == "q" {
            break;
        }
        match code_for(key) {
            Some(code) => {
                write_code(&mut *port, code)?;
                log::info!("Sent {code}.");
            }
            None => log::warn!("Unknown key '{key}'."),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(code_for("a"), Some(SignalCode::Clear));
        assert_eq!(code_for("s"), Some(SignalCode::Fault));
        assert_eq!(code_for("i"), Some(SignalCode::Idle));
        assert_eq!(code_for("x"), None);
    }
}
