//! Audible alarms.
//!
//! [`CommandAlarm`] plays the alarm through an external program (ie. `aplay alarm.wav`), without
//! waiting for it to finish. [`LogAlarm`] only leaves a warning in the log, for stations without
//! a speaker.

use log::{debug, info, warn};
use maskwatch::clock::WallClock;
use maskwatch::config::ComponentConfig;
use maskwatch::task::{AudibleAlarm, StationLifecycle};
use maskwatch::{MwError, MwResult};
use std::process::{Child, Command, Stdio};

pub struct CommandAlarm {
    command: String,
    args: Vec<String>,
    playing: Option<Child>,
    triggered: u64,
}

impl CommandAlarm {
    pub fn with_command(command: &str, args: Vec<String>) -> Self {
        Self {
            command: command.to_string(),
            args,
            playing: None,
            triggered: 0,
        }
    }

    /// Number of times the command was actually spawned.
    pub fn triggered(&self) -> u64 {
        self.triggered
    }

    fn is_playing(&mut self) -> bool {
        let Some(child) = self.playing.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Alarm command exited with {status}.");
                self.playing = None;
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Could not poll the alarm command: {e}");
                self.playing = None;
                false
            }
        }
    }
}

impl StationLifecycle for CommandAlarm {
    fn new(config: Option<&ComponentConfig>) -> MwResult<Self>
    where
        Self: Sized,
    {
        let config = config.ok_or("CommandAlarm needs a config with a 'command' to run")?;
        let command: String = config.require("command")?;
        let args: Vec<String> = config.get_or("args", Vec::new())?;
        Ok(Self::with_command(&command, args))
    }

    fn stop(&mut self, _clock: &WallClock) -> MwResult<()> {
        if self.is_playing() {
            if let Some(mut child) = self.playing.take() {
                // The child may exit between the poll and the kill, nothing to report then.
                let _ = child.kill();
                let _ = child.wait();
                debug!("Alarm command interrupted.");
            }
        }
        Ok(())
    }
}

impl AudibleAlarm for CommandAlarm {
    fn trigger(&mut self) -> MwResult<()> {
        if self.is_playing() {
            debug!("Alarm still playing, not restarting it.");
            return Ok(());
        }
        let child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                MwError::collaborator_with_cause(
                    "alarm",
                    &format!("Could not run {}", self.command),
                    e,
                )
            })?;
        self.playing = Some(child);
        self.triggered += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogAlarm {
    triggered: u64,
}

impl LogAlarm {
    pub fn triggered(&self) -> u64 {
        self.triggered
    }
}

impl StationLifecycle for LogAlarm {
    fn new(_config: Option<&ComponentConfig>) -> MwResult<Self>
    where
        Self: Sized,
    {
        info!("No alarm device configured, alarms only go to the log.");
        Ok(Self::default())
    }
}

impl AudibleAlarm for LogAlarm {
    fn trigger(&mut self) -> MwResult<()> {
        self.triggered += 1;
        warn!("ALARM: mask violation ({} so far).", self.triggered);
        Ok(())
    }
}
