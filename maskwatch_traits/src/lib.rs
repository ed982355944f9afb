use std::fmt::{Debug, Display};
use thiserror::Error;

/// Common maskwatch error type.
///
/// The variants follow how a failure is handled by the station run loop:
/// an invalid frame only spoils the current step, an unavailable collaborator
/// stops the run, a failed statistics write is logged and forgotten.
#[derive(Error, Debug)]
pub enum MwError {
    #[error("Invalid frame summary: {person_count} person(s), {violation_count} violation(s)")]
    InvalidFrameSummary {
        person_count: i64,
        violation_count: i64,
    },

    #[error("{collaborator} is unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: String,
        message: String,
    },

    #[error("Could not append to the statistics log: {0}")]
    LogWriteFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MwError {
    pub fn collaborator(collaborator: &str, message: &str) -> Self {
        MwError::CollaboratorUnavailable {
            collaborator: collaborator.to_string(),
            message: message.to_string(),
        }
    }

    /// Same as `collaborator` but keeps the underlying cause in the message.
    pub fn collaborator_with_cause(collaborator: &str, message: &str, cause: impl Display) -> Self {
        MwError::CollaboratorUnavailable {
            collaborator: collaborator.to_string(),
            message: format!("{message}: {cause}"),
        }
    }

    pub fn log_write(message: &str, cause: impl Display) -> Self {
        MwError::LogWriteFailure(format!("{message}: {cause}"))
    }

    pub fn config_with_cause(message: &str, cause: impl Display) -> Self {
        MwError::Config(format!("{message}: {cause}"))
    }

    /// Fatal errors terminate the run, the others only affect the current step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MwError::CollaboratorUnavailable { .. } | MwError::Config(_)
        )
    }
}

impl From<&str> for MwError {
    fn from(s: &str) -> MwError {
        MwError::Config(s.to_string())
    }
}

impl From<String> for MwError {
    fn from(s: String) -> MwError {
        MwError::Config(s)
    }
}

// Generic Result type for maskwatch.
pub type MwResult<T> = Result<T, MwError>;

/// Defines a basic write, append only stream trait to be able to persist records.
pub trait WriteStream<E>: Send + Debug {
    fn log(&mut self, obj: &E) -> MwResult<()>;
    fn flush(&mut self) -> MwResult<()> {
        Ok(())
    }
}
