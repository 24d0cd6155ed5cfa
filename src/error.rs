//! The error type returned by fallible operations in this crate.

use std::fmt::{self, Display, Formatter};
use std::io;

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// The scenario cannot be simulated as written.
    ConfigError(String),
    /// One or more modules failed to construct.
    ModuleLoadError(String),
    SimError(String),
}

impl From<io::Error> for SimError {
    fn from(error: io::Error) -> Self {
        SimError::IoError(error)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(error: serde_json::Error) -> Self {
        SimError::JsonError(error)
    }
}

impl From<csv::Error> for SimError {
    fn from(error: csv::Error) -> Self {
        SimError::CsvError(error)
    }
}

impl From<String> for SimError {
    fn from(message: String) -> Self {
        SimError::SimError(message)
    }
}

impl From<&str> for SimError {
    fn from(message: &str) -> Self {
        SimError::SimError(message.to_string())
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::IoError(error) => Some(error),
            SimError::JsonError(error) => Some(error),
            SimError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SimError::IoError(error) => write!(f, "I/O error: {error}"),
            SimError::JsonError(error) => write!(f, "JSON error: {error}"),
            SimError::CsvError(error) => write!(f, "CSV error: {error}"),
            SimError::ConfigError(message) => write!(f, "configuration error: {message}"),
            SimError::ModuleLoadError(message) => write!(f, "module load error: {message}"),
            SimError::SimError(message) => write!(f, "{message}"),
        }
    }
}
