//! Error types for the norwriter CLI

use norwriter_core::dispatch::HostCommand;
use norwriter_core::geometry::GeometryError;
use norwriter_core::CommandSet;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the command line tool
#[derive(Debug, Error)]
pub enum CliError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Geometry file could not be loaded
    #[error("Invalid geometry '{}': {source}", .path.display())]
    Geometry {
        path: PathBuf,
        #[source]
        source: GeometryError,
    },

    /// Device does not use an Intel command set
    #[error("Command set {0} is not supported")]
    UnsupportedCommandSet(CommandSet),

    /// Image file is larger than the flash
    #[error("Image file is {actual} bytes but the flash is only {expected} bytes")]
    ImageTooLarge { expected: usize, actual: usize },

    /// Input does not fit at the requested offset
    #[error("{len} bytes at {offset:#x} do not fit in a {size} byte flash")]
    OutOfRange { offset: u32, len: usize, size: u32 },

    /// The algorithm reported a failure
    #[error("Flash operation failed: {0}")]
    Flash(#[from] norwriter_core::Error),

    /// The writer answered a command with an error status
    #[error("Writer command {command:?} failed with code {code}: {}", describe(.code))]
    Writer { command: HostCommand, code: u32 },

    /// The writer answered with an unexpected status byte
    #[error("Writer command {command:?} returned unexpected status {status:#04x}")]
    UnexpectedStatus { command: HostCommand, status: u8 },
}

fn describe(code: &u32) -> String {
    u8::try_from(*code)
        .ok()
        .and_then(norwriter_core::Error::from_code)
        .map_or_else(|| "unknown error".to_string(), |e| e.to_string())
}
