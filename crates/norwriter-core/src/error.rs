//! Error types for norwriter-core
//!
//! Every operation outcome other than "ready" is an [`Error`]. The numeric
//! codes are the ones reported to the debug host in the mailbox error
//! parameter, so they must stay stable.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    // Device-reported failures
    /// Erase and program error bits both set: the command sequence was invalid
    CommandSequence,
    /// Block erase failed
    Erase,
    /// Word program failed
    Program,
    /// Program/erase voltage out of range
    Voltage,
    /// Operation hit a locked block, or a lock bit change failed
    Lock,

    // Algorithm failures
    /// The ready bit never came up within the configured poll limit
    Timeout,
    /// Operation is not compiled into this algorithm
    NotSupported,
    /// Offset lies outside the device geometry
    AddressOutOfBounds,
    /// Source buffer does not cover the word-aligned byte count
    BufferTooSmall,
    /// Data read back after programming differs from the source
    VerifyFailed,
    /// Offset or word size does not match the bus word
    InvalidAlignment,
}

impl Error {
    /// Numeric error code reported to the host
    pub const fn code(self) -> u8 {
        match self {
            Self::NotSupported => 1,
            Self::Timeout => 6,
            Self::CommandSequence => 7,
            Self::Erase => 8,
            Self::Program => 10,
            Self::Lock => 11,
            Self::Voltage => 12,
            Self::AddressOutOfBounds => 13,
            Self::BufferTooSmall => 14,
            Self::VerifyFailed => 15,
            Self::InvalidAlignment => 16,
        }
    }

    /// Look up an error from its host code
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::NotSupported),
            6 => Some(Self::Timeout),
            7 => Some(Self::CommandSequence),
            8 => Some(Self::Erase),
            10 => Some(Self::Program),
            11 => Some(Self::Lock),
            12 => Some(Self::Voltage),
            13 => Some(Self::AddressOutOfBounds),
            14 => Some(Self::BufferTooSmall),
            15 => Some(Self::VerifyFailed),
            16 => Some(Self::InvalidAlignment),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandSequence => write!(f, "the flash command sequence was incorrect"),
            Self::Erase => write!(f, "the flash erase operation errored out"),
            Self::Program => write!(f, "the flash programming operation errored out"),
            Self::Voltage => write!(f, "the flash part ran into a voltage error"),
            Self::Lock => write!(f, "the flash operation ran into a lock error"),
            Self::Timeout => write!(f, "flash timeout error"),
            Self::NotSupported => write!(f, "target does not support requested operation"),
            Self::AddressOutOfBounds => write!(f, "address outside flash geometry"),
            Self::BufferTooSmall => write!(f, "source buffer too small"),
            Self::VerifyFailed => write!(f, "verify failed: data mismatch"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

/// Outcome of a device operation as seen by the host
///
/// `Ready` is code 0, every other outcome carries an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Operation completed, device ready
    Ready,
    /// Operation failed
    Failed(Error),
}

impl Outcome {
    /// Numeric code, 0 for `Ready`
    pub const fn code(self) -> u8 {
        match self {
            Self::Ready => 0,
            Self::Failed(e) => e.code(),
        }
    }

}

impl From<Result<()>> for Outcome {
    fn from(res: Result<()>) -> Self {
        match res {
            Ok(()) => Self::Ready,
            Err(e) => Self::Failed(e),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Failed(e) => write!(f, "{}", e),
        }
    }
}
