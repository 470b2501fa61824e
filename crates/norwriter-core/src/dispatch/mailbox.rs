//! Host/writer mailbox message
//!
//! The debug host and the writer exchange fixed 20-byte messages through
//! two mailboxes in target memory. The host fills the receive mailbox with a
//! command and parameters; the writer answers in the send mailbox.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Number of 32-bit parameters in a message
pub const MAX_PARAMS: usize = 4;

/// Size of a message on the wire
pub const MAILBOX_SIZE: usize = core::mem::size_of::<Mailbox>();

/// Parameter index of the error code in a failed reply
pub const ERR_CODE_PARAM: usize = 0;
/// Parameter index of the command set code in a query reply
pub const DEV_ALGO_PARAM: usize = 0;
/// Parameter index of a byte offset
pub const OFFSET_PARAM: usize = 0;
/// Parameter index of a byte count
pub const NBYTES_PARAM: usize = 1;
/// Parameter index of the batch source address
pub const SRCADDR_PARAM: usize = 2;

/// Command written by the host (or `Reply` by the writer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HostCommand {
    /// Nothing to do
    None = b'0',
    /// Report the command set
    Query = b'C',
    /// Initialize the device
    Init = b'I',
    /// Erase the whole device
    EraseDevice = b'E',
    /// Erase the blocks covering a byte range
    BlockErase = b'B',
    /// Reset the device to read-array mode
    Reset = b'R',
    /// Program from the transfer buffer and verify
    Program = b'P',
    /// Program from a source address without verifying
    Batch = b'b',
    /// Stop the writer
    Exit = b'X',
    /// Writer reply marker
    Reply = b'r',
}

impl HostCommand {
    /// Decode a command byte
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(Self::None),
            b'C' => Some(Self::Query),
            b'I' => Some(Self::Init),
            b'E' => Some(Self::EraseDevice),
            b'B' => Some(Self::BlockErase),
            b'R' => Some(Self::Reset),
            b'P' => Some(Self::Program),
            b'b' => Some(Self::Batch),
            b'X' => Some(Self::Exit),
            b'r' => Some(Self::Reply),
            _ => None,
        }
    }
}

/// Writer state reported back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WriterStatus {
    /// Waiting for a command
    Idle = b'I',
    /// Command failed, error code in param 0
    Error = b'E',
    /// Command succeeded
    Success = b'S',
    /// Writer has stopped
    Exit = b'X',
}

impl WriterStatus {
    /// Decode a status byte
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'I' => Some(Self::Idle),
            b'E' => Some(Self::Error),
            b'S' => Some(Self::Success),
            b'X' => Some(Self::Exit),
            _ => None,
        }
    }
}

/// One mailbox message, laid out exactly as in target memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Mailbox {
    /// Command byte, see [`HostCommand`]
    pub cmd: u8,
    /// Status byte, see [`WriterStatus`]
    pub status: u8,
    /// Unused
    pub pad: [u8; 2],
    /// Command parameters
    pub param: [u32; MAX_PARAMS],
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::empty()
    }
}

impl Mailbox {
    /// A `None` command with idle status
    pub const fn empty() -> Self {
        Self {
            cmd: HostCommand::None as u8,
            status: WriterStatus::Idle as u8,
            pad: [0; 2],
            param: [0; MAX_PARAMS],
        }
    }

    /// A host request
    pub const fn request(cmd: HostCommand, param: [u32; MAX_PARAMS]) -> Self {
        Self {
            cmd: cmd as u8,
            status: WriterStatus::Idle as u8,
            pad: [0; 2],
            param,
        }
    }

    /// Decoded command, `None` for unknown bytes
    pub const fn command(&self) -> Option<HostCommand> {
        HostCommand::from_byte(self.cmd)
    }

    /// Decoded status, `None` for unknown bytes
    pub const fn writer_status(&self) -> Option<WriterStatus> {
        WriterStatus::from_byte(self.status)
    }

    /// Parse a message from raw mailbox memory
    pub fn from_raw(bytes: &[u8]) -> Option<Self> {
        Self::read_from_bytes(bytes).ok()
    }

    /// Raw mailbox memory of this message
    pub fn to_raw(&self) -> [u8; MAILBOX_SIZE] {
        let mut raw = [0u8; MAILBOX_SIZE];
        raw.copy_from_slice(self.as_bytes());
        raw
    }
}
