//! Flash algorithm interface
//!
//! A [`FlashAlgorithm`] is one command-set implementation bound to a bus and
//! a device descriptor. The dispatcher only ever talks to this trait.
//!
//! Construction is the parameter setup step: an algorithm value cannot exist
//! before its status masks and addressing parameters have been derived.
//!
//! Operations that are not compiled in keep the default method bodies, which
//! report [`Error::NotSupported`], and are left out of
//! [`FlashAlgorithm::capabilities`].

use core::fmt;
use core::str::FromStr;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::geometry::{BlockAddr, DeviceDescriptor};

/// Default number of busy-wait iterations after a command write
///
/// Soft cores run slowly enough that a handful of loop turns covers the
/// command-to-status latency.
#[cfg(target_arch = "microblaze")]
pub const DEFAULT_DELAY_LOOPS: u32 = 5;
/// Default number of busy-wait iterations after a command write
#[cfg(not(target_arch = "microblaze"))]
pub const DEFAULT_DELAY_LOOPS: u32 = 15;

bitflags! {
    /// Operations an algorithm was built with
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Whole-device and single-block erase
        const ERASE   = 1 << 0;
        /// Word programming
        const PROGRAM = 1 << 1;
        /// Block lock and unlock
        const LOCK    = 1 << 2;
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::empty()
    }
}

/// CFI primary vendor command set identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandSet {
    /// Intel/Sharp extended command set
    IntelExtended,
    /// AMD/Fujitsu standard command set
    AmdStandard,
    /// Intel standard command set
    IntelStandard,
    /// AMD/Fujitsu extended command set
    AmdExtended,
    /// Intel performance code (G18) command set
    IntelPerformance,
}

impl CommandSet {
    /// CFI command set code
    pub const fn code(self) -> u16 {
        match self {
            Self::IntelExtended => 0x0001,
            Self::AmdStandard => 0x0002,
            Self::IntelStandard => 0x0003,
            Self::AmdExtended => 0x0004,
            Self::IntelPerformance => 0x0200,
        }
    }

    /// Look up a command set from its CFI code
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(Self::IntelExtended),
            0x0002 => Some(Self::AmdStandard),
            0x0003 => Some(Self::IntelStandard),
            0x0004 => Some(Self::AmdExtended),
            0x0200 => Some(Self::IntelPerformance),
            _ => None,
        }
    }

    /// Short name used in geometry files
    pub const fn name(self) -> &'static str {
        match self {
            Self::IntelExtended => "intel-extended",
            Self::AmdStandard => "amd-standard",
            Self::IntelStandard => "intel-standard",
            Self::AmdExtended => "amd-extended",
            Self::IntelPerformance => "intel-g18",
        }
    }

    /// Check if the part speaks the Intel status-register protocol
    pub const fn is_intel(self) -> bool {
        matches!(
            self,
            Self::IntelExtended | Self::IntelStandard | Self::IntelPerformance
        )
    }
}

impl fmt::Display for CommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            Self::IntelExtended,
            Self::AmdStandard,
            Self::IntelStandard,
            Self::AmdExtended,
            Self::IntelPerformance,
        ]
        .into_iter()
        .find(|set| set.name().eq_ignore_ascii_case(s.trim()))
        .ok_or(Error::NotSupported)
    }
}

/// Runtime tuning of an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of ready-bit polls before giving up with
    /// [`Error::Timeout`]; `None` spins until the device is ready
    pub poll_limit: Option<u32>,
    /// Busy-wait iterations between a command write and the first status read
    pub delay_loops: u32,
    /// Clear a block's lock bit before erasing it
    pub unlock_before_erase: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_limit: None,
            delay_loops: DEFAULT_DELAY_LOOPS,
            unlock_before_erase: cfg!(feature = "unlock-before-erase"),
        }
    }
}

impl Config {
    /// Bound the ready-bit polling
    pub const fn with_poll_limit(mut self, limit: u32) -> Self {
        self.poll_limit = Some(limit);
        self
    }

    /// Override the post-command delay
    pub const fn with_delay_loops(mut self, loops: u32) -> Self {
        self.delay_loops = loops;
        self
    }

    /// Override unlock-before-erase
    pub const fn with_unlock_before_erase(mut self, unlock: bool) -> Self {
        self.unlock_before_erase = unlock;
        self
    }
}

/// Device operations exposed to the command dispatcher
///
/// # Example
///
/// ```ignore
/// use norwriter_core::algorithm::FlashAlgorithm;
///
/// fn wipe<A: FlashAlgorithm>(algo: &mut A) -> norwriter_core::Result<()> {
///     algo.reset_device();
///     algo.erase_device()
/// }
/// ```
pub trait FlashAlgorithm {
    /// Command set this algorithm drives
    fn command_set(&self) -> CommandSet;

    /// Operations compiled into this algorithm
    fn capabilities(&self) -> Capabilities;

    /// Descriptor the algorithm was set up with
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Return every block to read-array mode
    fn reset_device(&mut self);

    /// Return one block to read-array mode
    fn reset_block(&mut self, blk: BlockAddr);

    /// Read array data starting at a byte offset
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Erase every block, stopping at the first failure
    fn erase_device(&mut self) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Erase one block
    fn erase_block(&mut self, _blk: BlockAddr) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Program `nbytes` from `data` starting at a byte offset
    ///
    /// `nbytes` is rounded up to whole bus words; `data` must cover the
    /// rounded count.
    fn program(&mut self, _offset: u32, _data: &[u8], _nbytes: u32) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Set a block's lock bit
    fn lock_block(&mut self, _blk: BlockAddr) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Clear a block's lock bit
    fn unlock_block(&mut self, _blk: BlockAddr) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Erase every block overlapping `[offset, offset + len)`
    ///
    /// An empty range erases nothing.
    fn erase_range(&mut self, offset: u32, len: u32) -> Result<()> {
        if !self.capabilities().contains(Capabilities::ERASE) {
            return Err(Error::NotSupported);
        }
        if len == 0 {
            return Ok(());
        }
        if !self.descriptor().contains_range(offset, len) {
            return Err(Error::AddressOutOfBounds);
        }

        let end = offset as u64 + len as u64;
        let mut cursor = self
            .descriptor()
            .block_start(offset)
            .ok_or(Error::AddressOutOfBounds)?;
        while (cursor as u64) < end {
            let size = self
                .descriptor()
                .region_at(cursor)
                .map(|r| r.block_size)
                .ok_or(Error::AddressOutOfBounds)?;
            let blk = self.descriptor().block_addr(cursor);
            self.erase_block(blk)?;
            match cursor.checked_add(size) {
                Some(next) => cursor = next,
                None => break,
            }
        }

        Ok(())
    }
}
