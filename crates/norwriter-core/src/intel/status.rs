//! Intel status register decoding
//!
//! Each part on the bus has its own 8-bit status register. The bus word read
//! back in status mode holds all of them side by side, so every status bit is
//! checked against a mask with that bit set in every lane. A bit only counts
//! as set when every part reports it.

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
    /// Single-part status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusBits: u8 {
        /// SR.7 - write state machine ready
        const READY           = 0x80;
        /// SR.6 - erase suspended
        const ERASE_SUSPENDED = 0x40;
        /// SR.5 - erase error
        const ERASE_ERROR     = 0x20;
        /// SR.4 - program error
        const PROGRAM_ERROR   = 0x10;
        /// SR.3 - program/erase voltage error
        const VOLTAGE_ERROR   = 0x08;
        /// SR.2 - program suspended
        const PROGRAM_SUSPENDED = 0x04;
        /// SR.1 - block lock error
        const LOCK_ERROR      = 0x02;
    }
}

/// Status bits replicated across every lane of the bus
///
/// Derived once from the bus by [`StatusMasks::derive`] and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusMasks {
    /// SR.7 in every lane
    pub ready: u32,
    /// SR.6 in every lane
    pub erase_suspended: u32,
    /// SR.5 in every lane
    pub erase_error: u32,
    /// SR.4 in every lane
    pub program_error: u32,
    /// SR.3 in every lane
    pub voltage_error: u32,
    /// SR.2 in every lane
    pub program_suspended: u32,
    /// SR.1 in every lane
    pub lock_error: u32,
}

impl StatusMasks {
    /// Build all masks with a lane replication function
    pub fn derive(replicate: impl Fn(u8) -> u32) -> Self {
        Self {
            ready: replicate(StatusBits::READY.bits()),
            erase_suspended: replicate(StatusBits::ERASE_SUSPENDED.bits()),
            erase_error: replicate(StatusBits::ERASE_ERROR.bits()),
            program_error: replicate(StatusBits::PROGRAM_ERROR.bits()),
            voltage_error: replicate(StatusBits::VOLTAGE_ERROR.bits()),
            program_suspended: replicate(StatusBits::PROGRAM_SUSPENDED.bits()),
            lock_error: replicate(StatusBits::LOCK_ERROR.bits()),
        }
    }

    /// Check if every lane reports ready
    #[inline]
    pub const fn is_ready(&self, status: u32) -> bool {
        status & self.ready == self.ready
    }

    /// Map a status word to an operation outcome
    ///
    /// Checks run in register bit order and the first match wins. A voltage
    /// error (SR.3) is reported as a program error, and a suspended program
    /// (SR.2) as a voltage error. Callers depend on these codes, so the
    /// mapping is kept as is.
    pub fn classify(&self, status: u32) -> Result<()> {
        let set = |mask: u32| status & mask == mask;

        if set(self.erase_error) {
            if set(self.program_error) {
                return Err(Error::CommandSequence);
            }
            Err(Error::Erase)
        } else if set(self.program_error) {
            Err(Error::Program)
        } else if set(self.voltage_error) {
            Err(Error::Program)
        } else if set(self.program_suspended) {
            Err(Error::Voltage)
        } else if set(self.lock_error) {
            Err(Error::Lock)
        } else {
            Ok(())
        }
    }
}
