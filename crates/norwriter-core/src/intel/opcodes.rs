//! Intel standard command set opcodes
//!
//! Command bytes are written to every part of an interleaved array at once,
//! see [`FlashBus::write_command`](crate::bus::FlashBus::write_command).

// ============================================================================
// Mode commands
// ============================================================================

/// Block erase setup
pub const BLOCK_ERASE: u8 = 0x20;
/// Word program setup
pub const PROGRAM_WORD: u8 = 0x40;
/// Clear status register
pub const CLEAR_STATUS: u8 = 0x50;
/// Lock bit change setup
pub const CHANGE_LOCK: u8 = 0x60;
/// Read status register
pub const READ_STATUS: u8 = 0x70;
/// Read array (normal read mode)
pub const READ_ARRAY: u8 = 0xFF;

// ============================================================================
// Second-cycle commands
// ============================================================================

/// Set block lock bit (after CHANGE_LOCK)
pub const SET_LOCK_BIT: u8 = 0x01;
/// Clear block lock bits (after CHANGE_LOCK)
pub const CLEAR_LOCK_BITS: u8 = 0xD0;
/// Erase confirm (after BLOCK_ERASE)
pub const CONFIRM: u8 = 0xD0;

/// Command address of the clear status command
///
/// Clear status is not block-specific.
pub const CLEAR_STATUS_ADDR: u32 = 0;
