//! Flash bus abstraction
//!
//! The algorithm never touches memory directly. Everything goes through a
//! [`FlashBus`], which moves one bus-width word at a time and knows how the
//! parallel flash parts are laid out across the data bus.
//!
//! Addresses passed to [`FlashBus::read`] and [`FlashBus::write`] are byte
//! offsets from the start of the flash window. Addresses passed to
//! [`FlashBus::write_command`] are command addresses, i.e. byte offsets
//! shifted right by the bus address shift.

mod mmio;

pub use mmio::MmioBus;

/// Width of the data bus the flash array sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum BusWidth {
    /// 8-bit bus
    X8,
    /// 16-bit bus
    X16,
    /// 32-bit bus
    X32,
}

impl BusWidth {
    /// Bus width in bytes
    pub const fn bytes(self) -> u8 {
        match self {
            Self::X8 => 1,
            Self::X16 => 2,
            Self::X32 => 4,
        }
    }

    /// Look up a width from its size in bits
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Self::X8),
            16 => Some(Self::X16),
            32 => Some(Self::X32),
            _ => None,
        }
    }
}

/// How the flash parts are arranged on the bus
///
/// `interleave` parts of `width / interleave` bytes each are wired side by
/// side. A command byte has to be sent to every part at once, and a status
/// bit only counts when every part reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusLayout {
    width: BusWidth,
    interleave: u8,
}

impl BusLayout {
    /// Create a layout, or `None` if the parts don't divide the bus evenly
    pub const fn new(width: BusWidth, interleave: u8) -> Option<Self> {
        let bytes = width.bytes();
        if interleave == 0 || interleave > bytes || bytes % interleave != 0 {
            return None;
        }
        Some(Self { width, interleave })
    }

    /// A single part filling the whole bus
    pub const fn single(width: BusWidth) -> Self {
        Self {
            width,
            interleave: 1,
        }
    }

    /// Bus width
    pub const fn width(&self) -> BusWidth {
        self.width
    }

    /// Number of parallel parts (lanes)
    pub const fn interleave(&self) -> u8 {
        self.interleave
    }

    /// Bytes per bus word
    pub const fn bytes(&self) -> u8 {
        self.width.bytes()
    }

    /// Bytes driven by each part
    pub const fn lane_bytes(&self) -> u8 {
        self.width.bytes() / self.interleave
    }

    /// Shift converting a byte offset into a command address
    pub const fn addr_shift(&self) -> u8 {
        self.width.bytes().trailing_zeros() as u8
    }

    /// Mask of the valid bits of a bus word
    pub const fn word_mask(&self) -> u32 {
        match self.width {
            BusWidth::X8 => 0xFF,
            BusWidth::X16 => 0xFFFF,
            BusWidth::X32 => 0xFFFF_FFFF,
        }
    }

    /// Place `byte` in the low byte of every lane
    pub const fn replicate(&self, byte: u8) -> u32 {
        let lane_bits = self.lane_bytes() as u32 * 8;
        let mut word = 0u32;
        let mut lane = 0;
        while lane < self.interleave as u32 {
            word |= (byte as u32) << (lane * lane_bits);
            lane += 1;
        }
        word
    }

    /// Extract the low byte of one lane from a bus word
    pub const fn lane_byte(&self, word: u32, lane: u8) -> u8 {
        (word >> (lane as u32 * self.lane_bytes() as u32 * 8)) as u8
    }
}

/// Maximum bus word size in bytes
pub const MAX_WORD_BYTES: usize = 4;

/// Assemble a bus word from up to four bytes in memory order
///
/// Produces the value a native load of `bytes.len()` bytes would return.
pub fn word_from_ne_bytes(bytes: &[u8]) -> u32 {
    let n = bytes.len().min(MAX_WORD_BYTES);
    let mut raw = [0u8; MAX_WORD_BYTES];
    if cfg!(target_endian = "little") {
        raw[..n].copy_from_slice(&bytes[..n]);
    } else {
        raw[MAX_WORD_BYTES - n..].copy_from_slice(&bytes[..n]);
    }
    u32::from_ne_bytes(raw)
}

/// Split the low `n` bytes of a bus word into memory order
///
/// Only the first `n` bytes of the result are meaningful.
pub fn word_to_ne_bytes(word: u32, n: usize) -> [u8; MAX_WORD_BYTES] {
    let n = n.min(MAX_WORD_BYTES);
    let raw = word.to_ne_bytes();
    let mut out = [0u8; MAX_WORD_BYTES];
    if cfg!(target_endian = "little") {
        out[..n].copy_from_slice(&raw[..n]);
    } else {
        out[..n].copy_from_slice(&raw[MAX_WORD_BYTES - n..]);
    }
    out
}

/// Bus access primitives used by flash algorithms
///
/// Implementations are expected to be infallible: on real hardware a bus
/// access either happens or the CPU faults.
pub trait FlashBus {
    /// Read one bus word at a byte offset
    fn read(&mut self, addr: u32) -> u32;

    /// Write one bus word at a byte offset
    fn write(&mut self, addr: u32, word: u32);

    /// Write a command byte to every lane at a command address
    fn write_command(&mut self, cmd_addr: u32, cmd: u8);

    /// Replicate a single-lane byte across all interleaved lanes
    fn replicate(&self, byte: u8) -> u32;
}

impl<B: FlashBus + ?Sized> FlashBus for &mut B {
    fn read(&mut self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u32, word: u32) {
        (**self).write(addr, word)
    }

    fn write_command(&mut self, cmd_addr: u32, cmd: u8) {
        (**self).write_command(cmd_addr, cmd)
    }

    fn replicate(&self, byte: u8) -> u32 {
        (**self).replicate(byte)
    }
}
