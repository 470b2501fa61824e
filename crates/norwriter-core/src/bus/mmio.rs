//! Memory-mapped flash bus
//!
//! The flash array is visible in the CPU address space, so a bus access is a
//! volatile load or store of the bus width at `base + offset`.

use super::{BusLayout, BusWidth, FlashBus};

/// Flash array mapped into the address space
pub struct MmioBus {
    /// Start of the flash window
    base: *mut u8,
    layout: BusLayout,
}

impl MmioBus {
    /// Create a bus over a flash window
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `base` points to a mapped flash window covering every offset the
    ///   algorithm will touch
    /// - `base` is aligned to the bus width
    /// - No other code is accessing the same window
    pub const unsafe fn new(base: *mut u8, layout: BusLayout) -> Self {
        Self { base, layout }
    }

    /// Bus layout of this window
    pub const fn layout(&self) -> BusLayout {
        self.layout
    }
}

impl FlashBus for MmioBus {
    #[inline]
    fn read(&mut self, addr: u32) -> u32 {
        let ptr = self.base.wrapping_add(addr as usize);
        // SAFETY: window and alignment guaranteed by `MmioBus::new`
        unsafe {
            match self.layout.width() {
                BusWidth::X8 => core::ptr::read_volatile(ptr) as u32,
                BusWidth::X16 => core::ptr::read_volatile(ptr as *const u16) as u32,
                BusWidth::X32 => core::ptr::read_volatile(ptr as *const u32),
            }
        }
    }

    #[inline]
    fn write(&mut self, addr: u32, word: u32) {
        let ptr = self.base.wrapping_add(addr as usize);
        // SAFETY: window and alignment guaranteed by `MmioBus::new`
        unsafe {
            match self.layout.width() {
                BusWidth::X8 => core::ptr::write_volatile(ptr, word as u8),
                BusWidth::X16 => core::ptr::write_volatile(ptr as *mut u16, word as u16),
                BusWidth::X32 => core::ptr::write_volatile(ptr as *mut u32, word),
            }
        }
    }

    #[inline]
    fn write_command(&mut self, cmd_addr: u32, cmd: u8) {
        let addr = cmd_addr << self.layout.addr_shift();
        let word = self.layout.replicate(cmd);
        self.write(addr, word);
    }

    fn replicate(&self, byte: u8) -> u32 {
        self.layout.replicate(byte)
    }
}

// Accesses go straight to device memory; there is no shared host state
unsafe impl Send for MmioBus {}
