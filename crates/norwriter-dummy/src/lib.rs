//! norwriter-dummy - In-memory Intel NOR flash emulator for testing
//!
//! This crate provides a [`FlashBus`] that behaves like an array of Intel
//! standard command set parts sitting side by side on a parallel bus. It's
//! useful for testing the algorithm and the host tooling without hardware.
//!
//! The emulator models the command state machine, the per-lane status
//! register, a configurable busy period after each operation, block lock
//! bits and one-shot fault injection.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use norwriter_core::bus::{word_from_ne_bytes, word_to_ne_bytes, BusLayout, FlashBus};
use norwriter_core::geometry::DeviceDescriptor;
use norwriter_core::intel::opcodes;
use norwriter_core::intel::StatusBits;

/// Maximum number of interleaved parts
const MAX_LANES: usize = 4;

/// Configuration for the dummy flash
#[derive(Debug, Clone, Default)]
pub struct DummyConfig {
    /// Status reads that report busy after each erase, program or lock
    pub busy_reads: u32,
    /// Lock state of every block at power-up
    pub locked: bool,
    /// Record every bus access
    pub trace: bool,
}

/// Command state of the emulated parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reads return array data
    ReadArray,
    /// Reads return the status register
    ReadStatus,
    /// Waiting for the data word of a program
    ProgramSetup,
    /// Waiting for the erase confirm
    EraseSetup,
    /// Waiting for the lock bit command
    LockSetup,
}

/// Operation a fault is injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    /// Block erase
    Erase,
    /// Word program
    Program,
    /// Lock bit change
    Lock,
}

/// One recorded bus access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    /// Word read at a byte offset
    Read(u32),
    /// Word write at a byte offset
    Write(u32, u32),
    /// Command byte at a command address
    Command(u32, u8),
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    block: u32,
    op: FaultOp,
    bits: StatusBits,
    lanes: u8,
}

/// Dummy Intel NOR flash
///
/// Emulates the parts described by a bus layout and device descriptor.
#[cfg(feature = "alloc")]
pub struct DummyFlash {
    layout: BusLayout,
    device: DeviceDescriptor,
    config: DummyConfig,
    data: Vec<u8>,
    locked: Vec<bool>,
    mode: Mode,
    status: [StatusBits; MAX_LANES],
    busy: u32,
    stuck: bool,
    faults: Vec<Fault>,
    trace: Vec<BusOp>,
    erase_log: Vec<u32>,
}

#[cfg(feature = "alloc")]
impl DummyFlash {
    /// Create an erased dummy flash
    pub fn new(layout: BusLayout, device: DeviceDescriptor, config: DummyConfig) -> Self {
        let data = vec![0xFF; device.total_size() as usize];
        let locked = vec![config.locked; device.block_count() as usize];
        Self {
            layout,
            device,
            config,
            data,
            locked,
            mode: Mode::ReadArray,
            status: [StatusBits::empty(); MAX_LANES],
            busy: 0,
            stuck: false,
            faults: Vec::new(),
            trace: Vec::new(),
            erase_log: Vec::new(),
        }
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(
        layout: BusLayout,
        device: DeviceDescriptor,
        config: DummyConfig,
        initial_data: &[u8],
    ) -> Self {
        let mut flash = Self::new(layout, device, config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the bus layout
    pub fn layout(&self) -> &BusLayout {
        &self.layout
    }

    /// Get the device descriptor
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Current command state
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Recorded bus accesses (empty unless tracing is enabled)
    pub fn trace(&self) -> &[BusOp] {
        &self.trace
    }

    /// Forget the recorded bus accesses
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Start offsets of the blocks erased so far, in order
    pub fn erase_log(&self) -> &[u32] {
        &self.erase_log
    }

    /// Number of times a command byte was written
    pub fn command_count(&self, cmd: u8) -> usize {
        self.trace
            .iter()
            .filter(|op| matches!(op, BusOp::Command(_, c) if *c == cmd))
            .count()
    }

    /// Check the lock bit of the block containing `offset`
    pub fn is_locked(&self, offset: u32) -> bool {
        self.block_index(offset)
            .map(|i| self.locked[i])
            .unwrap_or(false)
    }

    /// Start offsets of every locked block
    pub fn locked_blocks(&self) -> Vec<u32> {
        self.device
            .blocks()
            .zip(&self.locked)
            .filter_map(|(start, &locked)| locked.then_some(start))
            .collect()
    }

    /// Set the lock bit of the block containing `offset` directly
    ///
    /// Returns `false` if `offset` is outside the array.
    pub fn set_lock_bit(&mut self, offset: u32, locked: bool) -> bool {
        match self.block_index(offset) {
            Some(index) => {
                self.locked[index] = locked;
                true
            }
            None => false,
        }
    }

    /// Never report ready again (or recover)
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// Fail the next `op` on the block containing `offset` in every lane
    pub fn inject_fault(&mut self, offset: u32, op: FaultOp, bits: StatusBits) {
        self.push_fault(offset, op, bits, self.all_lanes());
    }

    /// Fail the next `op` on the block containing `offset` in one lane only
    pub fn inject_lane_fault(&mut self, offset: u32, op: FaultOp, bits: StatusBits, lane: u8) {
        self.push_fault(offset, op, bits, 1 << lane);
    }

    fn push_fault(&mut self, offset: u32, op: FaultOp, bits: StatusBits, lanes: u8) {
        let block = self.device.block_start(offset).unwrap_or(offset);
        self.faults.push(Fault {
            block,
            op,
            bits,
            lanes,
        });
    }

    /// Remove and apply a pending fault, reporting whether one fired
    fn take_fault(&mut self, block: u32, op: FaultOp) -> bool {
        let Some(pos) = self
            .faults
            .iter()
            .position(|f| f.block == block && f.op == op)
        else {
            return false;
        };
        let fault = self.faults.remove(pos);
        log::debug!("dummy: injected {:?} fault at {:#x}", op, block);
        self.set_status(fault.bits, fault.lanes);
        true
    }

    fn all_lanes(&self) -> u8 {
        ((1u16 << self.layout.interleave()) - 1) as u8
    }

    fn set_status(&mut self, bits: StatusBits, lanes: u8) {
        for (lane, status) in self.status.iter_mut().enumerate() {
            if lanes & (1 << lane) != 0 {
                *status |= bits;
            }
        }
    }

    fn block_index(&self, offset: u32) -> Option<usize> {
        let mut index = 0usize;
        for region in self.device.regions() {
            if region.contains(offset) {
                return Some(index + ((offset - region.offset) / region.block_size) as usize);
            }
            index += region.block_count as usize;
        }
        None
    }

    fn block_range(&self, offset: u32) -> Option<(usize, usize)> {
        let start = self.device.block_start(offset)?;
        let size = self.device.region_at(offset)?.block_size;
        Some((start as usize, (start + size) as usize))
    }

    fn start_busy(&mut self) {
        self.busy = self.config.busy_reads;
        self.mode = Mode::ReadStatus;
    }

    fn status_word(&mut self) -> u32 {
        let ready = if self.stuck {
            false
        } else if self.busy > 0 {
            self.busy -= 1;
            false
        } else {
            true
        };

        let lane_bits = self.layout.lane_bytes() as u32 * 8;
        let mut word = 0u32;
        for lane in 0..self.layout.interleave() as usize {
            let mut status = self.status[lane];
            if ready {
                status |= StatusBits::READY;
            }
            word |= (status.bits() as u32) << (lane as u32 * lane_bits);
        }
        word
    }

    fn array_word(&self, addr: u32) -> u32 {
        let start = addr as usize;
        let end = start + self.layout.bytes() as usize;
        match self.data.get(start..end) {
            Some(bytes) => word_from_ne_bytes(bytes),
            None => {
                log::warn!("dummy: read outside the array at {:#x}", addr);
                self.layout.word_mask()
            }
        }
    }

    fn erase(&mut self, addr: u32) {
        let Some((start, end)) = self.block_range(addr) else {
            self.set_status(StatusBits::ERASE_ERROR, self.all_lanes());
            return;
        };
        if self.take_fault(start as u32, FaultOp::Erase) {
            return;
        }
        if self.is_locked(addr) {
            log::debug!("dummy: erase of locked block {:#x}", start);
            self.set_status(StatusBits::ERASE_ERROR | StatusBits::LOCK_ERROR, self.all_lanes());
            return;
        }
        self.data[start..end].fill(0xFF);
        self.erase_log.push(start as u32);
    }

    fn program(&mut self, addr: u32, word: u32) {
        let Some((start, _)) = self.block_range(addr) else {
            self.set_status(StatusBits::PROGRAM_ERROR, self.all_lanes());
            return;
        };
        if self.take_fault(start as u32, FaultOp::Program) {
            return;
        }
        if self.is_locked(addr) {
            self.set_status(StatusBits::PROGRAM_ERROR | StatusBits::LOCK_ERROR, self.all_lanes());
            return;
        }

        let n = self.layout.bytes() as usize;
        let bytes = word_to_ne_bytes(word, n);
        let at = addr as usize;
        // Programming can only clear bits
        for (cell, byte) in self.data[at..at + n].iter_mut().zip(&bytes[..n]) {
            *cell &= *byte;
        }
    }

    fn change_lock(&mut self, addr: u32, lock: bool) {
        let Some((start, _)) = self.block_range(addr) else {
            self.set_status(StatusBits::LOCK_ERROR, self.all_lanes());
            return;
        };
        if self.take_fault(start as u32, FaultOp::Lock) {
            return;
        }
        if let Some(index) = self.block_index(addr) {
            self.locked[index] = lock;
        }
    }

    fn command_sequence_error(&mut self) {
        self.set_status(
            StatusBits::ERASE_ERROR | StatusBits::PROGRAM_ERROR,
            self.all_lanes(),
        );
        self.mode = Mode::ReadStatus;
    }
}

#[cfg(feature = "alloc")]
impl FlashBus for DummyFlash {
    fn read(&mut self, addr: u32) -> u32 {
        if self.config.trace {
            self.trace.push(BusOp::Read(addr));
        }
        match self.mode {
            Mode::ReadArray => self.array_word(addr),
            _ => self.status_word(),
        }
    }

    fn write(&mut self, addr: u32, word: u32) {
        if self.config.trace {
            self.trace.push(BusOp::Write(addr, word));
        }
        match self.mode {
            Mode::ProgramSetup => {
                self.program(addr, word);
                self.start_busy();
            }
            mode => log::warn!("dummy: data write at {:#x} in {:?} ignored", addr, mode),
        }
    }

    fn write_command(&mut self, cmd_addr: u32, cmd: u8) {
        if self.config.trace {
            self.trace.push(BusOp::Command(cmd_addr, cmd));
        }
        let addr = cmd_addr << self.layout.addr_shift();

        match (self.mode, cmd) {
            (Mode::EraseSetup, opcodes::CONFIRM) => {
                self.erase(addr);
                self.start_busy();
            }
            (Mode::LockSetup, opcodes::SET_LOCK_BIT) => {
                self.change_lock(addr, true);
                self.start_busy();
            }
            (Mode::LockSetup, opcodes::CLEAR_LOCK_BITS) => {
                self.change_lock(addr, false);
                self.start_busy();
            }
            (Mode::EraseSetup | Mode::LockSetup | Mode::ProgramSetup, _) => {
                log::debug!("dummy: command {:#04x} breaks a {:?} sequence", cmd, self.mode);
                self.command_sequence_error();
            }
            (_, opcodes::BLOCK_ERASE) => self.mode = Mode::EraseSetup,
            (_, opcodes::PROGRAM_WORD) => self.mode = Mode::ProgramSetup,
            (_, opcodes::CHANGE_LOCK) => self.mode = Mode::LockSetup,
            (_, opcodes::READ_STATUS) => self.mode = Mode::ReadStatus,
            (_, opcodes::CLEAR_STATUS) => self.status = [StatusBits::empty(); MAX_LANES],
            (_, opcodes::READ_ARRAY) => self.mode = Mode::ReadArray,
            (_, other) => log::debug!("dummy: ignoring command {:#04x}", other),
        }
    }

    fn replicate(&self, byte: u8) -> u32 {
        self.layout.replicate(byte)
    }
}
