//! Intel standard command set algorithm
//!
//! [`IntelStandard`] drives one device through a [`FlashBus`]. Every erase,
//! program and lock operation follows the same shape: write the command
//! cycles, wait for the part to settle, poll the ready bit, decode the
//! status register and finally put the block back into read-array mode.
//! The reset happens on every path, including failures and timeouts.

pub mod opcodes;
mod status;

pub use status::{StatusBits, StatusMasks};

use crate::algorithm::{Capabilities, CommandSet, Config, FlashAlgorithm};
use crate::bus::{word_from_ne_bytes, word_to_ne_bytes, FlashBus};
use crate::delay::busy_wait;
use crate::error::{Error, Result};
use crate::geometry::{BlockAddr, DeviceDescriptor};

use opcodes::*;

/// Algorithm context for an Intel standard command set device
///
/// Creating the context is the parameter setup step: the addressing step
/// and shift are copied out of the descriptor and the status masks are
/// derived from the bus lane layout. The descriptor itself is only borrowed.
pub struct IntelStandard<'d, B: FlashBus> {
    bus: B,
    device: &'d DeviceDescriptor,
    addr_step: u8,
    addr_shift: u8,
    masks: StatusMasks,
    config: Config,
}

impl<'d, B: FlashBus> IntelStandard<'d, B> {
    /// Set up the algorithm with the default [`Config`]
    pub fn new(bus: B, device: &'d DeviceDescriptor) -> Self {
        Self::with_config(bus, device, Config::default())
    }

    /// Set up the algorithm with an explicit [`Config`]
    pub fn with_config(bus: B, device: &'d DeviceDescriptor, config: Config) -> Self {
        let masks = StatusMasks::derive(|b| bus.replicate(b));
        log::debug!(
            "intel: step {} shift {} ready mask {:#010x}",
            device.addr_step,
            device.addr_shift,
            masks.ready
        );
        Self {
            bus,
            device,
            addr_step: device.addr_step,
            addr_shift: device.addr_shift,
            masks,
            config,
        }
    }

    /// Run parameter setup again for a (possibly) different descriptor
    pub fn reinit(&mut self, device: &'d DeviceDescriptor) {
        self.device = device;
        self.addr_step = device.addr_step;
        self.addr_shift = device.addr_shift;
        self.masks = StatusMasks::derive(|b| self.bus.replicate(b));
    }

    /// Status masks derived at setup
    pub fn masks(&self) -> &StatusMasks {
        &self.masks
    }

    /// Runtime configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Underlying bus, mutably
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Give the bus back
    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Block address of a byte offset
    pub const fn block_addr(&self, offset: u32) -> BlockAddr {
        BlockAddr(offset >> self.addr_shift)
    }

    /// Byte offset of a block address
    pub const fn byte_addr(&self, blk: BlockAddr) -> u32 {
        blk.0 << self.addr_shift
    }

    /// Addressing step, if it is a usable bus word size
    fn step(&self) -> Result<u32> {
        match self.addr_step {
            1 | 2 | 4 => Ok(self.addr_step as u32),
            _ => Err(Error::InvalidAlignment),
        }
    }

    fn delay(&self) {
        busy_wait(self.config.delay_loops);
    }

    fn clear_status(&mut self) {
        self.bus.write_command(CLEAR_STATUS_ADDR, CLEAR_STATUS);
    }
}

#[cfg(any(feature = "erase", feature = "program", feature = "lock"))]
impl<B: FlashBus> IntelStandard<'_, B> {
    /// Read the status register of a block
    pub fn read_status(&mut self, blk: BlockAddr) -> u32 {
        self.bus.write_command(blk.0, READ_STATUS);
        self.bus.read(self.byte_addr(blk))
    }

    fn status_check(&mut self, blk: BlockAddr) -> Result<()> {
        let status = self.read_status(blk);
        let res = self.masks.classify(status);
        if let Err(e) = res {
            log::warn!("intel: block {} status {:#010x}: {}", blk, status, e);
        }
        res
    }

    /// Poll until every lane reports ready
    fn wait_ready(&mut self, addr: u32) -> Result<()> {
        let mut polls: u32 = 0;
        loop {
            if self.masks.is_ready(self.bus.read(addr)) {
                return Ok(());
            }
            polls = polls.saturating_add(1);
            if let Some(limit) = self.config.poll_limit {
                if polls >= limit {
                    log::warn!("intel: not ready at {:#x} after {} polls", addr, polls);
                    return Err(Error::Timeout);
                }
            }
        }
    }

    #[cfg(any(feature = "erase", feature = "lock"))]
    fn change_lock(&mut self, blk: BlockAddr, cmd: u8) -> Result<()> {
        if !self.device.contains(self.byte_addr(blk)) {
            return Err(Error::AddressOutOfBounds);
        }

        self.bus.write_command(blk.0, CHANGE_LOCK);
        self.bus.write_command(blk.0, cmd);
        self.delay();

        let res = self.wait_ready(self.byte_addr(blk)).and_then(|()| {
            self.delay();
            self.status_check(blk)
        });
        self.reset_block(blk);
        res
    }
}

impl<B: FlashBus> FlashAlgorithm for IntelStandard<'_, B> {
    fn command_set(&self) -> CommandSet {
        self.device.command_set
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        if cfg!(feature = "erase") {
            caps |= Capabilities::ERASE;
        }
        if cfg!(feature = "program") {
            caps |= Capabilities::PROGRAM;
        }
        if cfg!(feature = "lock") {
            caps |= Capabilities::LOCK;
        }
        caps
    }

    fn descriptor(&self) -> &DeviceDescriptor {
        self.device
    }

    fn reset_device(&mut self) {
        let device = self.device;
        for start in device.blocks() {
            self.reset_block(self.block_addr(start));
        }
    }

    fn reset_block(&mut self, blk: BlockAddr) {
        self.clear_status();
        self.bus.write_command(blk.0, READ_ARRAY);
        self.delay();
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let len = u32::try_from(buf.len()).map_err(|_| Error::AddressOutOfBounds)?;
        if !self.device.contains_range(offset, len) {
            return Err(Error::AddressOutOfBounds);
        }

        let step = self.step()?;
        let mut pos = 0usize;
        while pos < buf.len() {
            let addr = offset + pos as u32;
            let aligned = addr - addr % step;
            let skip = (addr - aligned) as usize;
            let bytes = word_to_ne_bytes(self.bus.read(aligned), step as usize);
            let n = (step as usize - skip).min(buf.len() - pos);
            buf[pos..pos + n].copy_from_slice(&bytes[skip..skip + n]);
            pos += n;
        }
        Ok(())
    }

    #[cfg(feature = "erase")]
    fn erase_device(&mut self) -> Result<()> {
        let device = self.device;
        for start in device.blocks() {
            self.erase_block(self.block_addr(start))?;
        }
        Ok(())
    }

    #[cfg(feature = "erase")]
    fn erase_block(&mut self, blk: BlockAddr) -> Result<()> {
        let addr = self.byte_addr(blk);
        if !self.device.contains(addr) {
            return Err(Error::AddressOutOfBounds);
        }
        log::debug!("intel: erase block {} at {:#x}", blk, addr);

        if self.config.unlock_before_erase {
            self.change_lock(blk, CLEAR_LOCK_BITS)?;
        }

        self.bus.write_command(blk.0, BLOCK_ERASE);
        self.bus.write_command(blk.0, CONFIRM);
        self.delay();

        let res = self
            .wait_ready(addr)
            .and_then(|()| self.status_check(blk));
        self.reset_block(blk);
        res
    }

    #[cfg(feature = "program")]
    fn program(&mut self, offset: u32, data: &[u8], nbytes: u32) -> Result<()> {
        let step = self.step()?;
        if offset % step != 0 {
            return Err(Error::InvalidAlignment);
        }
        let rounded = nbytes
            .div_ceil(step)
            .checked_mul(step)
            .ok_or(Error::AddressOutOfBounds)?;
        if data.len() < rounded as usize {
            return Err(Error::BufferTooSmall);
        }
        if !self.device.contains_range(offset, rounded) {
            return Err(Error::AddressOutOfBounds);
        }
        log::debug!("intel: program {} bytes at {:#x}", rounded, offset);

        let mut blk = self.block_addr(offset);
        self.reset_block(blk);

        // The range check above keeps every word address within u32
        for (i, chunk) in data[..rounded as usize]
            .chunks_exact(step as usize)
            .enumerate()
        {
            let addr = offset + i as u32 * step;
            let word = word_from_ne_bytes(chunk);
            blk = self.block_addr(addr);
            log::trace!("intel: program word {:#x} at {:#x}", word, addr);

            self.bus.write_command(blk.0, PROGRAM_WORD);
            self.bus.write(addr, word);
            self.delay();

            if let Err(e) = self.wait_ready(addr).and_then(|()| self.status_check(blk)) {
                self.reset_block(blk);
                return Err(e);
            }
        }

        self.reset_block(blk);
        Ok(())
    }

    #[cfg(feature = "lock")]
    fn lock_block(&mut self, blk: BlockAddr) -> Result<()> {
        log::debug!("intel: lock block {}", blk);
        self.change_lock(blk, SET_LOCK_BIT)
    }

    #[cfg(feature = "lock")]
    fn unlock_block(&mut self, blk: BlockAddr) -> Result<()> {
        log::debug!("intel: unlock block {}", blk);
        self.change_lock(blk, CLEAR_LOCK_BITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusLayout, BusWidth};
    use crate::geometry::Region;
    use std::collections::VecDeque;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Read(u32),
        Write(u32, u32),
        Cmd(u32, u8),
    }

    /// Records every access and answers reads from a script
    ///
    /// Reads past the end of the script return ready in every lane.
    struct ScriptedBus {
        layout: BusLayout,
        script: VecDeque<u32>,
        ops: Vec<Op>,
    }

    impl ScriptedBus {
        fn new(layout: BusLayout) -> Self {
            Self {
                layout,
                script: VecDeque::new(),
                ops: Vec::new(),
            }
        }

        fn script(mut self, words: &[u32]) -> Self {
            self.script.extend(words.iter().copied());
            self
        }

        fn commands(&self, cmd: u8) -> Vec<u32> {
            self.ops
                .iter()
                .filter_map(|op| match *op {
                    Op::Cmd(addr, c) if c == cmd => Some(addr),
                    _ => None,
                })
                .collect()
        }
    }

    impl FlashBus for ScriptedBus {
        fn read(&mut self, addr: u32) -> u32 {
            self.ops.push(Op::Read(addr));
            let ready = self.layout.replicate(StatusBits::READY.bits());
            self.script.pop_front().unwrap_or(ready)
        }

        fn write(&mut self, addr: u32, word: u32) {
            self.ops.push(Op::Write(addr, word));
        }

        fn write_command(&mut self, cmd_addr: u32, cmd: u8) {
            self.ops.push(Op::Cmd(cmd_addr, cmd));
        }

        fn replicate(&self, byte: u8) -> u32 {
            self.layout.replicate(byte)
        }
    }

    const X16: BusLayout = BusLayout::single(BusWidth::X16);

    fn device() -> DeviceDescriptor {
        DeviceDescriptor::for_bus(&X16, CommandSet::IntelStandard)
            .with_region(Region::new(0, 64, 4))
            .unwrap()
            .with_region(Region::new(256, 128, 2))
            .unwrap()
    }

    fn status(bits: StatusBits) -> u32 {
        X16.replicate((StatusBits::READY | bits).bits())
    }

    fn config() -> Config {
        Config::default()
            .with_delay_loops(0)
            .with_unlock_before_erase(false)
    }

    #[test]
    fn test_setup_derives_interleaved_masks() {
        let layout = BusLayout::new(BusWidth::X32, 2).unwrap();
        let dev = DeviceDescriptor::for_bus(&layout, CommandSet::IntelStandard)
            .with_region(Region::new(0, 1024, 2))
            .unwrap();
        let algo = IntelStandard::new(ScriptedBus::new(layout), &dev);
        assert_eq!(algo.masks().ready, 0x0080_0080);
        assert_eq!(algo.masks().erase_error, 0x0020_0020);
        assert_eq!(algo.command_set(), CommandSet::IntelStandard);
    }

    #[test]
    fn test_reinit_is_idempotent() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        let before = *algo.masks();
        algo.reinit(&dev);
        algo.reinit(&dev);
        assert_eq!(*algo.masks(), before);
        assert_eq!(algo.block_addr(64), BlockAddr(32));
        assert_eq!(algo.byte_addr(BlockAddr(32)), 64);
    }

    #[test]
    fn test_reset_block_sequence() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        algo.reset_block(BlockAddr(32));
        assert_eq!(
            algo.bus().ops,
            [Op::Cmd(0, CLEAR_STATUS), Op::Cmd(32, READ_ARRAY)]
        );
    }

    #[test]
    fn test_reset_device_visits_every_block_in_order() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        algo.reset_device();
        assert_eq!(algo.bus().commands(READ_ARRAY), [0, 32, 64, 96, 128, 192]);
        assert_eq!(algo.bus().commands(CLEAR_STATUS).len(), 6);
    }

    #[cfg(feature = "erase")]
    #[test]
    fn test_erase_block_sequence() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        assert_eq!(algo.erase_block(BlockAddr(128)), Ok(()));
        assert_eq!(
            algo.bus().ops,
            [
                Op::Cmd(128, BLOCK_ERASE),
                Op::Cmd(128, CONFIRM),
                Op::Read(256),
                Op::Cmd(128, READ_STATUS),
                Op::Read(256),
                Op::Cmd(0, CLEAR_STATUS),
                Op::Cmd(128, READ_ARRAY),
            ]
        );
    }

    #[cfg(feature = "erase")]
    #[test]
    fn test_erase_block_unlocks_first() {
        let dev = device();
        let cfg = config().with_unlock_before_erase(true);
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, cfg);
        assert_eq!(algo.erase_block(BlockAddr(0)), Ok(()));
        assert_eq!(
            &algo.bus().ops[..4],
            [
                Op::Cmd(0, CHANGE_LOCK),
                Op::Cmd(0, CLEAR_LOCK_BITS),
                Op::Read(0),
                Op::Cmd(0, READ_STATUS),
            ]
        );
        assert_eq!(algo.bus().commands(BLOCK_ERASE), [0]);
    }

    #[cfg(feature = "erase")]
    #[test]
    fn test_failed_unlock_skips_erase() {
        let dev = device();
        let cfg = config().with_unlock_before_erase(true);
        let bus = ScriptedBus::new(X16)
            .script(&[status(StatusBits::empty()), status(StatusBits::LOCK_ERROR)]);
        let mut algo = IntelStandard::with_config(bus, &dev, cfg);
        assert_eq!(algo.erase_block(BlockAddr(0)), Err(Error::Lock));
        assert!(algo.bus().commands(BLOCK_ERASE).is_empty());
        assert_eq!(algo.bus().ops.last(), Some(&Op::Cmd(0, READ_ARRAY)));
    }

    #[cfg(feature = "erase")]
    #[test]
    fn test_erase_error_still_resets() {
        let dev = device();
        let bus = ScriptedBus::new(X16)
            .script(&[status(StatusBits::empty()), status(StatusBits::ERASE_ERROR)]);
        let mut algo = IntelStandard::with_config(bus, &dev, config());
        assert_eq!(algo.erase_block(BlockAddr(32)), Err(Error::Erase));
        let ops = &algo.bus().ops;
        assert_eq!(
            &ops[ops.len() - 2..],
            [Op::Cmd(0, CLEAR_STATUS), Op::Cmd(32, READ_ARRAY)]
        );
    }

    #[cfg(feature = "erase")]
    #[test]
    fn test_erase_device_stops_at_first_failure() {
        let dev = device();
        let ok = status(StatusBits::empty());
        // Each block is one ready poll plus one status read
        let bus = ScriptedBus::new(X16)
            .script(&[ok, ok, ok, ok, ok, status(StatusBits::ERASE_ERROR)]);
        let mut algo = IntelStandard::with_config(bus, &dev, config());
        assert_eq!(algo.erase_device(), Err(Error::Erase));
        assert_eq!(algo.bus().commands(BLOCK_ERASE), [0, 32, 64]);
    }

    #[cfg(feature = "erase")]
    #[test]
    fn test_erase_block_out_of_bounds() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        assert_eq!(algo.erase_block(BlockAddr(256)), Err(Error::AddressOutOfBounds));
        assert!(algo.bus().ops.is_empty());
    }

    #[cfg(feature = "erase")]
    #[test]
    fn test_erase_range_covers_partial_blocks() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        assert_eq!(algo.erase_range(100, 200), Ok(()));
        assert_eq!(algo.bus().commands(BLOCK_ERASE), [32, 64, 96, 128]);
    }

    #[cfg(feature = "erase")]
    #[test]
    fn test_timeout_resets_block() {
        let dev = device();
        let bus = ScriptedBus::new(X16).script(&[0, 0, 0, 0]);
        let mut algo = IntelStandard::with_config(bus, &dev, config().with_poll_limit(3));
        assert_eq!(algo.erase_block(BlockAddr(0)), Err(Error::Timeout));

        let ops = &algo.bus().ops;
        let polls = ops.iter().filter(|op| **op == Op::Read(0)).count();
        assert_eq!(polls, 3);
        assert!(algo.bus().commands(READ_STATUS).is_empty());
        assert_eq!(ops.last(), Some(&Op::Cmd(0, READ_ARRAY)));
    }

    #[cfg(feature = "program")]
    #[test]
    fn test_program_timeout_resets_block() {
        let dev = device();
        let bus = ScriptedBus::new(X16).script(&[0, 0, 0, 0]);
        let mut algo = IntelStandard::with_config(bus, &dev, config().with_poll_limit(3));
        assert_eq!(algo.program(64, &[0x12, 0x34, 0x56, 0x78], 4), Err(Error::Timeout));

        let bus = algo.bus();
        assert_eq!(bus.commands(PROGRAM_WORD), [32]);
        assert_eq!(bus.ops.iter().filter(|op| **op == Op::Read(64)).count(), 3);
        assert!(bus.commands(READ_STATUS).is_empty());
        assert_eq!(bus.ops.last(), Some(&Op::Cmd(32, READ_ARRAY)));
    }

    #[cfg(feature = "program")]
    #[test]
    fn test_program_last_byte_of_address_space() {
        let x8 = BusLayout::single(BusWidth::X8);
        let dev = DeviceDescriptor::for_bus(&x8, CommandSet::IntelStandard)
            .with_region(Region::new(0xFFFF_0000, 0x1_0000, 1))
            .unwrap();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(x8), &dev, config());
        assert_eq!(algo.program(0xFFFF_FFFF, &[0x12], 1), Ok(()));
        assert!(algo.bus().ops.contains(&Op::Write(0xFFFF_FFFF, 0x12)));
        assert_eq!(algo.bus().ops.last(), Some(&Op::Cmd(0xFFFF_FFFF, READ_ARRAY)));

        let dev = DeviceDescriptor::for_bus(&x8, CommandSet::IntelStandard)
            .with_region(Region::new(0xFFFF_0000, 0xFFFF, 1))
            .unwrap();
        assert_eq!(dev.validate(), Ok(()));
        let mut algo = IntelStandard::with_config(ScriptedBus::new(x8), &dev, config());
        assert_eq!(algo.program(0xFFFF_FFFC, &[1, 2, 3], 3), Ok(()));
        assert_eq!(algo.bus().commands(PROGRAM_WORD), [0xFFFF_FFFC, 0xFFFF_FFFD, 0xFFFF_FFFE]);
        assert_eq!(algo.program(0xFFFF_FFFF, &[0x12], 1), Err(Error::AddressOutOfBounds));
    }

    #[cfg(feature = "program")]
    #[test]
    fn test_program_ten_bytes_takes_five_cycles() {
        let dev = device();
        let data = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA];
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        assert_eq!(algo.program(0, &data, 10), Ok(()));

        let bus = algo.bus();
        assert_eq!(bus.commands(PROGRAM_WORD), [0, 1, 2, 3, 4]);
        assert_eq!(bus.commands(READ_STATUS), [0, 1, 2, 3, 4]);
        let writes: Vec<_> = bus
            .ops
            .iter()
            .filter_map(|op| match *op {
                Op::Write(addr, word) => Some((addr, word)),
                _ => None,
            })
            .collect();
        assert_eq!(writes.len(), 5);
        assert_eq!(writes[0], (0, u16::from_ne_bytes([0x11, 0x22]) as u32));
        assert_eq!(writes[4], (8, u16::from_ne_bytes([0x99, 0xAA]) as u32));
        assert_eq!(bus.ops.last(), Some(&Op::Cmd(4, READ_ARRAY)));
    }

    #[cfg(feature = "program")]
    #[test]
    fn test_program_rounds_up_to_step() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        assert_eq!(algo.program(0, &[1, 2, 3, 4, 5, 0xFF], 5), Ok(()));
        assert_eq!(algo.bus().commands(PROGRAM_WORD).len(), 3);
    }

    #[cfg(feature = "program")]
    #[test]
    fn test_program_short_buffer_touches_nothing() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        assert_eq!(algo.program(0, &[1, 2, 3, 4, 5], 5), Err(Error::BufferTooSmall));
        assert!(algo.bus().ops.is_empty());
    }

    #[cfg(feature = "program")]
    #[test]
    fn test_program_checks_alignment_and_bounds() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        assert_eq!(algo.program(1, &[0; 2], 2), Err(Error::InvalidAlignment));
        assert_eq!(algo.program(510, &[0; 4], 4), Err(Error::AddressOutOfBounds));
        assert!(algo.bus().ops.is_empty());
    }

    #[cfg(feature = "program")]
    #[test]
    fn test_program_aborts_on_second_word() {
        let dev = device();
        let ok = status(StatusBits::empty());
        let bus = ScriptedBus::new(X16).script(&[ok, ok, ok, status(StatusBits::PROGRAM_ERROR)]);
        let mut algo = IntelStandard::with_config(bus, &dev, config());
        assert_eq!(algo.program(64, &[0; 8], 8), Err(Error::Program));

        let bus = algo.bus();
        assert_eq!(bus.commands(PROGRAM_WORD), [32, 33]);
        assert_eq!(
            &bus.ops[bus.ops.len() - 2..],
            [Op::Cmd(0, CLEAR_STATUS), Op::Cmd(33, READ_ARRAY)]
        );
    }

    #[cfg(feature = "lock")]
    #[test]
    fn test_lock_sequence() {
        let dev = device();
        let mut algo = IntelStandard::with_config(ScriptedBus::new(X16), &dev, config());
        assert_eq!(algo.lock_block(BlockAddr(32)), Ok(()));
        assert_eq!(
            algo.bus().ops,
            [
                Op::Cmd(32, CHANGE_LOCK),
                Op::Cmd(32, SET_LOCK_BIT),
                Op::Read(64),
                Op::Cmd(32, READ_STATUS),
                Op::Read(64),
                Op::Cmd(0, CLEAR_STATUS),
                Op::Cmd(32, READ_ARRAY),
            ]
        );
    }

    #[cfg(feature = "lock")]
    #[test]
    fn test_lock_timeout_resets_block() {
        let dev = device();
        let bus = ScriptedBus::new(X16).script(&[0, 0, 0, 0]);
        let mut algo = IntelStandard::with_config(bus, &dev, config().with_poll_limit(3));
        assert_eq!(algo.lock_block(BlockAddr(128)), Err(Error::Timeout));

        let bus = algo.bus();
        assert_eq!(bus.commands(CHANGE_LOCK), [128]);
        assert_eq!(bus.commands(SET_LOCK_BIT), [128]);
        assert_eq!(bus.ops.iter().filter(|op| **op == Op::Read(256)).count(), 3);
        assert!(bus.commands(READ_STATUS).is_empty());
        assert_eq!(bus.ops.last(), Some(&Op::Cmd(128, READ_ARRAY)));
    }

    #[cfg(feature = "lock")]
    #[test]
    fn test_unlock_reports_lock_error() {
        let dev = device();
        let bus = ScriptedBus::new(X16)
            .script(&[status(StatusBits::empty()), status(StatusBits::LOCK_ERROR)]);
        let mut algo = IntelStandard::with_config(bus, &dev, config());
        assert_eq!(algo.unlock_block(BlockAddr(0)), Err(Error::Lock));
        assert_eq!(algo.bus().commands(CLEAR_LOCK_BITS), [0]);
        assert_eq!(algo.bus().ops.last(), Some(&Op::Cmd(0, READ_ARRAY)));
    }

    #[test]
    fn test_read_unaligned() {
        let dev = device();
        let bus = ScriptedBus::new(X16).script(&[
            u16::from_ne_bytes([0xA0, 0xA1]) as u32,
            u16::from_ne_bytes([0xA2, 0xA3]) as u32,
        ]);
        let mut algo = IntelStandard::with_config(bus, &dev, config());
        let mut buf = [0u8; 3];
        assert_eq!(algo.read(1, &mut buf), Ok(()));
        assert_eq!(buf, [0xA1, 0xA2, 0xA3]);
        assert_eq!(algo.bus().ops, [Op::Read(0), Op::Read(2)]);

        assert_eq!(algo.read(511, &mut buf), Err(Error::AddressOutOfBounds));
    }

    #[test]
    fn test_capabilities_follow_features() {
        let dev = device();
        let algo = IntelStandard::new(ScriptedBus::new(X16), &dev);
        let caps = algo.capabilities();
        assert_eq!(caps.contains(Capabilities::ERASE), cfg!(feature = "erase"));
        assert_eq!(caps.contains(Capabilities::PROGRAM), cfg!(feature = "program"));
        assert_eq!(caps.contains(Capabilities::LOCK), cfg!(feature = "lock"));
    }
}
