//! Host command dispatcher
//!
//! The [`Dispatcher`] is the writer's state machine. It takes one host
//! request at a time, runs it against a [`FlashAlgorithm`] and builds the
//! reply message. It never touches the bus itself.

mod mailbox;

pub use mailbox::{
    HostCommand, Mailbox, WriterStatus, DEV_ALGO_PARAM, ERR_CODE_PARAM, MAILBOX_SIZE, MAX_PARAMS,
    NBYTES_PARAM, OFFSET_PARAM, SRCADDR_PARAM,
};

use crate::algorithm::FlashAlgorithm;
use crate::bus::MAX_WORD_BYTES;
use crate::error::{Error, Outcome, Result};

/// Chunk size used when reading back programmed data
const VERIFY_CHUNK: usize = 64;

/// Writer state machine bound to one algorithm
pub struct Dispatcher<A: FlashAlgorithm> {
    algo: A,
    exited: bool,
}

impl<A: FlashAlgorithm> Dispatcher<A> {
    /// Wrap an algorithm that has already run its parameter setup
    pub fn new(algo: A) -> Self {
        Self {
            algo,
            exited: false,
        }
    }

    /// The algorithm being driven
    pub fn algorithm(&self) -> &A {
        &self.algo
    }

    /// The algorithm being driven, mutably
    pub fn algorithm_mut(&mut self) -> &mut A {
        &mut self.algo
    }

    /// Unwrap the algorithm
    pub fn into_inner(self) -> A {
        self.algo
    }

    /// Check if the host has sent `Exit`
    pub fn has_exited(&self) -> bool {
        self.exited
    }

    /// Run one host request and build the reply
    ///
    /// `payload` is the transfer buffer for `Program`, or the memory at the
    /// source address for `Batch`. Other commands ignore it.
    pub fn handle(&mut self, request: &Mailbox, payload: &[u8]) -> Mailbox {
        let mut reply = Mailbox::empty();

        let Some(cmd) = request.command() else {
            log::debug!("dispatch: ignoring unknown command {:#04x}", request.cmd);
            return reply;
        };

        let param = request.param;
        let res = match cmd {
            HostCommand::None | HostCommand::Reply => return reply,
            HostCommand::Exit => {
                log::info!("dispatch: exit");
                self.exited = true;
                reply.status = WriterStatus::Exit as u8;
                return reply;
            }
            HostCommand::Query => {
                reply.cmd = HostCommand::Reply as u8;
                reply.param[DEV_ALGO_PARAM] = self.algo.command_set().code() as u32;
                Ok(())
            }
            HostCommand::Init => {
                reply.cmd = HostCommand::Reply as u8;
                Ok(())
            }
            HostCommand::Reset => {
                self.algo.reset_device();
                Ok(())
            }
            HostCommand::EraseDevice => self.algo.erase_device(),
            HostCommand::BlockErase => self
                .algo
                .erase_range(param[OFFSET_PARAM], param[NBYTES_PARAM]),
            HostCommand::Program => {
                self.program(param[OFFSET_PARAM], payload, param[NBYTES_PARAM], true)
            }
            HostCommand::Batch => {
                log::debug!("dispatch: batch from {:#x}", param[SRCADDR_PARAM]);
                self.program(param[OFFSET_PARAM], payload, param[NBYTES_PARAM], false)
            }
        };

        // Param 0 carries the query result on success, so only failures write it
        match Outcome::from(res) {
            Outcome::Ready => reply.status = WriterStatus::Success as u8,
            failed => {
                log::error!("dispatch: {:?} failed: {}", cmd, failed);
                reply.status = WriterStatus::Error as u8;
                reply.param[ERR_CODE_PARAM] = failed.code() as u32;
            }
        }
        reply
    }

    fn program(&mut self, offset: u32, payload: &[u8], nbytes: u32, verify: bool) -> Result<()> {
        let data = payload
            .get(..nbytes as usize)
            .ok_or(Error::BufferTooSmall)?;
        log::debug!("dispatch: program {} bytes at {:#x}", nbytes, offset);

        let step = self.algo.descriptor().addr_step as usize;
        if step == 0 || step > MAX_WORD_BYTES {
            return Err(Error::InvalidAlignment);
        }

        // Whole words straight from the payload, then a partial last word
        // padded with the erased value
        let whole = data.len() / step * step;
        if whole > 0 {
            self.algo.program(offset, &data[..whole], whole as u32)?;
        }
        let tail = &data[whole..];
        if !tail.is_empty() {
            let mut word = [0xFFu8; MAX_WORD_BYTES];
            word[..tail.len()].copy_from_slice(tail);
            let tail_offset = offset
                .checked_add(whole as u32)
                .ok_or(Error::AddressOutOfBounds)?;
            self.algo.program(tail_offset, &word[..step], step as u32)?;
        }

        if verify {
            self.verify(offset, data)?;
        }
        Ok(())
    }

    fn verify(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        let mut readback = [0u8; VERIFY_CHUNK];
        for (i, chunk) in data.chunks(VERIFY_CHUNK).enumerate() {
            let addr = u32::try_from(i * VERIFY_CHUNK)
                .ok()
                .and_then(|pos| offset.checked_add(pos))
                .ok_or(Error::AddressOutOfBounds)?;
            let buf = &mut readback[..chunk.len()];
            self.algo.read(addr, buf)?;
            if buf != chunk {
                log::warn!("dispatch: verify mismatch near {:#x}", addr);
                return Err(Error::VerifyFailed);
            }
        }
        Ok(())
    }
}
