//! CLI command implementations
//!
//! Commands that change the flash go through the [`Dispatcher`] exactly the
//! way a debug host would: fill in a mailbox request, hand over the transfer
//! buffer and check the reply status. Reads, lock changes and `info` use the
//! algorithm directly.

mod erase;
mod info;
mod lock;
mod read;
mod write;

pub use erase::{run_erase, run_reset};
pub use info::run_info;
pub use lock::run_lock;
pub use read::run_read;
pub use write::run_write;

use crate::error::CliError;
use indicatif::{ProgressBar, ProgressStyle};
use norwriter_core::dispatch::{
    Dispatcher, HostCommand, Mailbox, WriterStatus, ERR_CODE_PARAM, MAX_PARAMS,
};
use norwriter_core::FlashAlgorithm;
use std::time::Duration;

/// Send one request to the writer and check that it succeeded
pub fn send<A: FlashAlgorithm>(
    writer: &mut Dispatcher<A>,
    command: HostCommand,
    param: [u32; MAX_PARAMS],
    payload: &[u8],
) -> Result<Mailbox, CliError> {
    let reply = writer.handle(&Mailbox::request(command, param), payload);
    match reply.writer_status() {
        Some(WriterStatus::Success) => Ok(reply),
        Some(WriterStatus::Error) => Err(CliError::Writer {
            command,
            code: reply.param[ERR_CODE_PARAM],
        }),
        _ => Err(CliError::UnexpectedStatus {
            command,
            status: reply.status,
        }),
    }
}

/// Tell the writer the session is over
pub fn finish<A: FlashAlgorithm>(writer: &mut Dispatcher<A>) {
    let reply = writer.handle(&Mailbox::request(HostCommand::Exit, [0; MAX_PARAMS]), &[]);
    log::debug!("writer exit status {:?}", reply.writer_status());
}

fn progress_bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

fn block_bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} blocks ({{eta}}) {}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Check that `len` bytes at `offset` fit in the device
fn check_range<A: FlashAlgorithm>(algo: &A, offset: u32, len: usize) -> Result<(), CliError> {
    let size = algo.descriptor().total_size();
    let fits = u32::try_from(len)
        .ok()
        .map_or(false, |len| algo.descriptor().contains_range(offset, len));
    if fits {
        Ok(())
    } else {
        Err(CliError::OutOfRange { offset, len, size })
    }
}
