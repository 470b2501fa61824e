//! Erase and reset commands

use super::{block_bar, check_range, send, spinner};
use crate::error::CliError;
use norwriter_core::dispatch::{Dispatcher, HostCommand, MAX_PARAMS};
use norwriter_core::FlashAlgorithm;

/// Return every block to read-array mode
pub fn run_reset<A: FlashAlgorithm>(writer: &mut Dispatcher<A>) -> Result<(), CliError> {
    send(writer, HostCommand::Reset, [0; MAX_PARAMS], &[])?;
    println!("Device reset to read-array mode");
    Ok(())
}

/// Erase the whole device, or every block overlapping `range`
pub fn run_erase<A: FlashAlgorithm>(
    writer: &mut Dispatcher<A>,
    range: Option<(u32, u32)>,
) -> Result<(), CliError> {
    match range {
        None => erase_device(writer),
        Some((offset, length)) => {
            let blocks = erase_blocks(writer, offset, length)?;
            println!(
                "Erased {} block(s) covering {:#x}..{:#x}",
                blocks,
                offset,
                offset as u64 + length as u64
            );
            Ok(())
        }
    }
}

fn erase_device<A: FlashAlgorithm>(writer: &mut Dispatcher<A>) -> Result<(), CliError> {
    let total = writer.algorithm().descriptor().total_size();
    let pb = spinner(format!("Erasing {} bytes (this may take a while)...", total));

    let res = send(writer, HostCommand::EraseDevice, [0; MAX_PARAMS], &[]);
    match res {
        Ok(_) => {
            pb.finish_with_message("Erase complete");
            println!("Erased {} bytes", total);
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("Erase failed");
            Err(e)
        }
    }
}

/// Erase block by block so progress can be shown, returning the block count
pub(crate) fn erase_blocks<A: FlashAlgorithm>(
    writer: &mut Dispatcher<A>,
    offset: u32,
    length: u32,
) -> Result<usize, CliError> {
    if length == 0 {
        return Ok(0);
    }
    check_range(writer.algorithm(), offset, length as usize)?;

    let device = writer.algorithm().descriptor();
    let blocks: Vec<(u32, u32)> = device
        .blocks_in(offset, length)
        .filter_map(|start| device.region_at(start).map(|r| (start, r.block_size)))
        .collect();
    log::debug!("erasing {} block(s) from {:#x}", blocks.len(), offset);

    let pb = block_bar(blocks.len() as u64, "Erasing");
    for &(start, size) in &blocks {
        if let Err(e) = send(writer, HostCommand::BlockErase, [start, size, 0, 0], &[]) {
            pb.abandon_with_message("Erase failed");
            return Err(e);
        }
        pb.inc(1);
    }
    pb.finish_with_message("Erase complete");

    Ok(blocks.len())
}
