//! Read command implementation

use super::{check_range, progress_bar};
use crate::error::CliError;
use norwriter_core::FlashAlgorithm;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

/// Read `length` bytes at `offset` (default: to the end of the flash) into a file
pub fn run_read<A: FlashAlgorithm>(
    algo: &mut A,
    output: &Path,
    offset: u32,
    length: Option<u32>,
) -> Result<(), CliError> {
    let total = algo.descriptor().total_size();
    let length = length.unwrap_or_else(|| total.saturating_sub(offset));
    check_range(algo, offset, length as usize)?;

    let data = read_with_progress(algo, offset, length as usize)?;

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

/// Read a range of array data with a progress bar
pub fn read_with_progress<A: FlashAlgorithm>(
    algo: &mut A,
    offset: u32,
    len: usize,
) -> Result<Vec<u8>, CliError> {
    let mut data = vec![0u8; len];
    let pb = progress_bar(len as u64, "Reading");

    let mut pos = 0usize;
    for chunk in data.chunks_mut(READ_CHUNK_SIZE) {
        if let Err(e) = algo.read(offset + pos as u32, chunk) {
            pb.abandon_with_message("Read failed");
            return Err(e.into());
        }
        pos += chunk.len();
        pb.set_position(pos as u64);
    }

    pb.finish_with_message("Read complete");
    Ok(data)
}
