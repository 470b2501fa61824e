//! Write command implementation

use super::{check_range, erase, progress_bar, send};
use crate::error::CliError;
use norwriter_core::dispatch::{Dispatcher, HostCommand, MAX_PARAMS};
use norwriter_core::FlashAlgorithm;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Program a file at `offset`, optionally erasing the covered blocks first
///
/// The file is sent to the writer in `chunk`-byte transfers, each one
/// programmed and verified before the next is sent.
pub fn run_write<A: FlashAlgorithm>(
    writer: &mut Dispatcher<A>,
    input: &Path,
    offset: u32,
    chunk: usize,
    erase_first: bool,
) -> Result<(), CliError> {
    let mut file = File::open(input)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    check_range(writer.algorithm(), offset, data.len())?;
    if data.is_empty() {
        println!("Nothing to write");
        return Ok(());
    }

    if erase_first {
        erase::erase_blocks(writer, offset, data.len() as u32)?;
    }

    write_with_progress(writer, offset, &data, chunk)?;
    println!("Wrote {} bytes at {:#x}", data.len(), offset);
    Ok(())
}

fn write_with_progress<A: FlashAlgorithm>(
    writer: &mut Dispatcher<A>,
    offset: u32,
    data: &[u8],
    chunk: usize,
) -> Result<(), CliError> {
    send(writer, HostCommand::Init, [0; MAX_PARAMS], &[])?;

    // Every transfer but the last must end on a word boundary
    let step = writer.algorithm().descriptor().addr_step.max(1) as usize;
    let chunk = chunk.max(step).div_ceil(step) * step;
    log::debug!("programming {} bytes in {}-byte transfers", data.len(), chunk);

    let pb = progress_bar(data.len() as u64, "Writing");
    let mut addr = offset;
    for transfer in data.chunks(chunk) {
        let param = [addr, transfer.len() as u32, 0, 0];
        if let Err(e) = send(writer, HostCommand::Program, param, transfer) {
            pb.abandon_with_message("Write failed");
            return Err(e);
        }
        addr += transfer.len() as u32;
        pb.inc(transfer.len() as u64);
    }
    pb.finish_with_message("Write complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::*;
    use norwriter_core::intel::opcodes;
    use norwriter_core::{Config, Error, IntelStandard};
    use norwriter_dummy::{DummyConfig, DummyFlash};

    fn write_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = scratch_path(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_write_odd_length_in_small_chunks() {
        let dev = device();
        let traced = DummyConfig {
            trace: true,
            ..Default::default()
        };
        let mut flash = DummyFlash::new(X16, dev.clone(), traced);
        let input = write_file("write-odd.bin", b"hello flash");
        {
            let algo = IntelStandard::with_config(&mut flash, &dev, Config::default());
            let mut writer = Dispatcher::new(algo);
            // 3-byte transfers round up to two words each
            run_write(&mut writer, &input, 0x10, 3, false).unwrap();
        }
        std::fs::remove_file(&input).ok();

        assert_eq!(&flash.data()[0x10..0x10 + 11], b"hello flash");
        assert_eq!(flash.data()[0x10 + 11], 0xFF);
        assert_eq!(flash.command_count(opcodes::PROGRAM_WORD), 6);
    }

    #[test]
    fn test_write_with_erase() {
        let dev = device();
        let mut flash =
            DummyFlash::with_data(X16, dev.clone(), DummyConfig::default(), &[0u8; 4096]);
        let image: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let input = write_file("write-erase.bin", &image);
        {
            let algo = IntelStandard::with_config(&mut flash, &dev, Config::default());
            let mut writer = Dispatcher::new(algo);
            run_write(&mut writer, &input, 200, 128, true).unwrap();
        }
        std::fs::remove_file(&input).ok();

        assert_eq!(flash.erase_log(), [0, 256]);
        assert_eq!(&flash.data()[200..500], &image[..]);
        assert!(flash.data()[..200].iter().all(|&b| b == 0xFF));
        assert!(flash.data()[500..512].iter().all(|&b| b == 0xFF));
        assert!(flash.data()[512..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_without_erase_fails_verify() {
        let dev = device();
        let mut flash =
            DummyFlash::with_data(X16, dev.clone(), DummyConfig::default(), &[0u8; 4096]);
        let input = write_file("write-verify.bin", &[0xA5; 8]);
        let res = {
            let algo = IntelStandard::with_config(&mut flash, &dev, Config::default());
            let mut writer = Dispatcher::new(algo);
            run_write(&mut writer, &input, 0, 4096, false)
        };
        std::fs::remove_file(&input).ok();

        match res {
            Err(CliError::Writer { command, code }) => {
                assert_eq!(command, HostCommand::Program);
                assert_eq!(code, Error::VerifyFailed.code() as u32);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_write_too_large() {
        let dev = device();
        let traced = DummyConfig {
            trace: true,
            ..Default::default()
        };
        let mut flash = DummyFlash::new(X16, dev.clone(), traced);
        let input = write_file("write-large.bin", &[0u8; 64]);
        let res = {
            let algo = IntelStandard::new(&mut flash, &dev);
            let mut writer = Dispatcher::new(algo);
            run_write(&mut writer, &input, 4064, 4096, false)
        };
        std::fs::remove_file(&input).ok();
        assert!(matches!(res, Err(CliError::OutOfRange { .. })));
        assert_eq!(flash.command_count(opcodes::PROGRAM_WORD), 0);
    }
}
