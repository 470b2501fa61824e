//! Block lock commands

use crate::error::CliError;
use norwriter_core::FlashAlgorithm;

/// Set or clear the lock bit of the block containing `offset`
pub fn run_lock<A: FlashAlgorithm>(algo: &mut A, offset: u32, lock: bool) -> Result<(), CliError> {
    let device = algo.descriptor();
    let start = device.block_start(offset).ok_or(CliError::OutOfRange {
        offset,
        len: 1,
        size: device.total_size(),
    })?;
    let blk = device.block_addr(start);

    if lock {
        algo.lock_block(blk)?;
        println!("Locked block at {:#x}", start);
    } else {
        algo.unlock_block(blk)?;
        println!("Unlocked block at {:#x}", start);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::*;
    use norwriter_core::{Config, Error, IntelStandard};

    #[test]
    fn test_lock_then_unlock() {
        let dev = device();
        let mut flash = flash(&dev);
        {
            let mut algo = IntelStandard::with_config(&mut flash, &dev, Config::default());
            run_lock(&mut algo, 1500, true).unwrap();
        }
        assert!(flash.is_locked(1024));
        assert_eq!(flash.locked_blocks(), [1024]);

        {
            let mut algo = IntelStandard::with_config(&mut flash, &dev, Config::default());
            run_lock(&mut algo, 1024, false).unwrap();
        }
        assert!(flash.locked_blocks().is_empty());
    }

    #[test]
    fn test_locked_block_refuses_erase() {
        let dev = device();
        let mut flash = flash(&dev);
        let config = Config::default().with_unlock_before_erase(false);
        let mut algo = IntelStandard::with_config(&mut flash, &dev, config);
        run_lock(&mut algo, 0, true).unwrap();

        let blk = algo.block_addr(0);
        assert_eq!(algo.erase_block(blk), Err(Error::Erase));
    }

    #[test]
    fn test_lock_out_of_range() {
        let dev = device();
        let mut flash = flash(&dev);
        let mut algo = IntelStandard::new(&mut flash, &dev);
        assert!(matches!(
            run_lock(&mut algo, 4096, true),
            Err(CliError::OutOfRange { offset: 4096, .. })
        ));
    }
}
