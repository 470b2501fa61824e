//! Backing file for the emulated flash
//!
//! The array contents live in a raw image file. Lock bits are not part of
//! the array, so they are kept next to it in `<image>.lock`, one hex block
//! offset per line.

use crate::error::CliError;
use norwriter_core::bus::BusLayout;
use norwriter_core::geometry::DeviceDescriptor;
use norwriter_dummy::{DummyConfig, DummyFlash};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Path of the lock sidecar for an image
pub fn lock_path(image: &Path) -> PathBuf {
    let mut name = OsString::from(image.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Open an image as a dummy flash
///
/// A missing image starts out erased. A short image is padded with the
/// erased value.
pub fn open(
    image: &Path,
    layout: BusLayout,
    device: DeviceDescriptor,
) -> Result<DummyFlash, CliError> {
    let size = device.total_size() as usize;
    let mut flash = match fs::read(image) {
        Ok(data) => {
            if data.len() > size {
                return Err(CliError::ImageTooLarge {
                    expected: size,
                    actual: data.len(),
                });
            }
            log::debug!("loaded {} of {} bytes from {:?}", data.len(), size, image);
            DummyFlash::with_data(layout, device, DummyConfig::default(), &data)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("{:?} does not exist, starting from an erased device", image);
            DummyFlash::new(layout, device, DummyConfig::default())
        }
        Err(e) => return Err(e.into()),
    };

    for offset in load_locks(&lock_path(image))? {
        if !flash.set_lock_bit(offset, true) {
            log::warn!("ignoring lock bit outside the device at {:#x}", offset);
        }
    }
    Ok(flash)
}

/// Write the array and lock bits back to disk
pub fn save(image: &Path, flash: &DummyFlash) -> Result<(), CliError> {
    fs::write(image, flash.data())?;

    let locks = flash.locked_blocks();
    let path = lock_path(image);
    if locks.is_empty() {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    } else {
        let text: String = locks.iter().map(|o| format!("{:#x}\n", o)).collect();
        fs::write(&path, text)?;
    }
    log::debug!("saved {:?} ({} locked block(s))", image, locks.len());
    Ok(())
}

fn load_locks(path: &Path) -> Result<Vec<u32>, CliError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut offsets = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let digits = line
            .strip_prefix("0x")
            .or_else(|| line.strip_prefix("0X"))
            .unwrap_or(line);
        match u32::from_str_radix(digits, 16) {
            Ok(offset) => offsets.push(offset),
            Err(_) => log::warn!("{:?}: ignoring bad lock entry '{}'", path, line),
        }
    }
    Ok(offsets)
}
