//! norwriter-core - Intel standard command set NOR flash algorithm
//!
//! This crate provides the flash algorithm that a debug host loads onto a
//! target to erase, program and lock parallel NOR flash. It is `no_std` and
//! allocation-free so it can run from on-chip RAM next to the flash it
//! programs.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`) and the
//!   TOML geometry loader
//! - `alloc` - Enable heap allocation
//! - `erase`, `program`, `lock` - Operations compiled into the algorithm
//! - `unlock-before-erase` - Clear a block's lock bit before erasing it by
//!   default
//!
//! # Example
//!
//! ```ignore
//! use norwriter_core::algorithm::FlashAlgorithm;
//! use norwriter_core::bus::{BusLayout, BusWidth, MmioBus};
//! use norwriter_core::geometry::{DeviceDescriptor, Region};
//! use norwriter_core::{CommandSet, IntelStandard};
//!
//! let layout = BusLayout::new(BusWidth::X32, 2).unwrap();
//! let device = DeviceDescriptor::for_bus(&layout, CommandSet::IntelStandard)
//!     .with_region(Region::new(0, 0x40000, 64))?;
//! let bus = unsafe { MmioBus::new(0x2000_0000 as *mut u8, layout) };
//!
//! let mut algo = IntelStandard::new(bus, &device);
//! algo.erase_device()?;
//! algo.program(0, &image, image.len() as u32)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod algorithm;
pub mod bus;
pub mod delay;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod intel;

pub use algorithm::{Capabilities, CommandSet, Config, FlashAlgorithm};
pub use error::{Error, Outcome, Result};
pub use intel::IntelStandard;
