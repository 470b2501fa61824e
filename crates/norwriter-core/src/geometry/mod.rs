//! Device geometry
//!
//! A [`DeviceDescriptor`] is what CFI discovery produces: the addressing
//! parameters of the bus and the erase block layout of the array. The
//! algorithm only reads it.
//!
//! Blocks are addressed two ways. Byte offsets index the flash window and are
//! used for data reads and writes. Block addresses ([`BlockAddr`]) are byte
//! offsets shifted right by the address shift and are used for command writes.

#[cfg(feature = "std")]
mod toml;

#[cfg(feature = "std")]
pub use self::toml::Geometry;

use core::fmt;

use crate::algorithm::CommandSet;
use crate::bus::BusLayout;

/// Maximum number of erase regions a descriptor can hold
pub const MAX_REGIONS: usize = 8;

/// Contiguous run of equally sized erase blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    /// Byte offset of the first block
    pub offset: u32,
    /// Size of each block in bytes
    pub block_size: u32,
    /// Number of blocks
    pub block_count: u32,
}

impl Region {
    /// Create a new region
    pub const fn new(offset: u32, block_size: u32, block_count: u32) -> Self {
        Self {
            offset,
            block_size,
            block_count,
        }
    }

    /// Total size of this region in bytes, saturating at `u32::MAX`
    pub const fn total_size(&self) -> u32 {
        self.block_size.saturating_mul(self.block_count)
    }

    /// Byte offset just past the last block, saturating at `u32::MAX`
    pub const fn end(&self) -> u32 {
        self.offset.saturating_add(self.total_size())
    }

    /// Check if a byte offset is inside this region
    pub const fn contains(&self, offset: u32) -> bool {
        let end = self.offset as u64 + self.block_size as u64 * self.block_count as u64;
        offset >= self.offset && (offset as u64) < end
    }
}

/// Command address of an erase block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockAddr(pub u32);

impl fmt::Display for BlockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Errors found while building or validating a geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// Geometry file could not be read
    Io,
    /// Geometry file is malformed
    Parse,
    /// Bus width or interleave is not a valid combination
    InvalidBus,
    /// Command set name not recognized
    UnknownCommandSet,
    /// No regions defined
    NoRegions,
    /// More than [`MAX_REGIONS`] regions
    TooManyRegions,
    /// Region with zero block size or block count
    EmptyRegion {
        /// Index of the offending region
        index: usize,
    },
    /// Region does not start where the previous one ends
    NotContiguous {
        /// Index of the offending region
        index: usize,
    },
    /// Geometry extends past 4 GiB
    Overflow,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "cannot read geometry file"),
            Self::Parse => write!(f, "malformed geometry file"),
            Self::InvalidBus => write!(f, "invalid bus width/interleave combination"),
            Self::UnknownCommandSet => write!(f, "unknown command set"),
            Self::NoRegions => write!(f, "geometry has no regions"),
            Self::TooManyRegions => write!(f, "more than {} regions", MAX_REGIONS),
            Self::EmptyRegion { index } => write!(f, "region {} has no blocks", index),
            Self::NotContiguous { index } => {
                write!(f, "region {} does not follow the previous region", index)
            }
            Self::Overflow => write!(f, "geometry exceeds the 32-bit address space"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GeometryError {}

/// Addressing parameters and block layout of a flash device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Bytes written per program cycle (one bus word)
    pub addr_step: u8,
    /// Shift converting a byte offset into a block address
    pub addr_shift: u8,
    /// Command set reported by the part
    pub command_set: CommandSet,
    /// Erase regions, ordered by offset
    pub regions: heapless::Vec<Region, MAX_REGIONS>,
}

impl DeviceDescriptor {
    /// Create a descriptor with no regions
    pub const fn new(addr_step: u8, addr_shift: u8, command_set: CommandSet) -> Self {
        Self {
            addr_step,
            addr_shift,
            command_set,
            regions: heapless::Vec::new(),
        }
    }

    /// Create a descriptor whose addressing matches a bus layout
    pub const fn for_bus(layout: &BusLayout, command_set: CommandSet) -> Self {
        Self::new(layout.bytes(), layout.addr_shift(), command_set)
    }

    /// Append a region
    pub fn push_region(&mut self, region: Region) -> Result<(), GeometryError> {
        self.regions
            .push(region)
            .map_err(|_| GeometryError::TooManyRegions)
    }

    /// Builder-style variant of [`push_region`](Self::push_region)
    pub fn with_region(mut self, region: Region) -> Result<Self, GeometryError> {
        self.push_region(region)?;
        Ok(self)
    }

    /// Erase regions in offset order
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Total size covered by all regions
    pub fn total_size(&self) -> u32 {
        self.regions
            .iter()
            .fold(0u32, |acc, r| acc.saturating_add(r.total_size()))
    }

    /// Total number of erase blocks
    pub fn block_count(&self) -> u32 {
        self.regions
            .iter()
            .fold(0u32, |acc, r| acc.saturating_add(r.block_count))
    }

    /// Check that regions are non-empty, contiguous and fit in 32 bits
    ///
    /// The end offset of the last region must itself be a `u32`, so a
    /// device can reach `0xFFFF_FFFF` but not include it.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.regions.is_empty() {
            return Err(GeometryError::NoRegions);
        }

        let mut expected: Option<u64> = None;
        for (index, region) in self.regions.iter().enumerate() {
            if region.block_size == 0 || region.block_count == 0 {
                return Err(GeometryError::EmptyRegion { index });
            }
            if let Some(start) = expected {
                if region.offset as u64 != start {
                    return Err(GeometryError::NotContiguous { index });
                }
            }
            let end = region.offset as u64 + region.block_size as u64 * region.block_count as u64;
            if end > u32::MAX as u64 {
                return Err(GeometryError::Overflow);
            }
            expected = Some(end);
        }

        Ok(())
    }

    /// Region containing a byte offset
    pub fn region_at(&self, offset: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(offset))
    }

    /// Check if a byte offset is inside the device
    pub fn contains(&self, offset: u32) -> bool {
        self.region_at(offset).is_some()
    }

    /// Check if `[offset, offset + len)` is inside the device
    pub fn contains_range(&self, offset: u32, len: u32) -> bool {
        if len == 0 {
            return self.contains(offset);
        }
        match offset.checked_add(len - 1) {
            Some(last) => self.contains(offset) && self.contains(last),
            None => false,
        }
    }

    /// Byte offset of the start of the block containing `offset`
    pub fn block_start(&self, offset: u32) -> Option<u32> {
        self.region_at(offset)
            .map(|r| r.offset + (offset - r.offset) / r.block_size * r.block_size)
    }

    /// Convert a byte offset into a block address
    pub const fn block_addr(&self, offset: u32) -> BlockAddr {
        BlockAddr(offset >> self.addr_shift)
    }

    /// Convert a block address back into a byte offset
    pub const fn byte_addr(&self, blk: BlockAddr) -> u32 {
        blk.0 << self.addr_shift
    }

    /// Iterate over the byte offsets of every block, in ascending order
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            regions: &self.regions,
            region: 0,
            block: 0,
        }
    }

    /// Iterate over the byte offsets of the blocks overlapping a range
    pub fn blocks_in(&self, offset: u32, len: u32) -> impl Iterator<Item = u32> + '_ {
        let end = offset as u64 + len as u64;
        self.blocks().filter(move |&start| {
            // Blocks are never empty in a validated descriptor
            let size = self.region_at(start).map_or(0, |r| r.block_size);
            (start as u64) < end && start as u64 + size as u64 > offset as u64
        })
    }
}

/// Iterator over block start offsets, see [`DeviceDescriptor::blocks`]
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    regions: &'a [Region],
    region: usize,
    block: u32,
}

impl Iterator for Blocks<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        while let Some(region) = self.regions.get(self.region) {
            if self.block < region.block_count {
                let offset = region.offset + self.block * region.block_size;
                self.block += 1;
                return Some(offset);
            }
            self.region += 1;
            self.block = 0;
        }
        None
    }
}
