//! TOML geometry file parsing
//!
//! Describes the bus and the erase regions of a flash array:
//!
//! ```toml
//! [bus]
//! width = 32
//! interleave = 2
//! command_set = "intel-standard"
//!
//! [[region]]
//! offset = 0x0
//! block_size = "32 KiB"
//! blocks = 4
//!
//! [[region]]
//! block_size = "128 KiB"
//! blocks = 255
//! ```
//!
//! A region without `offset` starts where the previous one ends.

use std::fs;
use std::path::Path;
use std::string::String;
use std::vec::Vec;
use std::format;

use super::{DeviceDescriptor, GeometryError, Region};
use crate::algorithm::CommandSet;
use crate::bus::{BusLayout, BusWidth};

/// TOML geometry file structure
#[derive(Debug, serde::Deserialize)]
struct TomlGeometryFile {
    bus: TomlBus,
    region: Vec<TomlRegion>,
}

/// Bus description
#[derive(Debug, serde::Deserialize)]
struct TomlBus {
    /// Bus width in bits
    width: u32,
    #[serde(default = "default_interleave")]
    interleave: u8,
    command_set: Option<String>,
}

/// Region definition in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlRegion {
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    offset: Option<u32>,
    #[serde(deserialize_with = "deserialize_size")]
    block_size: u32,
    blocks: u32,
}

fn default_interleave() -> u8 {
    1
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

/// Deserialize an optional u32 that can be hex (0x...) or decimal
fn deserialize_opt_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(Some(n)),
        HexOrInt::Str(s) => parse_number(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Deserialize a size that can be a number or a string like "64 KiB"
fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "64 KiB" or "4096"
fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("b") {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

/// A bus layout together with the device descriptor that matches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    /// How the parts sit on the bus
    pub layout: BusLayout,
    /// Addressing and block layout
    pub descriptor: DeviceDescriptor,
}

impl Geometry {
    /// Load a geometry from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, GeometryError> {
        let content = fs::read_to_string(path).map_err(|_| GeometryError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Parse a geometry from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, GeometryError> {
        let file: TomlGeometryFile = toml::from_str(content).map_err(|e| {
            log::debug!("geometry parse error: {}", e);
            GeometryError::Parse
        })?;

        let width = BusWidth::from_bits(file.bus.width).ok_or(GeometryError::InvalidBus)?;
        let layout = BusLayout::new(width, file.bus.interleave).ok_or(GeometryError::InvalidBus)?;

        let command_set = match file.bus.command_set.as_deref() {
            Some(name) => name
                .parse::<CommandSet>()
                .map_err(|_| GeometryError::UnknownCommandSet)?,
            None => CommandSet::IntelStandard,
        };

        let mut descriptor = DeviceDescriptor::for_bus(&layout, command_set);
        let mut next = 0u64;
        for region in &file.region {
            let offset = region.offset.map_or(next, u64::from);
            let offset = u32::try_from(offset).map_err(|_| GeometryError::Overflow)?;
            descriptor.push_region(Region::new(offset, region.block_size, region.blocks))?;
            next = offset as u64 + region.block_size as u64 * region.blocks as u64;
        }
        descriptor.validate()?;

        log::debug!(
            "geometry: {}-bit bus, {} part(s), {} region(s), {} bytes",
            file.bus.width,
            layout.interleave(),
            descriptor.regions().len(),
            descriptor.total_size()
        );

        Ok(Self { layout, descriptor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("4 KiB").unwrap(), 4096);
        assert_eq!(parse_size("128KiB").unwrap(), 128 * 1024);
        assert_eq!(parse_size("1 MiB").unwrap(), 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_parse_geometry() {
        let toml = r#"
[bus]
width = 32
interleave = 2
command_set = "intel-standard"

[[region]]
offset = 0x0
block_size = "32 KiB"
blocks = 4

[[region]]
block_size = "128 KiB"
blocks = 3
"#;
        let geo = Geometry::from_toml_str(toml).unwrap();
        assert_eq!(geo.layout.interleave(), 2);
        assert_eq!(geo.layout.bytes(), 4);
        assert_eq!(geo.descriptor.addr_step, 4);
        assert_eq!(geo.descriptor.addr_shift, 2);
        assert_eq!(geo.descriptor.command_set, CommandSet::IntelStandard);
        assert_eq!(geo.descriptor.regions().len(), 2);
        assert_eq!(geo.descriptor.regions()[1].offset, 128 * 1024);
        assert_eq!(geo.descriptor.total_size(), 512 * 1024);
    }

    #[test]
    fn test_defaults() {
        let toml = r#"
[bus]
width = 16

[[region]]
block_size = 65536
blocks = 2
"#;
        let geo = Geometry::from_toml_str(toml).unwrap();
        assert_eq!(geo.layout.interleave(), 1);
        assert_eq!(geo.descriptor.addr_shift, 1);
        assert_eq!(geo.descriptor.command_set, CommandSet::IntelStandard);
    }

    #[test]
    fn test_rejects_bad_bus() {
        let toml = r#"
[bus]
width = 24

[[region]]
block_size = 64
blocks = 1
"#;
        assert_eq!(Geometry::from_toml_str(toml), Err(GeometryError::InvalidBus));
    }

    #[test]
    fn test_rejects_gap() {
        let toml = r#"
[bus]
width = 8

[[region]]
offset = 0
block_size = 64
blocks = 1

[[region]]
offset = 0x100
block_size = 64
blocks = 1
"#;
        assert_eq!(
            Geometry::from_toml_str(toml),
            Err(GeometryError::NotContiguous { index: 1 })
        );
    }

    #[test]
    fn test_rejects_unknown_command_set() {
        let toml = r#"
[bus]
width = 8
command_set = "mitsubishi"

[[region]]
block_size = 64
blocks = 1
"#;
        assert_eq!(
            Geometry::from_toml_str(toml),
            Err(GeometryError::UnknownCommandSet)
        );
    }
}
