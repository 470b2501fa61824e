//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "norwriter")]
#[command(author, version, about = "Intel NOR flash writer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Geometry file (TOML) describing the bus and erase regions
    /// Defaults to a single 16-bit part with 1 MiB of boot and main blocks
    #[arg(long, global = true)]
    pub geometry: Option<PathBuf>,

    /// Image file holding the emulated flash contents
    #[arg(long, global = true, default_value = "flash.bin")]
    pub image: PathBuf,

    /// Give up after this many ready polls (default: poll forever)
    #[arg(long, global = true)]
    pub poll_limit: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show geometry, bus layout and capabilities
    Info,

    /// Return every block to read-array mode
    Reset,

    /// Erase the whole device or the blocks covering a range
    Erase {
        /// Start offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, requires = "length")]
        offset: Option<u32>,

        /// Number of bytes (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, requires = "offset")]
        length: Option<u32>,
    },

    /// Program a file into flash and verify it
    Write {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Transfer buffer size per program command
        #[arg(long, value_parser = parse_hex_u32, default_value = "4096")]
        chunk: u32,

        /// Erase the covered blocks first
        #[arg(long)]
        erase: bool,
    },

    /// Read flash contents to file
    Read {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Number of bytes (default: to the end of the device)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Set the lock bit of the block containing an offset
    Lock {
        /// Offset inside the block (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        offset: u32,
    },

    /// Clear the lock bit of the block containing an offset
    Unlock {
        /// Offset inside the block (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        offset: u32,
    },
}

impl Commands {
    /// Check if the command can change the flash contents or lock bits
    pub fn modifies_flash(&self) -> bool {
        !matches!(self, Self::Info | Self::Read { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_erase_range_needs_both_bounds() {
        assert!(Cli::try_parse_from(["norwriter", "erase", "--offset", "0x100"]).is_err());
        let cli =
            Cli::try_parse_from(["norwriter", "erase", "--offset", "0x100", "--length", "64"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Erase {
                offset: Some(0x100),
                length: Some(64)
            }
        ));
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "norwriter",
            "write",
            "-i",
            "fw.bin",
            "--image",
            "nor.bin",
            "--poll-limit",
            "1000",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.poll_limit, Some(1000));
        assert_eq!(cli.image, PathBuf::from("nor.bin"));
        assert!(cli.command.modifies_flash());
    }
}
