//! norwriter - Intel NOR flash writer
//!
//! Drives an emulated Intel-standard NOR array through the same command
//! dispatcher a debug host would talk to. The array is backed by an image
//! file so erase, program and lock state carry over between runs.

mod cli;
mod commands;
mod error;
mod image;

use clap::Parser;
use cli::{Cli, Commands};
use error::CliError;
use norwriter_core::dispatch::Dispatcher;
use norwriter_core::geometry::Geometry;
use norwriter_core::{Config, IntelStandard};
use std::path::{Path, PathBuf};

/// Geometry used when no file is given: one 16-bit part, eight 8 KiB boot
/// blocks followed by fifteen 64 KiB main blocks
const DEFAULT_GEOMETRY: &str = r#"
[bus]
width = 16
command_set = "intel-standard"

[[region]]
offset = 0x0
block_size = "8 KiB"
blocks = 8

[[region]]
block_size = "64 KiB"
blocks = 15
"#;

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let geometry = load_geometry(cli.geometry.as_deref())?;
    let command_set = geometry.descriptor.command_set;
    if !command_set.is_intel() {
        return Err(CliError::UnsupportedCommandSet(command_set));
    }

    let mut flash = image::open(&cli.image, geometry.layout, geometry.descriptor.clone())?;

    let mut config = Config::default();
    if let Some(limit) = cli.poll_limit {
        config = config.with_poll_limit(limit);
    }

    let modifies_flash = cli.command.modifies_flash();
    let result = {
        let algo = IntelStandard::with_config(&mut flash, &geometry.descriptor, config);
        let mut writer = Dispatcher::new(algo);
        let result = dispatch(&mut writer, &geometry, cli.command);
        commands::finish(&mut writer);
        result
    };

    // Whatever got done before a failure is on the array now
    if modifies_flash {
        image::save(&cli.image, &flash)?;
    }
    result
}

fn dispatch<A: norwriter_core::FlashAlgorithm>(
    writer: &mut Dispatcher<A>,
    geometry: &Geometry,
    command: Commands,
) -> Result<(), CliError> {
    match command {
        Commands::Info => commands::run_info(writer, &geometry.layout),
        Commands::Reset => commands::run_reset(writer),
        Commands::Erase { offset, length } => commands::run_erase(writer, offset.zip(length)),
        Commands::Write {
            input,
            offset,
            chunk,
            erase,
        } => commands::run_write(writer, &input, offset, chunk as usize, erase),
        Commands::Read {
            output,
            offset,
            length,
        } => commands::run_read(writer.algorithm_mut(), &output, offset, length),
        Commands::Lock { offset } => commands::run_lock(writer.algorithm_mut(), offset, true),
        Commands::Unlock { offset } => commands::run_lock(writer.algorithm_mut(), offset, false),
    }
}

/// Load the geometry file, or the built-in default
fn load_geometry(path: Option<&Path>) -> Result<Geometry, CliError> {
    let geometry = match path {
        Some(path) => Geometry::from_toml_file(path).map_err(|source| CliError::Geometry {
            path: path.to_path_buf(),
            source,
        })?,
        None => Geometry::from_toml_str(DEFAULT_GEOMETRY).map_err(|source| {
            CliError::Geometry {
                path: PathBuf::from("<built-in>"),
                source,
            }
        })?,
    };
    log::info!(
        "{} bytes in {} block(s), {}",
        geometry.descriptor.total_size(),
        geometry.descriptor.block_count(),
        geometry.descriptor.command_set
    );
    Ok(geometry)
}
