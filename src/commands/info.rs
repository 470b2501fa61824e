//! Info command implementation

use super::send;
use crate::error::CliError;
use norwriter_core::bus::BusLayout;
use norwriter_core::dispatch::{Dispatcher, HostCommand, DEV_ALGO_PARAM, MAX_PARAMS};
use norwriter_core::{Capabilities, CommandSet, FlashAlgorithm};

/// Print the geometry and what the writer can do with it
pub fn run_info<A: FlashAlgorithm>(
    writer: &mut Dispatcher<A>,
    layout: &BusLayout,
) -> Result<(), CliError> {
    let reply = send(writer, HostCommand::Query, [0; MAX_PARAMS], &[])?;
    let code = reply.param[DEV_ALGO_PARAM];
    let command_set = u16::try_from(code)
        .ok()
        .and_then(CommandSet::from_code)
        .map_or_else(|| format!("unknown ({:#06x})", code), |set| set.to_string());

    let algo = writer.algorithm();
    let device = algo.descriptor();

    println!("Command set:  {} ({:#06x})", command_set, code);
    println!(
        "Bus:          {}-bit, {} part(s) of {}-bit",
        layout.bytes() as u32 * 8,
        layout.interleave(),
        layout.lane_bytes() as u32 * 8
    );
    println!(
        "Addressing:   {} byte(s) per write, shift {}",
        device.addr_step, device.addr_shift
    );
    println!(
        "Size:         {} bytes ({} KiB) in {} block(s)",
        device.total_size(),
        device.total_size() / 1024,
        device.block_count()
    );
    println!("Regions:");
    for (i, region) in device.regions().iter().enumerate() {
        println!(
            "  {}: {:#010x}..{:#010x}  {} x {} KiB",
            i,
            region.offset,
            region.offset as u64 + region.total_size() as u64,
            region.block_count,
            region.block_size / 1024
        );
    }
    println!("Operations:   {}", describe_capabilities(algo.capabilities()));

    Ok(())
}

fn describe_capabilities(caps: Capabilities) -> String {
    let names: Vec<&str> = [
        (Capabilities::ERASE, "erase"),
        (Capabilities::PROGRAM, "program"),
        (Capabilities::LOCK, "lock/unlock"),
    ]
    .into_iter()
    .filter(|(flag, _)| caps.contains(*flag))
    .map(|(_, name)| name)
    .collect();

    if names.is_empty() {
        "read only".to_string()
    } else {
        names.join(", ")
    }
}
