//! kk_info - show library, host and device information
//!
//! Usage:
//!   kk_info
//!   kk_info --library ./libkk_library_64_cdecl.so --enum-flags 2
//!   kk_info --connection 192.168.1.10:1234 --json

use clap::Parser;
use kklib_rs::common::cli::InfoArgs;
use kklib_rs::common::init_tracing;
use kklib_rs::kk::{
    enumerate_devices, host_and_ips, DeviceStartState, EnumFlags, HostInfo, KkLibrary,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct DeviceInfo {
    connection: String,
    source_id: i32,
    firmware_version: i32,
    user_id: Option<u8>,
    has_fram: bool,
    serial_device: bool,
    file_device: bool,
    start_state: DeviceStartState,
    buffer_amount: i32,
    transmit_buffer_amount: i32,
}

#[derive(Debug, Serialize)]
struct InfoReport {
    library_version: Option<String>,
    host: Option<HostInfo>,
    devices: Vec<String>,
    device: Option<DeviceInfo>,
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let args = InfoArgs::parse();

    let library = match &args.library.library {
        Some(path) => KkLibrary::open(path)?,
        None => KkLibrary::open_default()?,
    };

    let flags = EnumFlags::from_bits(args.enum_flags)?;
    let devices = match enumerate_devices(&library, flags) {
        Ok(devices) => devices,
        Err(e) => {
            eprintln!("Device enumeration failed: {}", e);
            Vec::new()
        }
    };
    let host = match host_and_ips(&library) {
        Ok(host) => Some(host),
        Err(e) => {
            eprintln!("Host query failed: {}", e);
            e.host().map(|host| HostInfo {
                host: Some(host.to_string()),
                ..Default::default()
            })
        }
    };

    let device = match &args.connection {
        Some(connection) => {
            let source = library.create_source();
            source.open_connection(connection, args.blocking)?;
            let info = DeviceInfo {
                connection: connection.clone(),
                source_id: source.id().raw(),
                firmware_version: source.firmware_version(),
                user_id: source.user_id(),
                has_fram: source.has_fram(),
                serial_device: source.is_serial_device(),
                file_device: source.is_file_device(),
                start_state: source.device_start_state(),
                buffer_amount: source.buffer_amount(),
                transmit_buffer_amount: source.transmit_buffer_amount(),
            };
            source.close_connection();
            Some(info)
        }
        None => None,
    };

    let report = InfoReport {
        library_version: library.get_dll_version(),
        host,
        devices,
        device,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }
    Ok(())
}

fn print_text(report: &InfoReport) {
    println!("===========================================");
    println!("K+K Library Info");
    println!("===========================================");
    println!(
        "  {:<20}: {}",
        "Library version",
        report.library_version.as_deref().unwrap_or("unknown")
    );

    if let Some(host) = &report.host {
        println!(
            "  {:<20}: {}",
            "Host",
            host.host.as_deref().unwrap_or("unknown")
        );
        println!("  {:<20}: {}", "IPs", host.ips.join(", "));
        if host.truncated {
            println!("  (host strings truncated)");
        }
    }

    println!();
    println!("--- Devices ---");
    if report.devices.is_empty() {
        println!("  none found");
    }
    for name in &report.devices {
        println!("  {}", name);
    }

    if let Some(device) = &report.device {
        println!();
        println!("--- Connection {} ---", device.connection);
        println!("  {:<20}: {}", "Source ID", device.source_id);
        println!("  {:<20}: {}", "Firmware", device.firmware_version);
        match device.user_id {
            Some(id) => println!("  {:<20}: {}", "User ID", id),
            None => println!("  {:<20}: unavailable", "User ID"),
        }
        println!("  {:<20}: {}", "FRAM", device.has_fram);
        println!("  {:<20}: {}", "Serial device", device.serial_device);
        println!("  {:<20}: {}", "File device", device.file_device);
        println!("  {:<20}: {:?}", "Start state", device.start_state);
        println!("  {:<20}: {}", "Receive buffer", device.buffer_amount);
        println!("  {:<20}: {}", "Transmit buffer", device.transmit_buffer_amount);
    }
}
