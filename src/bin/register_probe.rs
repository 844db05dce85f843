// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Commissioning probe for the FieldLogger
//!
//! Reads and writes single registers and coils through the same gateway the
//! bridge uses, and scans coils 0-50 for writability.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use fieldlogger_bridge::modbus::{RegisterGateway, TcpGateway};
use std::net::SocketAddr;
use tokio::time::Duration;

/// Register probe for a FieldLogger Modbus TCP device
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Modbus server address
    #[arg(long, default_value = "192.168.0.30")]
    address: String,

    /// Modbus server port
    #[arg(long, default_value_t = 502)]
    port: u16,

    /// Modbus unit id
    #[arg(long, default_value_t = 1)]
    unit_id: u8,

    /// Per-operation timeout in milliseconds
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read consecutive holding registers, one request each
    Read {
        register: u16,
        #[arg(long, default_value_t = 1)]
        quantity: u16,
    },
    /// Write one holding register
    Write { register: u16, value: u16 },
    /// Write one coil (on or off)
    Coil { coil: u16, state: String },
    /// Try switching on every coil in 0-50 and report which accept it
    ScanCoils {
        #[arg(long, default_value_t = 50)]
        last: u16,
    },
}

/// Human-readable meaning of the registers the bridge uses
fn describe(register: u16) -> &'static str {
    match register {
        3 => "temperature",
        4 => "dome temperature (raw)",
        5 => "humidity",
        14 => "conveyor movement pulse",
        15 => "small part pulse",
        16 => "large part pulse",
        17 => "enable interlock (channel 4)",
        21 => "mode interlock (channel 8)",
        26 => "conveyor output",
        _ => "",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    let gateway = TcpGateway::new(
        socket_addr,
        args.unit_id,
        Duration::from_millis(args.timeout_ms),
    );
    println!("Probing FieldLogger at {}", gateway.socket_addr());

    match args.command {
        Command::Read { register, quantity } => {
            for address in register..register.saturating_add(quantity) {
                match gateway.read_register(address).await {
                    Some(value) => println!(
                        "Register {:>3}: {:>5}  {}",
                        address,
                        value,
                        describe(address)
                    ),
                    None => println!("Register {:>3}: read failed", address),
                }
            }
        }
        Command::Write { register, value } => {
            gateway.write_register(register, value).await?;
            println!("Register {} set to {}", register, value);
        }
        Command::Coil { coil, state } => {
            let on = match state.as_str() {
                "on" => true,
                "off" => false,
                other => bail!("invalid coil state '{}', use 'on' or 'off'", other),
            };
            gateway.write_coil(coil, on).await?;
            println!("Coil {} switched {}", coil, state);
        }
        Command::ScanCoils { last } => {
            println!("Scanning coils 0-{}", last);
            let mut writable = Vec::new();
            for coil in 0..=last {
                match gateway.write_coil(coil, true).await {
                    Ok(()) => {
                        println!("[x] coil {} accepts writes", coil);
                        writable.push(coil);
                    }
                    Err(e) => println!("[ ] coil {}: {}", coil, e),
                }
            }
            println!("Writable coils: {:?}", writable);
        }
    }

    Ok(())
}
