// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Stand-alone FieldLogger simulator
//!
//! Serves the simulated register map over Modbus TCP. With `--parts` it also
//! produces a pulse train on the part and movement inputs, alternating two
//! small parts and one large part.

use anyhow::Result;
use clap::Parser;
use fieldlogger_bridge::modbus::FieldLoggerSimulator;
use log::info;
use std::net::SocketAddr;
use tokio::time::{sleep, Duration};

/// Modbus TCP server mimicking a FieldLogger
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Listen port
    #[arg(long, default_value_t = 5020)]
    port: u16,

    /// Generate part and movement pulses
    #[arg(long)]
    parts: bool,

    /// Pulse width in milliseconds
    #[arg(long, default_value_t = 400)]
    pulse_ms: u64,
}

const SMALL_PULSE: u16 = 15;
const LARGE_PULSE: u16 = 16;
const SPEED_PULSE: u16 = 14;

async fn pulse_train(simulator: FieldLoggerSimulator, width: Duration) {
    let mut part = 0u64;
    loop {
        let large = part % 3 == 2;
        simulator.set_register(SMALL_PULSE, 5);
        simulator.set_register(SPEED_PULSE, 5);
        if large {
            simulator.set_register(LARGE_PULSE, 5);
        }
        sleep(width).await;

        simulator.set_register(SMALL_PULSE, 0);
        simulator.set_register(SPEED_PULSE, 0);
        sleep(width).await;
        simulator.set_register(LARGE_PULSE, 0);

        part += 1;
        info!("Simulated {} part #{}", if large { "large" } else { "small" }, part);
        sleep(width * 2).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;

    let simulator = FieldLoggerSimulator::new();
    let (local_addr, server) = simulator.bind(socket_addr).await?;
    println!("FieldLogger simulator listening on {}", local_addr);

    if args.parts {
        tokio::spawn(pulse_train(
            simulator.clone(),
            Duration::from_millis(args.pulse_ms),
        ));
    }

    tokio::signal::ctrl_c().await?;
    info!("Stopping simulator");
    server.abort();
    Ok(())
}
