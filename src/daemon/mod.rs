// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! # Daemon Module
//!
//! Runs the bridge: the HTTP server, the ingestion forwarder and every
//! enabled poll loop, all sharing one `running` flag for shutdown.
//!
//! ## Components
//!
//! * **Launch Daemon**: starting, monitoring and stopping background tasks
//! * **Pollers**: safety monitor, part counter, conveyor speed, analog
//!   channels and link status loops
//!
//! ## Usage
//!
//! ```no_run
//! use fieldlogger_bridge::{config::Config, daemon::launch_daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;
pub mod pollers;
