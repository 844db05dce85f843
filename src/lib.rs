// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! FieldLogger bridge library
//!
//! Bridges a FieldLogger Modbus TCP I/O device to a reading store and an HTTP
//! control surface: interlocked conveyor control, small/large part counting,
//! conveyor speed, analog sensors and device reachability.

pub mod api;
pub mod config;
pub mod control;
pub mod daemon;
pub mod ingestion;
pub mod modbus;
pub mod storage;
