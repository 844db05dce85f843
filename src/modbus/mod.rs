// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Modbus communication module
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The FieldLogger is the server that
//! provides data, the bridge is the client that requests data.
//!
//! ## Key Components
//!
//! - [`RegisterGateway`]: single-register read/write contract used by every
//!   controller and poller
//! - [`TcpGateway`]: the production implementation, one TCP connection per operation
//! - [`MockGateway`]: in-memory implementation for tests
//! - [`FieldLoggerSimulator`]: Modbus TCP server mimicking the FieldLogger map

pub mod gateway;
pub mod mock;
pub mod simulator;

pub use gateway::{RegisterGateway, TcpGateway, TransportFailure};
pub use mock::{MockGateway, RecordedWrite};
pub use simulator::FieldLoggerSimulator;
