// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! FieldLogger simulator
//!
//! A Modbus TCP server exposing the subset of the FieldLogger map used by the
//! bridge, so the gateway, pollers and HTTP control surface can be exercised
//! without the physical device.
//!
//! ## Register Map
//!
//! ### Holding Registers (Read/Write), addresses 0-31
//!
//! | Address | Meaning |
//! |---------|---------|
//! | 3 | Analog channel 1 (temperature) |
//! | 4 | Analog channel 2 (dome temperature) |
//! | 5 | Analog channel 3 (humidity) |
//! | 14 | Conveyor speed pulse input (0 / 5) |
//! | 15 | Small part pulse input (0 / 5) |
//! | 16 | Large part pulse input (0 / 5) |
//! | 17 | Channel 4, conveyor enable interlock (1 = enabled) |
//! | 21 | Channel 8, mode interlock (0 = automatic, 1 = manual) |
//! | 26 | Conveyor / green light output |
//!
//! ### Coils (Read/Write), addresses 0-50
//!
//! Coil 8 drives the fan relay and coil 9 the humidifier relay.

use std::{
    collections::HashMap,
    future,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

/// Highest holding register address served by the simulator
pub const LAST_HOLDING_REGISTER: u16 = 31;

/// Highest coil address served by the simulator
pub const LAST_COIL: u16 = 50;

/// Simulated FieldLogger register bank.
///
/// Cloning is cheap and every clone shares the same registers, so a test can
/// keep a handle and change inputs while clients are connected.
#[derive(Clone)]
pub struct FieldLoggerSimulator {
    /// Holding registers (digital states, analog values, outputs)
    pub holding_registers: Arc<Mutex<HashMap<u16, u16>>>,

    /// Coils (relay outputs)
    pub coils: Arc<Mutex<HashMap<u16, bool>>>,
}

impl tokio_modbus::server::Service for FieldLoggerSimulator {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    ///
    /// Supported function codes:
    /// - 0x01: Read Coils
    /// - 0x03: Read Holding Registers
    /// - 0x05: Write Single Coil
    /// - 0x06: Write Single Register
    /// - 0x10: Write Multiple Registers
    ///
    /// Any other function code returns an IllegalFunction exception.
    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Simulator received Modbus request: {:?}", req);

        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                register_read(&lock(&self.holding_registers), addr, cnt)
                    .map(Response::ReadHoldingRegisters)
            }
            Request::WriteSingleRegister(addr, value) => register_write(
                &mut lock(&self.holding_registers),
                addr,
                std::slice::from_ref(&value),
            )
            .map(|_| Response::WriteSingleRegister(addr, value)),
            Request::WriteMultipleRegisters(addr, values) => {
                register_write(&mut lock(&self.holding_registers), addr, &values)
                    .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::ReadCoils(addr, cnt) => {
                register_read(&lock(&self.coils), addr, cnt).map(Response::ReadCoils)
            }
            Request::WriteSingleCoil(addr, on) => {
                register_write(&mut lock(&self.coils), addr, std::slice::from_ref(&on))
                    .map(|_| Response::WriteSingleCoil(addr, on))
            }
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        if let Err(e) = &res {
            error!("Simulator request error: {:?}", e);
        }

        future::ready(res)
    }
}

impl Default for FieldLoggerSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldLoggerSimulator {
    /// Create a simulator in the factory idle state: all inputs quiescent,
    /// conveyor enabled and in automatic mode, output off.
    pub fn new() -> Self {
        let mut holding_registers: HashMap<u16, u16> =
            (0..=LAST_HOLDING_REGISTER).map(|addr| (addr, 0)).collect();
        holding_registers.insert(3, 21);
        holding_registers.insert(4, 23);
        holding_registers.insert(5, 55);
        holding_registers.insert(17, 1);

        let coils = (0..=LAST_COIL).map(|addr| (addr, false)).collect();

        Self {
            holding_registers: Arc::new(Mutex::new(holding_registers)),
            coils: Arc::new(Mutex::new(coils)),
        }
    }

    pub fn set_register(&self, address: u16, value: u16) {
        lock(&self.holding_registers).insert(address, value);
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        lock(&self.holding_registers).get(&address).copied()
    }

    pub fn coil(&self, address: u16) -> Option<bool> {
        lock(&self.coils).get(&address).copied()
    }

    /// Serve this simulator on an already bound listener.
    ///
    /// Returns the spawned server task; aborting it stops the simulator.
    pub fn serve(&self, listener: TcpListener) -> JoinHandle<()> {
        let server = Server::new(listener);
        let simulator = self.clone();

        tokio::spawn(async move {
            let new_service = |_socket_addr| Ok(Some(simulator.clone()));
            let on_connected = |stream, socket_addr: SocketAddr| async move {
                debug!("Simulator accepted connection from {}", socket_addr);
                accept_tcp_connection(stream, socket_addr, new_service)
            };
            let on_process_error = |err| {
                error!("Simulator connection error: {}", err);
            };

            if let Err(e) = server.serve(&on_connected, on_process_error).await {
                error!("Simulator server stopped: {}", e);
            }
        })
    }

    /// Bind `socket_addr` and serve; use port 0 for an ephemeral port.
    pub async fn bind(&self, socket_addr: SocketAddr) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(socket_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("FieldLogger simulator listening on {}", local_addr);
        Ok((local_addr, self.serve(listener)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Read `cnt` consecutive cells starting at `addr`.
///
/// Returns `ExceptionCode::IllegalDataAddress` if any address is not mapped.
fn register_read<T: Copy + Default>(
    registers: &HashMap<u16, T>,
    addr: u16,
    cnt: u16,
) -> Result<Vec<T>, ExceptionCode> {
    let mut response_values = vec![T::default(); cnt.into()];

    for i in 0..cnt {
        let reg_addr = addr.checked_add(i).ok_or(ExceptionCode::IllegalDataAddress)?;
        match registers.get(&reg_addr) {
            Some(r) => response_values[i as usize] = *r,
            None => {
                error!(
                    "Exception::IllegalDataAddress - Register {} not found",
                    reg_addr
                );
                return Err(ExceptionCode::IllegalDataAddress);
            }
        }
    }

    Ok(response_values)
}

/// Write consecutive cells starting at `addr`.
///
/// Returns `ExceptionCode::IllegalDataAddress` if any target is not mapped;
/// cells before the failing one keep their new value, as on the device.
fn register_write<T: Copy + std::fmt::Debug>(
    registers: &mut HashMap<u16, T>,
    addr: u16,
    values: &[T],
) -> Result<(), ExceptionCode> {
    for (i, value) in values.iter().enumerate() {
        let reg_addr = addr
            .checked_add(i as u16)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        match registers.get_mut(&reg_addr) {
            Some(r) => {
                *r = *value;
                debug!("Written value {:?} to register {}", value, reg_addr);
            }
            None => {
                error!(
                    "Exception::IllegalDataAddress - Register {} not found",
                    reg_addr
                );
                return Err(ExceptionCode::IllegalDataAddress);
            }
        }
    }

    Ok(())
}
