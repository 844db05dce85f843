// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Register access gateway for the FieldLogger
//!
//! Every operation opens a fresh Modbus TCP connection, performs exactly one
//! request and closes the connection again, whatever the outcome. There is no
//! connection pool: a stuck connection from one caller can never starve
//! another, at the cost of one TCP handshake per access.
//!
//! All failure causes (device not connectable, exception response, transport
//! error, timeout) are collapsed into the same signal: `None` for reads and
//! [`TransportFailure`] for writes. The cause is only visible in debug logs.
//! The gateway never retries; polling loops retry naturally on their next tick.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use tokio::time::timeout;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use crate::config::DeviceConfig;

/// Normalized failure of a single gateway operation.
///
/// The message is informative only; callers must not branch on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field device operation failed: {0}")]
pub struct TransportFailure(pub String);

/// Single-register access to the field device
#[async_trait]
pub trait RegisterGateway: Send + Sync {
    /// Read one holding register, `None` on any failure
    async fn read_register(&self, address: u16) -> Option<u16>;

    /// Write one holding register
    async fn write_register(&self, address: u16, value: u16) -> Result<(), TransportFailure>;

    /// Write one coil
    async fn write_coil(&self, address: u16, on: bool) -> Result<(), TransportFailure>;
}

/// Modbus TCP gateway using a short-lived connection per operation.
#[derive(Debug, Clone)]
pub struct TcpGateway {
    socket_addr: SocketAddr,
    unit_id: u8,
    io_timeout: Duration,
}

impl TcpGateway {
    /// Create a gateway from the device section of the configuration
    pub fn from_config(config: &DeviceConfig) -> anyhow::Result<Self> {
        let socket_addr: SocketAddr = format!("{}:{}", config.address, config.port)
            .parse()
            .map_err(|e| {
                anyhow::anyhow!(
                    "Invalid device address {}:{}: {}",
                    config.address,
                    config.port,
                    e
                )
            })?;
        Ok(Self::new(
            socket_addr,
            config.unit_id,
            Duration::from_millis(config.timeout_ms),
        ))
    }

    pub fn new(socket_addr: SocketAddr, unit_id: u8, io_timeout: Duration) -> Self {
        Self {
            socket_addr,
            unit_id,
            io_timeout,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.socket_addr
    }

    async fn connect(&self) -> Result<Context, TransportFailure> {
        match timeout(
            self.io_timeout,
            tcp::connect_slave(self.socket_addr, Slave(self.unit_id)),
        )
        .await
        {
            Ok(Ok(ctx)) => Ok(ctx),
            Ok(Err(e)) => Err(TransportFailure(format!(
                "cannot connect to {}: {}",
                self.socket_addr, e
            ))),
            Err(_) => Err(TransportFailure(format!(
                "connection to {} timed out",
                self.socket_addr
            ))),
        }
    }

    /// Run one request on a fresh connection and always disconnect afterwards
    async fn with_connection<T, F, Fut>(&self, op: F) -> Result<T, TransportFailure>
    where
        F: FnOnce(Context) -> Fut,
        Fut: std::future::Future<Output = (Context, Result<T, TransportFailure>)>,
    {
        let ctx = self.connect().await?;
        let (mut ctx, result) = match timeout(self.io_timeout, op(ctx)).await {
            Ok(outcome) => outcome,
            // The context was moved into the timed-out future and is dropped
            // with it, which closes the socket.
            Err(_) => {
                return Err(TransportFailure(format!(
                    "request to {} timed out",
                    self.socket_addr
                )))
            }
        };
        if let Err(e) = ctx.disconnect().await {
            debug!("Error while closing connection to {}: {}", self.socket_addr, e);
        }
        result
    }
}

/// Flatten the nested tokio-modbus result into the gateway failure type
fn flatten<T>(
    result: Result<Result<T, ExceptionCode>, tokio_modbus::Error>,
) -> Result<T, TransportFailure> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(exception)) => Err(TransportFailure(format!("exception response: {}", exception))),
        Err(e) => Err(TransportFailure(format!("transport error: {}", e))),
    }
}

#[async_trait]
impl RegisterGateway for TcpGateway {
    async fn read_register(&self, address: u16) -> Option<u16> {
        let result = self
            .with_connection(|mut ctx| async move {
                let response = flatten(ctx.read_holding_registers(address, 1).await);
                (ctx, response)
            })
            .await;

        match result {
            Ok(words) => {
                let value = words.first().copied();
                if value.is_none() {
                    debug!("Empty response reading register {}", address);
                }
                value
            }
            Err(e) => {
                debug!("Read of register {} failed: {}", address, e);
                None
            }
        }
    }

    async fn write_register(&self, address: u16, value: u16) -> Result<(), TransportFailure> {
        self.with_connection(|mut ctx| async move {
            let response = flatten(ctx.write_single_register(address, value).await);
            (ctx, response)
        })
        .await
        .inspect_err(|e| debug!("Write of {} to register {} failed: {}", value, address, e))
    }

    async fn write_coil(&self, address: u16, on: bool) -> Result<(), TransportFailure> {
        self.with_connection(|mut ctx| async move {
            let response = flatten(ctx.write_single_coil(address, on).await);
            (ctx, response)
        })
        .await
        .inspect_err(|e| debug!("Write of {} to coil {} failed: {}", on, address, e))
    }
}
