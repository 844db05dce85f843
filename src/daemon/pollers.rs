// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Background poll loops
//!
//! Every loop does one unit of work, then sleeps a fixed interval, until the
//! daemon's `running` flag is cleared. A failed tick is logged and the loop
//! carries on; nothing here ever ends a loop early.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{AnalogChannelConfig, AnalogKind};
use crate::control::{ConveyorSpeedEstimator, PartCounter, SafetyMonitor};
use crate::ingestion::ReadingPublisher;
use crate::modbus::RegisterGateway;
use crate::storage::Reading;

/// Round `value` to `decimals` places
fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Converts one analog input register into a reading
pub struct AnalogSampler {
    gateway: Arc<dyn RegisterGateway>,
    channel: AnalogChannelConfig,
}

impl AnalogSampler {
    pub fn new(gateway: Arc<dyn RegisterGateway>, channel: AnalogChannelConfig) -> Self {
        Self { gateway, channel }
    }

    /// Scaled value of a raw register
    pub fn convert(&self, raw: u16) -> f64 {
        let value = f64::from(raw) * self.channel.scale + self.channel.offset;
        match self.channel.decimals {
            Some(decimals) => round_to(value, decimals),
            None => value,
        }
    }

    /// Read the register once; `None` when the read failed
    pub async fn sample(&self) -> Option<Reading> {
        let raw = self.gateway.read_register(self.channel.register).await?;
        let sensor = self.channel.sensor.clone();
        let valor = self.convert(raw);
        debug!("{}: raw {} -> {}", self.channel.name, raw, valor);
        Some(match self.channel.kind {
            AnalogKind::Temperature => Reading::Temperature { sensor, valor },
            AnalogKind::DomeTemperature => Reading::DomeTemperature { sensor, valor },
            AnalogKind::Humidity => Reading::Humidity { sensor, valor },
        })
    }
}

/// Whether a TCP connection to `addr` opens within `connect_timeout`
pub async fn device_reachable(addr: SocketAddr, connect_timeout: Duration) -> bool {
    matches!(
        time::timeout(connect_timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

pub fn spawn_safety_monitor(
    monitor: SafetyMonitor,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        info!("Safety monitor started");
        while running.load(Ordering::SeqCst) {
            monitor.tick().await;
            time::sleep(interval).await;
        }
        info!("Safety monitor stopped");
        Ok(())
    })
}

pub fn spawn_part_counter(
    mut counter: PartCounter,
    publisher: ReadingPublisher,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        info!("Part counter started");
        while running.load(Ordering::SeqCst) {
            if let Some(event) = counter.tick().await {
                publisher.publish(Reading::from(event));
            }
            time::sleep(interval).await;
        }
        info!("Part counter stopped");
        Ok(())
    })
}

pub fn spawn_conveyor_speed(
    gateway: Arc<dyn RegisterGateway>,
    register: u16,
    mut estimator: ConveyorSpeedEstimator,
    publisher: ReadingPublisher,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        info!(
            "Conveyor speed estimator started (nominal {:.4} m/s)",
            estimator.nominal_speed()
        );
        // Publication waiting for the sink's verdict
        let mut in_flight: Option<(f64, oneshot::Receiver<bool>)> = None;
        while running.load(Ordering::SeqCst) {
            let value = gateway.read_register(register).await;
            let now = Utc::now();
            if value.is_none() {
                warn!("Movement input read failed (register {})", register);
            }
            let speed = estimator.observe(value, now);
            debug!("Conveyor speed {:.4} m/s", speed);

            if let Some((valor, mut ack)) = in_flight.take() {
                match ack.try_recv() {
                    Ok(true) => estimator.mark_published(valor),
                    Ok(false) | Err(TryRecvError::Closed) => {
                        warn!("Conveyor speed {:.4} m/s not accepted, will retry", valor)
                    }
                    Err(TryRecvError::Empty) => in_flight = Some((valor, ack)),
                }
            }

            if in_flight.is_none() {
                if let Some(pending) = estimator.pending_publication() {
                    let reading = Reading::Speed {
                        timestamp: now,
                        valor: pending,
                    };
                    in_flight = publisher
                        .publish_acknowledged(reading)
                        .map(|ack| (pending, ack));
                }
            }
            time::sleep(interval).await;
        }
        info!("Conveyor speed estimator stopped");
        Ok(())
    })
}

pub fn spawn_analog_channel(
    sampler: AnalogSampler,
    publisher: ReadingPublisher,
    running: Arc<AtomicBool>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let name = sampler.channel.name.clone();
        let interval = Duration::from_millis(sampler.channel.interval_ms);
        info!(
            "Analog channel '{}' started (register {})",
            name, sampler.channel.register
        );
        while running.load(Ordering::SeqCst) {
            match sampler.sample().await {
                Some(reading) => {
                    publisher.publish(reading);
                }
                None => warn!(
                    "Analog channel '{}' read failed (register {})",
                    name, sampler.channel.register
                ),
            }
            time::sleep(interval).await;
        }
        info!("Analog channel '{}' stopped", name);
        Ok(())
    })
}

pub fn spawn_link_status(
    addr: SocketAddr,
    connect_timeout: Duration,
    publisher: ReadingPublisher,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        info!("Link status probe started for {}", addr);
        while running.load(Ordering::SeqCst) {
            let reachable = device_reachable(addr, connect_timeout).await;
            if reachable {
                debug!("Field device {} reachable", addr);
            } else {
                warn!("Field device {} unreachable", addr);
            }
            publisher.publish(Reading::Status {
                status: i64::from(reachable),
            });
            time::sleep(interval).await;
        }
        info!("Link status probe stopped");
        Ok(())
    })
}
