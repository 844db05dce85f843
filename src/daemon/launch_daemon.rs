// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

use anyhow::{Context, Result};
use base64::prelude::*;
use log::{debug, error, info};
use rocket::{
    config::LogLevel,
    data::{Limits, ToByteUnit},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use super::pollers::{self, AnalogSampler};
use crate::api::{build_rocket, Controls};
use crate::config::{Config, IngestionTarget};
use crate::control::{
    ClimateRelays, ConveyorSpeedEstimator, InterlockMap, InterlockedActuator, PartCounter,
    PulseInputs, SafetyMonitor,
};
use crate::ingestion::{self, HttpSink, IngestionSink, LocalSink, ReadingPublisher};
use crate::modbus::{RegisterGateway, TcpGateway};
use crate::storage::ReadingStore;

/// Owns every background task of the bridge
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    web_shutdown: Option<rocket::Shutdown>,
    store: Option<Arc<ReadingStore>>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            web_shutdown: None,
            store: None,
        }
    }

    /// Reading store served by the API, once launched
    pub fn store(&self) -> Option<Arc<ReadingStore>> {
        self.store.clone()
    }

    /// Launch all configured tasks against the device named in `config`
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let gateway: Arc<dyn RegisterGateway> = Arc::new(TcpGateway::from_config(&config.device)?);
        self.launch_with_gateway(config, gateway).await
    }

    /// Launch all configured tasks on an existing gateway
    pub async fn launch_with_gateway(
        &mut self,
        config: &Config,
        gateway: Arc<dyn RegisterGateway>,
    ) -> Result<()> {
        if config.device.require_at_startup {
            self.check_device(config, gateway.as_ref()).await?;
        }

        let store = Arc::new(match &config.storage.data_dir {
            Some(dir) => ReadingStore::open(dir)
                .with_context(|| format!("Failed to open reading store at {}", dir))?,
            None => ReadingStore::in_memory(),
        });
        self.store = Some(store.clone());

        if config.api.enabled {
            self.start_web_server(config, store.clone(), gateway.clone())
                .await?;
        }

        let publisher = self.start_ingestion(config, store)?;
        self.start_pollers(config, gateway, publisher);

        self.start_heartbeat()?;

        Ok(())
    }

    /// Fail when the enable interlock cannot be read
    async fn check_device(&self, config: &Config, gateway: &dyn RegisterGateway) -> Result<()> {
        info!(
            "Checking field device at {}:{}",
            config.device.address, config.device.port
        );
        match gateway.read_register(config.registers.enable_interlock).await {
            Some(value) => {
                debug!("Enable interlock reads {}", value);
                Ok(())
            }
            None => anyhow::bail!(
                "Field device {}:{} is unreachable",
                config.device.address,
                config.device.port
            ),
        }
    }

    /// Start the Rocket web server
    async fn start_web_server(
        &mut self,
        config: &Config,
        store: Arc<ReadingStore>,
        gateway: Arc<dyn RegisterGateway>,
    ) -> Result<()> {
        info!(
            "Starting web server on {}:{}",
            config.api.address, config.api.port
        );

        let mut figment = rocket::Config::figment()
            .merge(("ident", config.api.name.clone()))
            .merge(("limits", Limits::new().limit("json", 64.kibibytes())))
            .merge(("address", config.api.address.clone()))
            .merge(("port", config.api.port))
            .merge(("log_level", LogLevel::Normal));

        // Configure TLS if certificates are provided
        if let (Some(cert), Some(key)) = (&config.api.cert, &config.api.key) {
            debug!("SSL certificates found in configuration, enabling TLS");

            let cert_data = BASE64_STANDARD.decode(cert)?;
            let key_data = BASE64_STANDARD.decode(key)?;

            figment = figment
                .merge(("tls.certs", cert_data))
                .merge(("tls.key", key_data));

            info!("TLS enabled for web server");
        }

        let controls = Controls {
            actuator: InterlockedActuator::new(
                gateway.clone(),
                InterlockMap::from(&config.registers),
            ),
            relays: ClimateRelays::new(
                gateway,
                config.registers.fan_relay_coil,
                config.registers.humidifier_relay_coil,
            ),
        };

        let ignited = build_rocket(figment, store, controls).await.ignite().await?;
        self.web_shutdown = Some(ignited.shutdown());

        let task = tokio::spawn(async move {
            ignited.launch().await?;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start the forwarder between the pollers and the ingestion sink
    fn start_ingestion(
        &mut self,
        config: &Config,
        store: Arc<ReadingStore>,
    ) -> Result<ReadingPublisher> {
        let sink: Arc<dyn IngestionSink> = match config.ingestion.target {
            IngestionTarget::Local => {
                info!("Readings are stored locally");
                Arc::new(LocalSink::new(store))
            }
            IngestionTarget::Http => {
                let base_url = config
                    .ingestion
                    .base_url
                    .clone()
                    .context("HTTP ingestion target requires a base_url")?;
                info!("Readings are posted to {}", base_url);
                Arc::new(HttpSink::new(
                    base_url,
                    Duration::from_millis(config.ingestion.request_timeout_ms),
                )?)
            }
        };

        let (publisher, receiver) = ingestion::channel(config.ingestion.channel_capacity);
        self.tasks.push(ingestion::spawn_forwarder(receiver, sink));
        Ok(publisher)
    }

    /// Start every enabled poll loop
    fn start_pollers(
        &mut self,
        config: &Config,
        gateway: Arc<dyn RegisterGateway>,
        publisher: ReadingPublisher,
    ) {
        let settings = &config.pollers;
        let registers = &config.registers;

        if settings.safety_monitor.enabled {
            self.tasks.push(pollers::spawn_safety_monitor(
                SafetyMonitor::new(gateway.clone(), InterlockMap::from(registers)),
                Duration::from_millis(settings.safety_monitor.interval_ms),
                self.running.clone(),
            ));
        }

        if settings.part_counter.enabled {
            let inputs = PulseInputs {
                small: registers.small_pulse,
                large: registers.large_pulse,
            };
            self.tasks.push(pollers::spawn_part_counter(
                PartCounter::new(gateway.clone(), inputs),
                publisher.clone(),
                Duration::from_millis(settings.part_counter.interval_ms),
                self.running.clone(),
            ));
        }

        if settings.conveyor_speed.enabled {
            self.tasks.push(pollers::spawn_conveyor_speed(
                gateway.clone(),
                registers.speed_pulse,
                ConveyorSpeedEstimator::from_config(&settings.conveyor_speed),
                publisher.clone(),
                Duration::from_millis(settings.conveyor_speed.interval_ms),
                self.running.clone(),
            ));
        }

        for channel in settings.analog_channels.iter().filter(|c| c.enabled) {
            self.tasks.push(pollers::spawn_analog_channel(
                AnalogSampler::new(gateway.clone(), channel.clone()),
                publisher.clone(),
                self.running.clone(),
            ));
        }

        if settings.link_status.enabled {
            match format!("{}:{}", config.device.address, config.device.port).parse() {
                Ok(addr) => self.tasks.push(pollers::spawn_link_status(
                    addr,
                    Duration::from_millis(settings.link_status.connect_timeout_ms),
                    publisher,
                    Duration::from_millis(settings.link_status.interval_ms),
                    self.running.clone(),
                )),
                Err(e) => error!("Link status probe disabled: {}", e),
            }
        }
    }

    /// Start a heartbeat task that logs system status periodically
    fn start_heartbeat(&mut self) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let running = self.running.clone();
        let store = self.store.clone();
        let task = tokio::spawn(async move {
            let mut seconds = 0u64;
            while running.load(Ordering::SeqCst) {
                if seconds % 60 == 0 {
                    match &store {
                        Some(store) => debug!(
                            "Daemon heartbeat: running, store empty: {}",
                            store.is_empty()
                        ),
                        None => debug!("Daemon heartbeat: running"),
                    }
                }
                seconds += 1;
                // One-second ticks, logged once a minute
                time::sleep(Duration::from_secs(1)).await;
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        if let Some(shutdown) = &self.web_shutdown {
            shutdown.clone().notify();
        }
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Task failed: {}", e),
                Err(e) => error!("Task panicked: {}", e),
            }
        }
        Ok(())
    }
}
