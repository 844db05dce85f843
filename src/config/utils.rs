// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use base64::Engine;
use log::debug;

use super::pollers::MAX_IDLE_TIMEOUT_S;
use super::{Config, IngestionTarget};

/// Output the embedded JSON schema to the console.
///
/// Called when the `--show-config-schema` flag is provided on the command line.
///
/// # Example
///
/// ```bash
/// ./fieldlogger_bridge --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Only IPv4 and IPv6 literals are accepted; host names are not resolved.
pub fn is_valid_ip_address(addr: &str) -> bool {
    addr.parse::<std::net::IpAddr>().is_ok()
}

/// Validates the configuration against rules the JSON schema cannot express.
///
/// # Validation Rules
///
/// - **TLS**: certificate and key are both present or both absent, and both
///   are valid base64
/// - **Addresses**: device and API addresses are IP literals
/// - **Ports**: device and API ports are within 1-65534
/// - **Register map**: interlock and output registers are distinct
/// - **Intervals**: no poller runs with a zero interval, the conveyor idle
///   timeout is at most one day
/// - **Ingestion**: the HTTP target has a base URL
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    match (&config.api.cert, &config.api.key) {
        (Some(cert), Some(key)) => {
            base64::engine::general_purpose::STANDARD
                .decode(cert)
                .context("SSL certificate is not valid base64")?;
            base64::engine::general_purpose::STANDARD
                .decode(key)
                .context("SSL key is not valid base64")?;
        }
        (Some(_), None) => anyhow::bail!("SSL certificate provided without a key"),
        (None, Some(_)) => anyhow::bail!("SSL key provided without a certificate"),
        (None, None) => {}
    }

    if !is_valid_ip_address(&config.device.address) {
        anyhow::bail!("Invalid device address: {}", config.device.address);
    }
    if !is_valid_ip_address(&config.api.address) {
        anyhow::bail!("Invalid API address: {}", config.api.address);
    }

    for (what, port) in [("device", config.device.port), ("API", config.api.port)] {
        if !(1..=65534).contains(&port) {
            anyhow::bail!("Invalid {} port number: {}", what, port);
        }
    }

    let registers = &config.registers;
    if registers.enable_interlock == registers.mode_interlock
        || registers.enable_interlock == registers.actuator_output
        || registers.mode_interlock == registers.actuator_output
    {
        anyhow::bail!(
            "Interlock and output registers must be distinct (enable {}, mode {}, output {})",
            registers.enable_interlock,
            registers.mode_interlock,
            registers.actuator_output
        );
    }
    if registers.small_pulse == registers.large_pulse {
        anyhow::bail!(
            "Small and large pulse inputs share register {}",
            registers.small_pulse
        );
    }

    let pollers = &config.pollers;
    let mut intervals = vec![
        ("safety_monitor", pollers.safety_monitor.interval_ms),
        ("part_counter", pollers.part_counter.interval_ms),
        ("conveyor_speed", pollers.conveyor_speed.interval_ms),
        ("link_status", pollers.link_status.interval_ms),
    ];
    intervals.extend(
        pollers
            .analog_channels
            .iter()
            .map(|channel| (channel.name.as_str(), channel.interval_ms)),
    );
    if let Some((name, _)) = intervals.iter().find(|(_, interval)| *interval == 0) {
        anyhow::bail!("Poller '{}' has a zero interval", name);
    }

    if pollers.conveyor_speed.pulse_time_s <= 0.0 {
        anyhow::bail!("Conveyor pulse time must be positive");
    }
    if pollers.conveyor_speed.idle_timeout_s > MAX_IDLE_TIMEOUT_S {
        anyhow::bail!(
            "Conveyor idle timeout {}s exceeds {}s",
            pollers.conveyor_speed.idle_timeout_s,
            MAX_IDLE_TIMEOUT_S
        );
    }

    if config.ingestion.target == IngestionTarget::Http && config.ingestion.base_url.is_none() {
        anyhow::bail!("HTTP ingestion target requires a base_url");
    }
    if config.ingestion.channel_capacity == 0 {
        anyhow::bail!("Ingestion channel capacity must be at least 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn test_cert_without_key_is_rejected() {
        let mut config = Config::default();
        config.api.cert = Some("AAAA".to_string());
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(err.to_string().contains("without a key"));
    }

    #[test]
    fn test_shared_interlock_register_is_rejected() {
        let mut config = Config::default();
        config.registers.mode_interlock = config.registers.enable_interlock;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_http_target_requires_base_url() {
        let mut config = Config::default();
        config.ingestion.target = IngestionTarget::Http;
        assert!(validate_specific_rules(&config).is_err());
        config.ingestion.base_url = Some("http://127.0.0.1:8000".to_string());
        assert!(validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = Config::default();
        config.pollers.analog_channels[1].interval_ms = 0;
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(err.to_string().contains("dome_temperature"));
    }

    #[test]
    fn test_ip_address_validation() {
        assert!(is_valid_ip_address("192.168.0.30"));
        assert!(is_valid_ip_address("::1"));
        assert!(!is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("fieldlogger.local"));
    }
}
