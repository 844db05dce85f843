// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Configuration management for the FieldLogger bridge
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against an embedded JSON schema before deserialization.
//!
//! ## Configuration Structure
//!
//! - `device`: FieldLogger Modbus TCP connection
//! - `registers`: register and coil addresses on the FieldLogger
//! - `api`: HTTP ingestion and control server
//! - `ingestion`: how pollers deliver readings
//! - `storage`: persistence of received readings
//! - `pollers`: intervals and parameters of the background loops
//!
//! ## Usage
//!
//! ```no_run
//! use fieldlogger_bridge::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("10.0.0.30".to_string()), // Device address
//!     None,                          // Device port
//!     None,                          // API address
//!     Some(8001),                    // API port
//! );
//!
//! println!("API port: {}", config.api.port);
//! ```

pub mod api;
pub mod device;
pub mod ingestion;
pub mod pollers;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use api::ApiConfig;
pub use device::{DeviceConfig, RegisterMapConfig};
pub use ingestion::{IngestionConfig, IngestionTarget, StorageConfig};
pub use pollers::{
    AnalogChannelConfig, AnalogKind, ConveyorSpeedConfig, LinkStatusConfig, PartCounterConfig,
    PollersConfig, SafetyMonitorConfig,
};
pub use utils::{is_valid_ip_address, output_config_schema};

/// Root configuration structure for the bridge.
///
/// Every section falls back to its default when missing from the file, so a
/// minimal configuration only needs to name the FieldLogger address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// FieldLogger connection settings.
    #[serde(default)]
    pub device: DeviceConfig,

    /// FieldLogger register map.
    #[serde(default)]
    pub registers: RegisterMapConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Delivery of readings to the ingestion sink.
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Persistence of the reading store.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Background polling loops.
    #[serde(default)]
    pub pollers: PollersConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file that fails
    /// schema validation, deserialization or the additional rules produces a
    /// `*.sample.yaml` next to it and an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        Self::from_yaml_str(&contents).inspect_err(|err| {
            error!("Configuration error in {}: {}", path.display(), err);
            if let Err(e) = Self::create_sample_config(path) {
                error!("Failed to create sample config: {}", e);
            }
        })
    }

    /// Parse, validate and deserialize a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value =
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?;

        // An empty document means "all defaults"
        let yaml_value = match yaml_value {
            serde_yml::Value::Null => serde_yml::Value::Mapping(Default::default()),
            other => other,
        };

        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating configuration against schema");
        if let Err(error) = validator.validate(&json_value) {
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = serde_json::from_value(json_value)
            .context("Failed to deserialize configuration")?;

        utils::validate_specific_rules(&config)?;

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only arguments that were provided override the loaded values.
    ///
    /// # Parameters
    ///
    /// * `device_address` - FieldLogger IP address
    /// * `device_port` - FieldLogger Modbus TCP port
    /// * `api_address` - Network address for the HTTP server to bind to
    /// * `api_port` - TCP port for the HTTP server
    pub fn apply_args(
        &mut self,
        device_address: Option<String>,
        device_port: Option<u16>,
        api_address: Option<String>,
        api_port: Option<u16>,
    ) {
        if let Some(address) = device_address {
            debug!("Overriding device address from command line: {}", address);
            self.device.address = address;
        }
        if let Some(port) = device_port {
            debug!("Overriding device port from command line: {}", port);
            self.device.port = port;
        }
        if let Some(address) = api_address {
            debug!("Overriding API address from command line: {}", address);
            self.api.address = address;
        }
        if let Some(port) = api_port {
            debug!("Overriding API port from command line: {}", port);
            self.api.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.device.port, 502);
        assert_eq!(config.registers.enable_interlock, 17);
        assert_eq!(config.pollers.analog_channels.len(), 3);
        assert_eq!(config.ingestion.target, IngestionTarget::Local);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_yaml_str(
            "device:\n  address: 10.1.2.3\npollers:\n  part_counter:\n    interval_ms: 50\n",
        )
        .unwrap();
        assert_eq!(config.device.address, "10.1.2.3");
        assert_eq!(config.device.unit_id, 1);
        assert_eq!(config.pollers.part_counter.interval_ms, 50);
        assert!(config.pollers.part_counter.enabled);
        assert_eq!(config.pollers.safety_monitor.interval_ms, 1000);
    }

    #[test]
    fn test_schema_rejects_wrong_type() {
        let err = Config::from_yaml_str("device:\n  port: \"not a port\"\n").unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }

    #[test]
    fn test_apply_args_only_overrides_given_values() {
        let mut config = Config::default();
        config.apply_args(None, Some(1502), Some("0.0.0.0".to_string()), None);
        assert_eq!(config.device.address, "192.168.0.30");
        assert_eq!(config.device.port, 1502);
        assert_eq!(config.api.address, "0.0.0.0");
        assert_eq!(config.api.port, 8000);
    }
}
