// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Field device connection and register map configuration
//!
//! The register addresses are 0-based Modbus PDU addresses taken from the
//! FieldLogger map (holding register 40015 is address 14, and so on).

use serde::{Deserialize, Serialize};

/// Connection settings for the FieldLogger Modbus TCP server.
///
/// # Example
///
/// ```
/// use fieldlogger_bridge::config::DeviceConfig;
///
/// let device = DeviceConfig {
///     address: "10.0.0.30".to_string(),
///     ..DeviceConfig::default()
/// };
/// assert_eq!(device.port, 502);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// IP address of the FieldLogger
    pub address: String,

    /// Modbus TCP port (standard port is 502)
    pub port: u16,

    /// Modbus unit identifier (slave id)
    pub unit_id: u8,

    /// Timeout applied separately to connecting and to each request, in milliseconds
    pub timeout_ms: u64,

    /// Refuse to start when the device cannot be reached at launch.
    ///
    /// When false, an unreachable device is only logged and the pollers keep
    /// retrying on every tick.
    pub require_at_startup: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "192.168.0.30".to_string(),
            port: 502,
            unit_id: 1,
            timeout_ms: 3000,
            require_at_startup: false,
        }
    }
}

/// Addresses of the registers and coils the bridge reads and drives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegisterMapConfig {
    /// Channel 4: conveyor enable interlock, 1 when enabled
    pub enable_interlock: u16,

    /// Channel 8: mode interlock, 0 in automatic mode, 1 in manual mode
    pub mode_interlock: u16,

    /// Conveyor / green light output register
    pub actuator_output: u16,

    /// Digital input pulsing for every small part
    pub small_pulse: u16,

    /// Digital input pulsing for large parts
    pub large_pulse: u16,

    /// Digital input pulsing as the conveyor moves
    pub speed_pulse: u16,

    /// Coil driving the fan relay
    pub fan_relay_coil: u16,

    /// Coil driving the humidifier push-button relay
    pub humidifier_relay_coil: u16,
}

impl Default for RegisterMapConfig {
    fn default() -> Self {
        Self {
            enable_interlock: 17,
            mode_interlock: 21,
            actuator_output: 26,
            small_pulse: 15,
            large_pulse: 16,
            speed_pulse: 14,
            fan_relay_coil: 8,
            humidifier_relay_coil: 9,
        }
    }
}
