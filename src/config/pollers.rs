// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Polling task configuration
//!
//! Each poller runs on a fixed interval. Intervals are in milliseconds.

use serde::{Deserialize, Serialize};

/// Settings for all background pollers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollersConfig {
    pub safety_monitor: SafetyMonitorConfig,
    pub part_counter: PartCounterConfig,
    pub conveyor_speed: ConveyorSpeedConfig,
    pub analog_channels: Vec<AnalogChannelConfig>,
    pub link_status: LinkStatusConfig,
}

impl Default for PollersConfig {
    fn default() -> Self {
        Self {
            safety_monitor: SafetyMonitorConfig::default(),
            part_counter: PartCounterConfig::default(),
            conveyor_speed: ConveyorSpeedConfig::default(),
            analog_channels: AnalogChannelConfig::factory_defaults(),
            link_status: LinkStatusConfig::default(),
        }
    }
}

/// Forces the conveyor off whenever the enable interlock drops
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyMonitorConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for SafetyMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1000,
        }
    }
}

/// Small/large part counting from the two pulse inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartCounterConfig {
    pub enabled: bool,
    /// Short interval so that no pulse is missed
    pub interval_ms: u64,
}

impl Default for PartCounterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 100,
        }
    }
}

/// Longest accepted conveyor idle timeout, one day
pub const MAX_IDLE_TIMEOUT_S: u64 = 86_400;

/// Conveyor speed estimation from the movement pulse input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConveyorSpeedConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// Belt travel between two pulses, in metres
    pub distance_m: f64,
    /// Time the belt takes to travel `distance_m`, in seconds
    pub pulse_time_s: f64,
    /// Without a new pulse for this long the conveyor is considered stopped,
    /// at most [`MAX_IDLE_TIMEOUT_S`]
    pub idle_timeout_s: u64,
}

impl Default for ConveyorSpeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1000,
            distance_m: 0.455,
            pulse_time_s: 17.0,
            idle_timeout_s: 60,
        }
    }
}

/// Kind of analog measurement, selects the destination collection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalogKind {
    Temperature,
    DomeTemperature,
    Humidity,
}

/// One analog input published as `raw * scale + offset`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogChannelConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub kind: AnalogKind,
    pub register: u16,
    /// Sensor label sent with every reading
    pub sensor: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    /// Round the published value to this many decimals
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default = "default_analog_interval")]
    pub interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_scale() -> f64 {
    1.0
}

fn default_analog_interval() -> u64 {
    5000
}

impl AnalogChannelConfig {
    /// The three analog channels wired on the production FieldLogger
    pub fn factory_defaults() -> Vec<Self> {
        vec![
            Self {
                name: "temperature".to_string(),
                enabled: true,
                kind: AnalogKind::Temperature,
                register: 3,
                sensor: "Sensor1".to_string(),
                scale: 1.0,
                offset: 0.0,
                decimals: None,
                interval_ms: default_analog_interval(),
            },
            Self {
                name: "dome_temperature".to_string(),
                enabled: true,
                kind: AnalogKind::DomeTemperature,
                register: 4,
                sensor: "SensorCupula".to_string(),
                scale: 1.0,
                offset: 1.0,
                decimals: Some(2),
                interval_ms: default_analog_interval(),
            },
            Self {
                name: "humidity".to_string(),
                enabled: true,
                kind: AnalogKind::Humidity,
                register: 5,
                sensor: "SensorHum".to_string(),
                scale: 1.0,
                offset: 0.0,
                decimals: Some(2),
                interval_ms: default_analog_interval(),
            },
        ]
    }
}

/// Periodic TCP reachability probe of the field device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkStatusConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for LinkStatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 15000,
            connect_timeout_ms: 5000,
        }
    }
}
