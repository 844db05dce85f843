// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Interlocked conveyor actuator
//!
//! Switching the conveyor on requires two interlocks to hold at the moment of
//! the command: the enable input (channel 4) must read exactly 1 and the mode
//! input (channel 8) must read exactly 0 (automatic). Both are read fresh on
//! every attempt; nothing is cached between calls. The output write is always
//! the last step, so a failed or rejected check never reaches the device
//! output.
//!
//! Switching off is never interlocked.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RegisterMapConfig;
use crate::modbus::{RegisterGateway, TransportFailure};

/// Register value meaning "enabled" on the enable interlock
pub const ENABLED: u16 = 1;

/// Register value meaning "automatic" on the mode interlock
pub const AUTOMATIC_MODE: u16 = 0;

/// Output register value for "on"
pub const OUTPUT_ON: u16 = 1;

/// Output register value for "off"
pub const OUTPUT_OFF: u16 = 0;

/// The two legal states of the conveyor output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorState {
    On,
    Off,
}

impl ActuatorState {
    /// Register value written for this state
    pub fn register_value(self) -> u16 {
        match self {
            ActuatorState::On => OUTPUT_ON,
            ActuatorState::Off => OUTPUT_OFF,
        }
    }

    /// Interpret an output register value; anything but 1 reads as off
    pub fn from_register(value: u16) -> Self {
        if value == OUTPUT_ON {
            ActuatorState::On
        } else {
            ActuatorState::Off
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorState::On => write!(f, "on"),
            ActuatorState::Off => write!(f, "off"),
        }
    }
}

/// Error returned when parsing anything other than "on" or "off"
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid actuator state '{0}', use 'on' or 'off'")]
pub struct InvalidState(pub String);

impl FromStr for ActuatorState {
    type Err = InvalidState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(ActuatorState::On),
            "off" => Ok(ActuatorState::Off),
            other => Err(InvalidState(other.to_string())),
        }
    }
}

/// Why an "on" command was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("safety interlock active")]
    SafetyInterlockActive,
    #[error("manual mode active")]
    ManualModeActive,
}

/// Outcome of a refused or failed actuation.
///
/// A rejection is an expected business outcome, a transport failure is a fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuationError {
    #[error("{0}")]
    Rejected(RejectReason),
    #[error(transparent)]
    Transport(#[from] TransportFailure),
}

/// Register addresses involved in conveyor control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterlockMap {
    pub enable_interlock: u16,
    pub mode_interlock: u16,
    pub actuator_output: u16,
}

impl From<&RegisterMapConfig> for InterlockMap {
    fn from(registers: &RegisterMapConfig) -> Self {
        Self {
            enable_interlock: registers.enable_interlock,
            mode_interlock: registers.mode_interlock,
            actuator_output: registers.actuator_output,
        }
    }
}

/// Conveyor output guarded by the enable and mode interlocks.
///
/// Stateless apart from its gateway handle: permission is re-derived from
/// the device on every call.
#[derive(Clone)]
pub struct InterlockedActuator {
    gateway: Arc<dyn RegisterGateway>,
    map: InterlockMap,
}

impl InterlockedActuator {
    pub fn new(gateway: Arc<dyn RegisterGateway>, map: InterlockMap) -> Self {
        Self { gateway, map }
    }

    pub fn map(&self) -> InterlockMap {
        self.map
    }

    /// Drive the conveyor to `desired`.
    ///
    /// # Errors
    ///
    /// * `ActuationError::Rejected(SafetyInterlockActive)` when turning on
    ///   with the enable interlock not reading 1; this check comes first
    /// * `ActuationError::Rejected(ManualModeActive)` when turning on with
    ///   the mode interlock not reading 0
    /// * `ActuationError::Transport` when any read or the final write fails
    pub async fn set_state(&self, desired: ActuatorState) -> Result<ActuatorState, ActuationError> {
        if desired == ActuatorState::On {
            self.check_interlocks().await?;
        }

        self.gateway
            .write_register(self.map.actuator_output, desired.register_value())
            .await?;

        info!("Conveyor output switched {}", desired);
        Ok(desired)
    }

    /// Current output state as read from the device
    pub async fn state(&self) -> Result<ActuatorState, ActuationError> {
        let value = self
            .gateway
            .read_register(self.map.actuator_output)
            .await
            .ok_or_else(|| {
                TransportFailure(format!(
                    "cannot read output register {}",
                    self.map.actuator_output
                ))
            })?;
        Ok(ActuatorState::from_register(value))
    }

    async fn check_interlocks(&self) -> Result<(), ActuationError> {
        let enable = self.read_interlock(self.map.enable_interlock).await?;
        if enable != ENABLED {
            warn!(
                "Refusing to start conveyor: enable interlock reads {} (register {})",
                enable, self.map.enable_interlock
            );
            return Err(ActuationError::Rejected(RejectReason::SafetyInterlockActive));
        }

        let mode = self.read_interlock(self.map.mode_interlock).await?;
        if mode != AUTOMATIC_MODE {
            warn!(
                "Refusing to start conveyor: mode interlock reads {} (register {})",
                mode, self.map.mode_interlock
            );
            return Err(ActuationError::Rejected(RejectReason::ManualModeActive));
        }

        debug!("Interlocks satisfied");
        Ok(())
    }

    async fn read_interlock(&self, address: u16) -> Result<u16, ActuationError> {
        self.gateway.read_register(address).await.ok_or_else(|| {
            ActuationError::Transport(TransportFailure(format!(
                "cannot read interlock register {}",
                address
            )))
        })
    }
}
