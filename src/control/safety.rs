// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Safety monitor
//!
//! Forces the conveyor output off whenever the enable interlock reads 0.
//! The write goes straight to the gateway and does not pass through
//! [`InterlockedActuator`](super::InterlockedActuator); the two are not
//! mutually excluded, the output is guaranteed off within one poll interval
//! after the interlock drops.

use std::sync::Arc;

use log::{debug, error, warn};

use super::interlock::{InterlockMap, OUTPUT_OFF};
use crate::modbus::RegisterGateway;

/// Enable interlock value that trips the monitor
pub const DISABLED: u16 = 0;

/// What one monitor tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyOutcome {
    /// Interlock not tripped, nothing written
    Clear,
    /// Interlock tripped and the output was written off
    ForcedOff,
    /// Interlock could not be read
    ReadFailed,
    /// Interlock tripped but the off write failed
    WriteFailed,
}

pub struct SafetyMonitor {
    gateway: Arc<dyn RegisterGateway>,
    enable_interlock: u16,
    actuator_output: u16,
}

impl SafetyMonitor {
    pub fn new(gateway: Arc<dyn RegisterGateway>, map: InterlockMap) -> Self {
        Self {
            gateway,
            enable_interlock: map.enable_interlock,
            actuator_output: map.actuator_output,
        }
    }

    /// One poll of the enable interlock. Never fails; problems are logged.
    pub async fn tick(&self) -> SafetyOutcome {
        let Some(enable) = self.gateway.read_register(self.enable_interlock).await else {
            warn!(
                "Safety monitor could not read enable interlock (register {})",
                self.enable_interlock
            );
            return SafetyOutcome::ReadFailed;
        };

        // Only an exact 0 trips; other non-1 values are left to the controller.
        if enable != DISABLED {
            return SafetyOutcome::Clear;
        }

        match self
            .gateway
            .write_register(self.actuator_output, OUTPUT_OFF)
            .await
        {
            Ok(()) => {
                debug!("Enable interlock is off, conveyor output forced off");
                SafetyOutcome::ForcedOff
            }
            Err(e) => {
                error!("Safety monitor failed to force conveyor off: {}", e);
                SafetyOutcome::WriteFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::{MockGateway, RecordedWrite};

    const MAP: InterlockMap = InterlockMap {
        enable_interlock: 17,
        mode_interlock: 21,
        actuator_output: 26,
    };

    #[tokio::test]
    async fn test_disabled_interlock_forces_output_off() {
        let gateway = Arc::new(MockGateway::new().with_register(17, 0).with_register(26, 1));
        let monitor = SafetyMonitor::new(gateway.clone(), MAP);

        assert_eq!(monitor.tick().await, SafetyOutcome::ForcedOff);
        assert_eq!(gateway.register(26), Some(0));
        assert_eq!(
            gateway.writes(),
            vec![RecordedWrite::Register { address: 26, value: 0 }]
        );
    }

    #[tokio::test]
    async fn test_enabled_interlock_leaves_output_alone() {
        for enable in [1u16, 2, 5] {
            let gateway =
                Arc::new(MockGateway::new().with_register(17, enable).with_register(26, 1));
            let monitor = SafetyMonitor::new(gateway.clone(), MAP);
            assert_eq!(monitor.tick().await, SafetyOutcome::Clear);
            assert!(gateway.writes().is_empty());
        }
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_fatal() {
        let gateway = Arc::new(MockGateway::new().with_register(17, 0).with_register(26, 1));
        let monitor = SafetyMonitor::new(gateway.clone(), MAP);

        gateway.fail_register(17, true);
        assert_eq!(monitor.tick().await, SafetyOutcome::ReadFailed);

        gateway.fail_register(17, false);
        gateway.fail_register(26, true);
        assert_eq!(monitor.tick().await, SafetyOutcome::WriteFailed);

        gateway.fail_register(26, false);
        assert_eq!(monitor.tick().await, SafetyOutcome::ForcedOff);
    }

    #[tokio::test]
    async fn test_monitor_undoes_an_on_after_interlock_drop() {
        use crate::control::{ActuatorState, InterlockedActuator};

        let gateway = Arc::new(
            MockGateway::new()
                .with_register(17, 1)
                .with_register(21, 0)
                .with_register(26, 0),
        );
        let actuator = InterlockedActuator::new(gateway.clone(), MAP);
        let monitor = SafetyMonitor::new(gateway.clone(), MAP);

        actuator.set_state(ActuatorState::On).await.unwrap();
        gateway.set_register(17, 0);
        assert_eq!(monitor.tick().await, SafetyOutcome::ForcedOff);
        assert_eq!(actuator.state().await, Ok(ActuatorState::Off));
    }
}
