// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Climate relays
//!
//! The fan relay follows its coil directly. The humidifier has a push-button
//! style input: one on/off pulse switches it on, two pulses switch it off.

use std::sync::Arc;
use std::time::Duration;

use log::info;

use super::interlock::ActuatorState;
use crate::modbus::{RegisterGateway, TransportFailure};

/// Time between coil edges of a humidifier pulse
pub const PULSE_EDGE_DELAY: Duration = Duration::from_millis(100);

/// Number of on/off pulses sent for each humidifier command
pub fn humidifier_pulses(state: ActuatorState) -> usize {
    match state {
        ActuatorState::On => 1,
        ActuatorState::Off => 2,
    }
}

/// Fan and humidifier relays on the FieldLogger coils
#[derive(Clone)]
pub struct ClimateRelays {
    gateway: Arc<dyn RegisterGateway>,
    fan_coil: u16,
    humidifier_coil: u16,
    edge_delay: Duration,
}

impl ClimateRelays {
    pub fn new(gateway: Arc<dyn RegisterGateway>, fan_coil: u16, humidifier_coil: u16) -> Self {
        Self {
            gateway,
            fan_coil,
            humidifier_coil,
            edge_delay: PULSE_EDGE_DELAY,
        }
    }

    pub fn with_edge_delay(mut self, edge_delay: Duration) -> Self {
        self.edge_delay = edge_delay;
        self
    }

    pub async fn set_fan(&self, state: ActuatorState) -> Result<(), TransportFailure> {
        self.gateway
            .write_coil(self.fan_coil, state == ActuatorState::On)
            .await?;
        info!("Fan relay switched {}", state);
        Ok(())
    }

    /// Pulse the humidifier input; stops at the first failed write
    pub async fn set_humidifier(&self, state: ActuatorState) -> Result<(), TransportFailure> {
        for _ in 0..humidifier_pulses(state) {
            self.gateway.write_coil(self.humidifier_coil, true).await?;
            tokio::time::sleep(self.edge_delay).await;
            self.gateway.write_coil(self.humidifier_coil, false).await?;
            tokio::time::sleep(self.edge_delay).await;
        }
        info!("Humidifier switched {}", state);
        Ok(())
    }

    /// Raw holding register write
    pub async fn write_register(&self, address: u16, value: u16) -> Result<(), TransportFailure> {
        self.gateway.write_register(address, value).await?;
        info!("Register {} set to {}", address, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::{MockGateway, RecordedWrite};

    fn relays() -> (Arc<MockGateway>, ClimateRelays) {
        let gateway = Arc::new(MockGateway::new());
        let relays = ClimateRelays::new(gateway.clone(), 8, 9).with_edge_delay(Duration::ZERO);
        (gateway, relays)
    }

    #[tokio::test]
    async fn test_fan_follows_coil() {
        let (gateway, relays) = relays();
        relays.set_fan(ActuatorState::On).await.unwrap();
        assert_eq!(gateway.coil(8), Some(true));
        relays.set_fan(ActuatorState::Off).await.unwrap();
        assert_eq!(gateway.coil(8), Some(false));
    }

    #[tokio::test]
    async fn test_humidifier_pulse_counts() {
        let (gateway, relays) = relays();
        relays.set_humidifier(ActuatorState::On).await.unwrap();
        assert_eq!(
            gateway.writes(),
            vec![
                RecordedWrite::Coil { address: 9, on: true },
                RecordedWrite::Coil { address: 9, on: false },
            ]
        );

        gateway.clear_history();
        relays.set_humidifier(ActuatorState::Off).await.unwrap();
        assert_eq!(gateway.writes().len(), 4);
        assert_eq!(gateway.coil(9), Some(false));
    }

    #[tokio::test]
    async fn test_offline_device_fails() {
        let (gateway, relays) = relays();
        gateway.set_offline(true);
        assert!(relays.set_fan(ActuatorState::On).await.is_err());
        assert!(relays.set_humidifier(ActuatorState::On).await.is_err());
        assert!(relays.write_register(30, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_humidifier_failure_leaves_fan_working() {
        let (gateway, relays) = relays();
        gateway.fail_coil(9, true);
        assert!(relays.set_humidifier(ActuatorState::On).await.is_err());
        relays.set_fan(ActuatorState::On).await.unwrap();
        assert_eq!(gateway.coil(8), Some(true));
        assert_eq!(gateway.coil(9), None);
    }
}
