// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Tests for the TCP register gateway against the FieldLogger simulator
//!
//! These tests start a simulator on an ephemeral port and drive it through
//! `TcpGateway`, the same code path the bridge uses against the real device.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use fieldlogger_bridge::control::{
    ActuationError, ActuatorState, InterlockMap, InterlockedActuator, PartCategory, PartCounter,
    PulseInputs, RejectReason, SafetyMonitor, SafetyOutcome,
};
use fieldlogger_bridge::modbus::{FieldLoggerSimulator, RegisterGateway, TcpGateway};
use tokio::time;

const MAP: InterlockMap = InterlockMap {
    enable_interlock: 17,
    mode_interlock: 21,
    actuator_output: 26,
};

/// Start a simulator in the background and a gateway pointing at it
async fn start_test_simulator(
) -> Result<(FieldLoggerSimulator, TcpGateway, tokio::task::JoinHandle<()>), Box<dyn std::error::Error>>
{
    let simulator = FieldLoggerSimulator::new();
    let (socket_addr, handle) = simulator.bind(SocketAddr::from_str("127.0.0.1:0")?).await?;
    println!("Test simulator started on: {}", socket_addr);

    // Give the server a moment to start
    time::sleep(Duration::from_millis(50)).await;

    let gateway = TcpGateway::new(socket_addr, 1, Duration::from_secs(2));
    Ok((simulator, gateway, handle))
}

#[tokio::test]
async fn test_read_default_registers() -> Result<(), Box<dyn std::error::Error>> {
    let (_simulator, gateway, handle) = start_test_simulator().await?;

    assert_eq!(gateway.read_register(17).await, Some(1));
    assert_eq!(gateway.read_register(21).await, Some(0));
    assert_eq!(gateway.read_register(26).await, Some(0));
    assert_eq!(gateway.read_register(3).await, Some(21));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_writes_reach_the_device() -> Result<(), Box<dyn std::error::Error>> {
    let (simulator, gateway, handle) = start_test_simulator().await?;

    gateway.write_register(26, 1).await?;
    assert_eq!(simulator.register(26), Some(1));

    gateway.write_coil(8, true).await?;
    assert_eq!(simulator.coil(8), Some(true));
    gateway.write_coil(8, false).await?;
    assert_eq!(simulator.coil(8), Some(false));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_exception_response_is_a_plain_failure() -> Result<(), Box<dyn std::error::Error>> {
    let (_simulator, gateway, handle) = start_test_simulator().await?;

    // Outside the simulated map: the device answers with an exception.
    assert_eq!(gateway.read_register(200).await, None);
    assert!(gateway.write_register(200, 1).await.is_err());
    assert!(gateway.write_coil(200, true).await.is_err());

    // One failed request leaves nothing behind for the next one.
    assert_eq!(gateway.read_register(17).await, Some(1));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_unreachable_device_is_a_plain_failure() {
    // Bind then drop to get a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let socket_addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = TcpGateway::new(socket_addr, 1, Duration::from_millis(500));
    assert_eq!(gateway.read_register(17).await, None);
    assert!(gateway.write_register(26, 0).await.is_err());
}

#[tokio::test]
async fn test_interlocked_actuator_over_tcp() -> Result<(), Box<dyn std::error::Error>> {
    let (simulator, gateway, handle) = start_test_simulator().await?;
    let actuator = InterlockedActuator::new(Arc::new(gateway), MAP);

    assert_eq!(actuator.set_state(ActuatorState::On).await, Ok(ActuatorState::On));
    assert_eq!(simulator.register(26), Some(1));

    simulator.set_register(21, 1);
    assert_eq!(
        actuator.set_state(ActuatorState::On).await,
        Err(ActuationError::Rejected(RejectReason::ManualModeActive))
    );

    simulator.set_register(17, 0);
    assert_eq!(
        actuator.set_state(ActuatorState::On).await,
        Err(ActuationError::Rejected(RejectReason::SafetyInterlockActive))
    );

    assert_eq!(actuator.set_state(ActuatorState::Off).await, Ok(ActuatorState::Off));
    assert_eq!(actuator.state().await, Ok(ActuatorState::Off));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_safety_monitor_over_tcp() -> Result<(), Box<dyn std::error::Error>> {
    let (simulator, gateway, handle) = start_test_simulator().await?;
    let monitor = SafetyMonitor::new(Arc::new(gateway), MAP);

    simulator.set_register(26, 1);
    assert_eq!(monitor.tick().await, SafetyOutcome::Clear);
    assert_eq!(simulator.register(26), Some(1));

    simulator.set_register(17, 0);
    assert_eq!(monitor.tick().await, SafetyOutcome::ForcedOff);
    assert_eq!(simulator.register(26), Some(0));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_part_counter_over_tcp() -> Result<(), Box<dyn std::error::Error>> {
    let (simulator, gateway, handle) = start_test_simulator().await?;
    let mut counter = PartCounter::new(Arc::new(gateway), PulseInputs { small: 15, large: 16 });

    let mut events = Vec::new();
    for (small, large) in [(0, 0), (5, 0), (0, 0), (5, 5), (0, 5), (0, 0)] {
        simulator.set_register(15, small);
        simulator.set_register(16, large);
        if let Some(event) = counter.tick().await {
            events.push((event.category, event.sequence));
        }
    }

    assert_eq!(
        events,
        vec![(PartCategory::Small, 1), (PartCategory::Large, 1)]
    );

    handle.abort();
    Ok(())
}
