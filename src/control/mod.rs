// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Control and event logic on top of the register gateway
//!
//! - [`InterlockedActuator`]: conveyor on/off guarded by the enable and mode
//!   interlocks
//! - [`SafetyMonitor`]: forces the conveyor off when the enable interlock drops
//! - [`PulseClassifier`] / [`PartCounter`]: small/large part counting
//! - [`ConveyorSpeedEstimator`]: belt speed from the movement pulse input
//! - [`ClimateRelays`]: fan and humidifier coils

pub mod classifier;
pub mod interlock;
pub mod relay;
pub mod safety;
pub mod speed;

pub use classifier::{ClassifiedEvent, PartCategory, PartCounter, PulseClassifier, PulseInputs};
pub use interlock::{
    ActuationError, ActuatorState, InterlockMap, InterlockedActuator, InvalidState, RejectReason,
};
pub use relay::ClimateRelays;
pub use safety::{SafetyMonitor, SafetyOutcome};
pub use speed::ConveyorSpeedEstimator;
