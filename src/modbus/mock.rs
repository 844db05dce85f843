// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! In-memory register gateway
//!
//! Stands in for the FieldLogger in unit tests and dry runs. Registers and
//! coils live in hash maps; failures can be injected globally or per register,
//! and scripted read sequences let a test replay a pulse train tick by tick.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::gateway::{RegisterGateway, TransportFailure};

/// A write observed by the mock, in call order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedWrite {
    Register { address: u16, value: u16 },
    Coil { address: u16, on: bool },
}

#[derive(Debug, Default)]
struct MockState {
    registers: HashMap<u16, u16>,
    coils: HashMap<u16, bool>,
    scripted: HashMap<u16, VecDeque<Option<u16>>>,
    failing_registers: HashSet<u16>,
    failing_coils: HashSet<u16>,
    offline: bool,
    writes: Vec<RecordedWrite>,
    reads: Vec<u16>,
}

/// Mock FieldLogger implementing [`RegisterGateway`]
#[derive(Debug, Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style register preset
    pub fn with_register(self, address: u16, value: u16) -> Self {
        self.set_register(address, value);
        self
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.lock().registers.insert(address, value);
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.lock().registers.get(&address).copied()
    }

    pub fn coil(&self, address: u16) -> Option<bool> {
        self.lock().coils.get(&address).copied()
    }

    /// Queue successive read results for one register.
    ///
    /// Queued values are consumed one per read before falling back to the
    /// stored register value. `None` entries simulate a failed read.
    pub fn script_reads<I>(&self, address: u16, values: I)
    where
        I: IntoIterator<Item = Option<u16>>,
    {
        self.lock()
            .scripted
            .entry(address)
            .or_default()
            .extend(values);
    }

    /// Make every access to `address` fail until cleared
    pub fn fail_register(&self, address: u16, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing_registers.insert(address);
        } else {
            state.failing_registers.remove(&address);
        }
    }

    /// Make every write to coil `address` fail until cleared
    pub fn fail_coil(&self, address: u16, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing_coils.insert(address);
        } else {
            state.failing_coils.remove(&address);
        }
    }

    /// Simulate a device that cannot be reached at all
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    /// Addresses read so far, in call order
    pub fn reads(&self) -> Vec<u16> {
        self.lock().reads.clone()
    }

    pub fn clear_history(&self) {
        let mut state = self.lock();
        state.writes.clear();
        state.reads.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned lock only happens after a panicking test; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RegisterGateway for MockGateway {
    async fn read_register(&self, address: u16) -> Option<u16> {
        let mut state = self.lock();
        state.reads.push(address);
        if state.offline || state.failing_registers.contains(&address) {
            return None;
        }
        if let Some(next) = state.scripted.get_mut(&address).and_then(|q| q.pop_front()) {
            return next;
        }
        state.registers.get(&address).copied()
    }

    async fn write_register(&self, address: u16, value: u16) -> Result<(), TransportFailure> {
        let mut state = self.lock();
        if state.offline || state.failing_registers.contains(&address) {
            return Err(TransportFailure(format!(
                "mock write to register {} refused",
                address
            )));
        }
        state.registers.insert(address, value);
        state
            .writes
            .push(RecordedWrite::Register { address, value });
        Ok(())
    }

    async fn write_coil(&self, address: u16, on: bool) -> Result<(), TransportFailure> {
        let mut state = self.lock();
        if state.offline || state.failing_coils.contains(&address) {
            return Err(TransportFailure(format!(
                "mock write to coil {} refused",
                address
            )));
        }
        state.coils.insert(address, on);
        state.writes.push(RecordedWrite::Coil { address, on });
        Ok(())
    }
}
