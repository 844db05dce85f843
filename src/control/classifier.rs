// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Small/large part classification from two pulse inputs
//!
//! The part sensors cannot tell part sizes apart directly. A large part keeps
//! the large channel active while the small channel pulses, so the category
//! of a part is decided when the small channel's pulse ends, by looking at
//! whether the large channel was active during that window.
//!
//! ```text
//! small  ___/‾‾‾‾\____      -> small part
//! large  _____________
//!
//! small  ___/‾‾‾‾\____      -> large part
//! large  ___/‾‾‾‾‾‾‾\_
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::modbus::RegisterGateway;

/// Register value of a channel at rest
pub const QUIESCENT: u16 = 0;

/// Register value of a channel during a pulse
pub const ACTIVE: u16 = 5;

/// Category of a counted part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartCategory {
    Small,
    Large,
}

impl PartCategory {
    /// Sensor label under which counts of this category are recorded
    pub fn sensor_label(self) -> &'static str {
        match self {
            PartCategory::Small => "ContadorPequenas",
            PartCategory::Large => "ContadorGrandes",
        }
    }
}

impl fmt::Display for PartCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartCategory::Small => write!(f, "small"),
            PartCategory::Large => write!(f, "large"),
        }
    }
}

/// One completed and classified pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassifiedEvent {
    pub category: PartCategory,
    /// Running count of the category, including this part
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

/// Edge-detection state of the two pulse channels and the running counts.
///
/// Each instance is independent; nothing is shared between classifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PulseClassifier {
    small_active: bool,
    large_active: bool,
    count_small: u64,
    count_large: u64,
}

impl PulseClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, category: PartCategory) -> u64 {
        match category {
            PartCategory::Small => self.count_small,
            PartCategory::Large => self.count_large,
        }
    }

    /// Whether a pulse is in progress on the small and large channels
    pub fn active_flags(&self) -> (bool, bool) {
        (self.small_active, self.large_active)
    }

    /// Feed one sample of both channels.
    ///
    /// A `None` on either channel is a failed read: the sample is ignored
    /// entirely and no state changes.
    pub fn observe(
        &mut self,
        small: Option<u16>,
        large: Option<u16>,
        at: DateTime<Utc>,
    ) -> Option<ClassifiedEvent> {
        let (Some(small), Some(large)) = (small, large) else {
            return None;
        };

        if small == ACTIVE && !self.small_active {
            self.small_active = true;
        }
        if large == ACTIVE && !self.large_active {
            self.large_active = true;
        }

        if small == QUIESCENT && self.small_active {
            let category = if self.large_active {
                self.count_large += 1;
                PartCategory::Large
            } else {
                self.count_small += 1;
                PartCategory::Small
            };
            // The overlapping large pulse is consumed by this event.
            self.small_active = false;
            self.large_active = false;

            return Some(ClassifiedEvent {
                category,
                sequence: self.count(category),
                timestamp: at,
            });
        }

        if large == QUIESCENT && self.large_active {
            // Large pulse without any small pulse: no rule classifies it.
            debug!("Large pulse ended without a small pulse, not counted");
            self.large_active = false;
        }

        None
    }
}

/// Register addresses of the two pulse inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseInputs {
    pub small: u16,
    pub large: u16,
}

/// Polls the two pulse inputs and classifies completed pulses.
pub struct PartCounter {
    gateway: Arc<dyn RegisterGateway>,
    inputs: PulseInputs,
    classifier: PulseClassifier,
}

impl PartCounter {
    pub fn new(gateway: Arc<dyn RegisterGateway>, inputs: PulseInputs) -> Self {
        Self {
            gateway,
            inputs,
            classifier: PulseClassifier::new(),
        }
    }

    pub fn classifier(&self) -> &PulseClassifier {
        &self.classifier
    }

    /// Read both inputs once and feed the classifier
    pub async fn tick(&mut self) -> Option<ClassifiedEvent> {
        let small = self.gateway.read_register(self.inputs.small).await;
        let large = self.gateway.read_register(self.inputs.large).await;

        if small.is_none() || large.is_none() {
            warn!(
                "Pulse input read failed (small register {}: {:?}, large register {}: {:?})",
                self.inputs.small, small, self.inputs.large, large
            );
            return None;
        }

        let event = self.classifier.observe(small, large, Utc::now());
        if let Some(event) = &event {
            info!("{} part #{} counted", event.category, event.sequence);
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::MockGateway;

    fn run(samples: &[(Option<u16>, Option<u16>)]) -> (PulseClassifier, Vec<ClassifiedEvent>) {
        let mut classifier = PulseClassifier::new();
        let events = samples
            .iter()
            .filter_map(|(small, large)| classifier.observe(*small, *large, Utc::now()))
            .collect();
        (classifier, events)
    }

    fn ok(samples: &[(u16, u16)]) -> Vec<(Option<u16>, Option<u16>)> {
        samples.iter().map(|(s, l)| (Some(*s), Some(*l))).collect()
    }

    #[test]
    fn test_single_small_pulse() {
        let (classifier, events) = run(&ok(&[(0, 0), (5, 0), (0, 0)]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, PartCategory::Small);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(classifier.count(PartCategory::Small), 1);
        assert_eq!(classifier.count(PartCategory::Large), 0);
    }

    #[test]
    fn test_overlapped_pulse_counts_once_as_large() {
        let (classifier, events) = run(&ok(&[(0, 0), (5, 5), (0, 5), (0, 0)]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, PartCategory::Large);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(classifier.count(PartCategory::Small), 0);
        assert_eq!(classifier.count(PartCategory::Large), 1);
        assert_eq!(classifier.active_flags(), (false, false));
    }

    #[test]
    fn test_large_rising_after_small_still_counts_large() {
        let (_, events) = run(&ok(&[(5, 0), (5, 5), (0, 5), (0, 0)]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, PartCategory::Large);
    }

    #[test]
    fn test_large_only_pulse_is_not_counted() {
        let (classifier, events) = run(&ok(&[(0, 5), (0, 5), (0, 0)]));
        assert!(events.is_empty());
        assert_eq!(classifier, PulseClassifier::new());
    }

    #[test]
    fn test_failed_read_changes_nothing() {
        let mut classifier = PulseClassifier::new();
        assert!(classifier.observe(Some(5), Some(0), Utc::now()).is_none());
        let before = classifier.clone();

        assert!(classifier.observe(None, Some(0), Utc::now()).is_none());
        assert!(classifier.observe(Some(0), None, Utc::now()).is_none());
        assert!(classifier.observe(None, None, Utc::now()).is_none());
        assert_eq!(classifier, before);

        // The pulse completes normally once reads recover.
        let event = classifier.observe(Some(0), Some(0), Utc::now());
        assert_eq!(event.map(|e| e.category), Some(PartCategory::Small));
    }

    #[test]
    fn test_sustained_active_level_counts_once() {
        let (_, events) = run(&ok(&[(5, 0), (5, 0), (5, 0), (0, 0), (0, 0)]));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_sequences_strictly_increase_per_category() {
        let mut samples = Vec::new();
        for i in 0..10 {
            let large = if i % 3 == 0 { 5 } else { 0 };
            samples.extend([(5, large), (0, large), (0, 0)]);
        }
        let (classifier, events) = run(&ok(&samples));

        for category in [PartCategory::Small, PartCategory::Large] {
            let sequences: Vec<u64> = events
                .iter()
                .filter(|e| e.category == category)
                .map(|e| e.sequence)
                .collect();
            let expected: Vec<u64> = (1..=sequences.len() as u64).collect();
            assert_eq!(sequences, expected, "{}", category);
            assert_eq!(classifier.count(category), sequences.len() as u64);
        }
        assert_eq!(events.len(), 10);
    }

    #[test]
    fn test_intermediate_values_are_neither_edge() {
        let (_, events) = run(&ok(&[(3, 0), (0, 0), (5, 1), (1, 1), (0, 0)]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, PartCategory::Small);
    }

    #[tokio::test]
    async fn test_part_counter_reads_both_inputs() {
        let gateway = Arc::new(MockGateway::new().with_register(15, 0).with_register(16, 0));
        gateway.script_reads(15, [Some(5), None, Some(0)]);
        gateway.script_reads(16, [Some(5), Some(5), Some(0)]);

        let mut counter = PartCounter::new(gateway.clone(), PulseInputs { small: 15, large: 16 });
        assert!(counter.tick().await.is_none());
        assert!(counter.tick().await.is_none());
        let event = counter.tick().await;

        assert_eq!(event.map(|e| e.category), Some(PartCategory::Large));
        assert_eq!(gateway.reads(), vec![15, 16, 15, 16, 15, 16]);
    }
}
