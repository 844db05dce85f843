// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Conveyor speed estimation
//!
//! The belt raises the movement input once per fixed travel distance. The
//! estimator does not measure the time between pulses: any rising edge sets
//! the nominal speed `distance / pulse_time`, and the speed falls back to 0
//! once no edge has been seen for longer than the idle timeout.
//!
//! Publication is change-driven. The speed is compared rounded to two
//! decimals against the last value that was successfully published.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use super::classifier::ACTIVE;
use crate::config::pollers::MAX_IDLE_TIMEOUT_S;
use crate::config::ConveyorSpeedConfig;

/// Round to two decimals, the publication resolution
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone)]
pub struct ConveyorSpeedEstimator {
    nominal_speed: f64,
    idle_timeout: Duration,
    previous: u16,
    last_movement: Option<DateTime<Utc>>,
    speed: f64,
    last_published: Option<f64>,
}

impl ConveyorSpeedEstimator {
    pub fn new(distance_m: f64, pulse_time_s: f64, idle_timeout: Duration) -> Self {
        Self {
            nominal_speed: distance_m / pulse_time_s,
            idle_timeout,
            previous: 0,
            last_movement: None,
            speed: 0.0,
            last_published: None,
        }
    }

    /// Build from the configuration, clamping the idle timeout to
    /// [`MAX_IDLE_TIMEOUT_S`]
    pub fn from_config(config: &ConveyorSpeedConfig) -> Self {
        let seconds = config.idle_timeout_s.min(MAX_IDLE_TIMEOUT_S);
        if seconds != config.idle_timeout_s {
            warn!(
                "Conveyor idle timeout {}s clamped to {}s",
                config.idle_timeout_s, seconds
            );
        }
        let idle_timeout = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(Duration::zero);
        Self::new(config.distance_m, config.pulse_time_s, idle_timeout)
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Speed applied on every rising edge, in m/s
    pub fn nominal_speed(&self) -> f64 {
        self.nominal_speed
    }

    /// Current estimate, in m/s
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Feed one sample of the movement input.
    ///
    /// A failed read (`None`) counts as "no pulse": the idle timeout still
    /// applies and the input is remembered as 0, so the next 5 is an edge.
    pub fn observe(&mut self, value: Option<u16>, now: DateTime<Utc>) -> f64 {
        match value {
            Some(ACTIVE) if self.previous != ACTIVE => {
                self.last_movement = Some(now);
                if self.speed != self.nominal_speed {
                    info!("Conveyor movement detected");
                }
                self.speed = self.nominal_speed;
            }
            _ => self.apply_idle_timeout(now),
        }

        self.previous = value.unwrap_or(0);
        self.speed
    }

    fn apply_idle_timeout(&mut self, now: DateTime<Utc>) {
        let Some(last) = self.last_movement else {
            return;
        };
        if now - last > self.idle_timeout && self.speed != 0.0 {
            info!("No conveyor pulse for {}s, conveyor stopped", self.idle_timeout.num_seconds());
            self.speed = 0.0;
        }
    }

    /// Speed to publish, if it differs from the last published value.
    ///
    /// The first call always yields a value.
    pub fn pending_publication(&self) -> Option<f64> {
        match self.last_published {
            Some(published) if round2(published) == round2(self.speed) => None,
            _ => Some(self.speed),
        }
    }

    /// Record a successful publication of `value`
    pub fn mark_published(&mut self, value: f64) {
        debug!("Conveyor speed {:.4} m/s published", value);
        self.last_published = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> ConveyorSpeedEstimator {
        ConveyorSpeedEstimator::new(0.455, 17.0, Duration::seconds(60))
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn test_rising_edge_sets_nominal_speed() {
        let mut speed = estimator();
        assert_eq!(speed.observe(Some(0), at(0)), 0.0);
        let value = speed.observe(Some(5), at(1));
        assert!((value - 0.455 / 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_speed_drops_after_idle_timeout() {
        let mut speed = estimator();
        speed.observe(Some(5), at(0));
        speed.observe(Some(5), at(30));
        assert!(speed.speed() > 0.0);
        speed.observe(Some(5), at(60));
        assert!(speed.speed() > 0.0, "exactly the timeout is not past it");
        assert_eq!(speed.observe(Some(5), at(61)), 0.0);
    }

    #[test]
    fn test_held_level_is_not_an_edge() {
        let mut speed = estimator();
        speed.observe(Some(5), at(0));
        for t in 1..=70 {
            speed.observe(Some(5), at(t));
        }
        assert_eq!(speed.speed(), 0.0);

        speed.observe(Some(0), at(71));
        assert!(speed.observe(Some(5), at(72)) > 0.0);
    }

    #[test]
    fn test_failed_read_resets_previous_state() {
        let mut speed = estimator();
        speed.observe(Some(5), at(0));
        speed.observe(None, at(65));
        assert_eq!(speed.speed(), 0.0);
        // After a failed read, a 5 is a new edge.
        assert!(speed.observe(Some(5), at(66)) > 0.0);
    }

    #[test]
    fn test_no_timeout_before_first_movement() {
        let mut speed = estimator();
        assert_eq!(speed.observe(None, at(1000)), 0.0);
        assert_eq!(speed.observe(Some(0), at(5000)), 0.0);
    }

    #[test]
    fn test_publication_is_change_driven() {
        let mut speed = estimator();
        speed.observe(Some(0), at(0));
        assert_eq!(speed.pending_publication(), Some(0.0));
        speed.mark_published(0.0);
        assert_eq!(speed.pending_publication(), None);

        speed.observe(Some(5), at(1));
        let pending = speed.pending_publication();
        assert!(pending.is_some());

        // Not marked: a failed publish is offered again on the next check.
        speed.observe(Some(5), at(2));
        assert_eq!(speed.pending_publication(), pending);
        speed.mark_published(pending.unwrap());
        assert_eq!(speed.pending_publication(), None);
    }

    #[test]
    fn test_oversized_idle_timeout_is_clamped() {
        let config = ConveyorSpeedConfig {
            idle_timeout_s: 10_000_000_000_000_000,
            ..ConveyorSpeedConfig::default()
        };
        let speed = ConveyorSpeedEstimator::from_config(&config);
        assert_eq!(speed.idle_timeout(), Duration::seconds(86_400));

        let config = ConveyorSpeedConfig {
            idle_timeout_s: u64::MAX,
            ..ConveyorSpeedConfig::default()
        };
        let speed = ConveyorSpeedEstimator::from_config(&config);
        assert!(speed.idle_timeout() > Duration::zero());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.455 / 17.0), 0.03);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(1.236), 1.24);
    }
}
