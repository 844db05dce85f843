// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Readings produced by the pollers and the collections they are kept in

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::control::{ClassifiedEvent, PartCategory};

/// Append-only collection of the reading store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Status,
    Temperature,
    Humidity,
    DomeTemperature,
    Speed,
    SmallCount,
    LargeCount,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Status,
        Collection::Temperature,
        Collection::Humidity,
        Collection::DomeTemperature,
        Collection::Speed,
        Collection::SmallCount,
        Collection::LargeCount,
    ];

    /// Name used for the persistence file
    pub fn name(self) -> &'static str {
        match self {
            Collection::Status => "status",
            Collection::Temperature => "temperatura",
            Collection::Humidity => "humidade",
            Collection::DomeTemperature => "temperatura_cupula",
            Collection::Speed => "velocidade",
            Collection::SmallCount => "contador_pequenas",
            Collection::LargeCount => "contador_grandes",
        }
    }

    /// Ingestion API route receiving readings of this collection
    pub fn endpoint(self) -> &'static str {
        match self {
            Collection::Status => "status_logger",
            Collection::Temperature => "temperatura_logger",
            Collection::Humidity => "humidade_logger",
            Collection::DomeTemperature => "temperatura_cupula",
            Collection::Speed => "velocidade_logger",
            Collection::SmallCount => "contador_unidades_logger",
            Collection::LargeCount => "contador_unidades_logger_grandes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value on its way to the ingestion sink
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Field device reachability, 1 reachable or 0 unreachable
    Status { status: i64 },
    Temperature { sensor: String, valor: f64 },
    Humidity { sensor: String, valor: f64 },
    DomeTemperature { sensor: String, valor: f64 },
    /// Conveyor speed in m/s, stamped by the producer
    Speed { timestamp: DateTime<Utc>, valor: f64 },
    SmallCount { sensor: String, valor: u64 },
    LargeCount { sensor: String, valor: u64 },
}

impl Reading {
    pub fn collection(&self) -> Collection {
        match self {
            Reading::Status { .. } => Collection::Status,
            Reading::Temperature { .. } => Collection::Temperature,
            Reading::Humidity { .. } => Collection::Humidity,
            Reading::DomeTemperature { .. } => Collection::DomeTemperature,
            Reading::Speed { .. } => Collection::Speed,
            Reading::SmallCount { .. } => Collection::SmallCount,
            Reading::LargeCount { .. } => Collection::LargeCount,
        }
    }

    /// Timestamp chosen by the producer; all other readings are stamped on receipt
    pub fn producer_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Reading::Speed { timestamp, .. } => Some(*timestamp),
            _ => None,
        }
    }

    /// JSON body posted to the ingestion API
    pub fn body(&self) -> Value {
        match self {
            Reading::Status { status } => json!({ "status": status }),
            Reading::Temperature { sensor, valor }
            | Reading::Humidity { sensor, valor }
            | Reading::DomeTemperature { sensor, valor } => {
                json!({ "sensor": sensor, "valor": valor })
            }
            Reading::Speed { timestamp, valor } => {
                json!({ "timestamp": timestamp.to_rfc3339(), "valor": valor })
            }
            Reading::SmallCount { sensor, valor } | Reading::LargeCount { sensor, valor } => {
                json!({ "sensor": sensor, "valor": valor })
            }
        }
    }

    /// Stored fields, without the timestamp
    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = match self.body() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.remove("timestamp");
        fields
    }
}

impl From<ClassifiedEvent> for Reading {
    fn from(event: ClassifiedEvent) -> Self {
        let sensor = event.category.sensor_label().to_string();
        match event.category {
            PartCategory::Small => Reading::SmallCount {
                sensor,
                valor: event.sequence,
            },
            PartCategory::Large => Reading::LargeCount {
                sensor,
                valor: event.sequence,
            },
        }
    }
}

/// Parse an ISO-8601 timestamp, with or without an offset.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Some(with_offset.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_maps_to_count_reading() {
        let event = ClassifiedEvent {
            category: PartCategory::Large,
            sequence: 7,
            timestamp: Utc::now(),
        };
        let reading = Reading::from(event);
        assert_eq!(reading.collection(), Collection::LargeCount);
        assert_eq!(reading.body(), json!({"sensor": "ContadorGrandes", "valor": 7}));
    }

    #[test]
    fn test_speed_fields_exclude_timestamp() {
        let reading = Reading::Speed {
            timestamp: Utc::now(),
            valor: 0.03,
        };
        assert!(reading.body().get("timestamp").is_some());
        let fields = reading.fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["valor"], json!(0.03));
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let utc = parse_timestamp("2025-06-01T12:30:00Z").unwrap();
        assert_eq!(parse_timestamp("2025-06-01T12:30:00"), Some(utc));
        assert_eq!(parse_timestamp("2025-06-01T13:30:00+01:00"), Some(utc));
        assert!(parse_timestamp("2025-06-01T12:30:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
