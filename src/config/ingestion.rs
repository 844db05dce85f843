// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Ingestion sink and storage configuration

use serde::{Deserialize, Serialize};

/// Where pollers deliver their readings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestionTarget {
    /// Append directly to the in-process store served by the API
    Local,
    /// POST to a remote ingestion API at `base_url`
    Http,
}

/// Settings for the path from pollers to the ingestion sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub target: IngestionTarget,

    /// Base URL of the remote API, required when `target` is `http`
    /// (for example `http://127.0.0.1:8000`).
    pub base_url: Option<String>,

    /// Per-request timeout for the HTTP sink, in milliseconds
    pub request_timeout_ms: u64,

    /// Capacity of the channel between pollers and the sink.
    ///
    /// Readings produced while the channel is full are dropped.
    pub channel_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            target: IngestionTarget::Local,
            base_url: None,
            request_timeout_ms: 5000,
            channel_capacity: 256,
        }
    }
}

/// Persistence of the reading store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON-lines file per collection.
    ///
    /// When absent, readings are kept in memory only.
    pub data_dir: Option<String>,
}
