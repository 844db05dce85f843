// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! HTTP API server configuration
//!
//! This module defines the structure for configuring the Rocket server that
//! receives readings and exposes relay and conveyor control.

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP ingestion and control API.
///
/// ### TLS Configuration
///
/// For HTTPS, both `cert` and `key` must be provided as Base64-encoded PEM
/// files. If either is missing, the server runs in plain HTTP mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Start the HTTP server with the daemon.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// The TCP port the server listens on.
    ///
    /// Valid range is 1-65534. Default value is 8000.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The network address the server binds to.
    ///
    /// Default is "127.0.0.1"; use "0.0.0.0" to bind to all IPv4 interfaces.
    #[serde(default = "default_address")]
    pub address: String,

    /// The server name reported in HTTP headers and logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// SSL/TLS certificate in PEM format, Base64 encoded.
    #[serde(default)]
    pub cert: Option<String>,

    /// SSL/TLS private key in PEM format, Base64 encoded.
    #[serde(default)]
    pub key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    8000
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_name() -> String {
    format!("FieldLoggerBridge/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
            address: default_address(),
            name: default_name(),
            cert: None,
            key: None,
        }
    }
}
