// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Sink posting readings to a remote ingestion API
//!
//! Each reading is a `POST {base_url}/{endpoint}` with the reading's JSON body.
//! There is no retry: the forwarder logs the failure and moves on.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::{IngestionSink, SinkError};
use crate::storage::Reading;

#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSink {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, reading: &Reading) -> String {
        format!("{}/{}", self.base_url, reading.collection().endpoint())
    }
}

#[async_trait]
impl IngestionSink for HttpSink {
    async fn submit(&self, reading: Reading) -> Result<(), SinkError> {
        let url = self.url_for(&reading);
        let response = self.client.post(&url).json(&reading.body()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                endpoint: reading.collection().endpoint().to_string(),
                status: status.as_u16(),
            });
        }
        debug!("Posted {} reading to {}", reading.collection(), url);
        Ok(())
    }
}
