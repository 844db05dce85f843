// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! In-process sink writing straight into the reading store
//!
//! Inserts may append to a file, so they run on the blocking thread pool.

use std::sync::Arc;

use async_trait::async_trait;

use super::{IngestionSink, SinkError};
use crate::storage::{Reading, ReadingStore};

pub struct LocalSink {
    store: Arc<ReadingStore>,
}

impl LocalSink {
    pub fn new(store: Arc<ReadingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IngestionSink for LocalSink {
    async fn submit(&self, reading: Reading) -> Result<(), SinkError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.insert(&reading)).await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Collection;

    #[tokio::test]
    async fn test_local_sink_appends_to_store() {
        let store = Arc::new(ReadingStore::in_memory());
        let sink = LocalSink::new(store.clone());
        sink.submit(Reading::SmallCount {
            sensor: "ContadorPequenas".to_string(),
            valor: 3,
        })
        .await
        .unwrap();
        assert_eq!(store.len(Collection::SmallCount), 1);
    }

    #[tokio::test]
    async fn test_local_sink_persists_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ReadingStore::open(dir.path()).unwrap());
        let sink = LocalSink::new(store);
        for status in [1, 0] {
            sink.submit(Reading::Status { status }).await.unwrap();
        }

        let reopened = ReadingStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(Collection::Status), 2);
    }
}
