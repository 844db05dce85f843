// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Reading store
//!
//! Append-only collections of timestamped records. Every record gets a
//! store-assigned `_id`; the timestamp is the time of insertion unless the
//! reading carries its own (conveyor speed).
//!
//! With a data directory, each collection is mirrored to a JSON-lines file
//! `<collection>.jsonl` that is replayed when the store is opened. Files stay
//! open in append mode for the lifetime of the store.

pub mod reading;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use reading::{parse_timestamp, Collection, Reading};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A persisted reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StoredRecord {
    pub fn valor(&self) -> Option<&Value> {
        self.fields.get("valor")
    }
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<Collection, Vec<StoredRecord>>,
    files: HashMap<Collection, File>,
    next_seq: u64,
}

/// Sequence part of a record id, the 16 hex digits after the timestamp
fn id_sequence(id: &str) -> Option<u64> {
    let seq = id.get(8..)?;
    if seq.len() != 16 {
        return None;
    }
    u64::from_str_radix(seq, 16).ok()
}

#[derive(Debug, Default)]
pub struct ReadingStore {
    inner: RwLock<Inner>,
    data_dir: Option<PathBuf>,
}

impl ReadingStore {
    /// Store kept in memory only
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a persistent store, replaying any existing collection files
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let mut inner = Inner::default();
        for collection in Collection::ALL {
            let path = collection_path(&data_dir, collection);
            if !path.exists() {
                continue;
            }
            let records = load_collection(&path)?;
            debug!("Loaded {} records from {}", records.len(), path.display());
            if let Some(highest) = records.iter().filter_map(|r| id_sequence(&r.id)).max() {
                inner.next_seq = inner.next_seq.max(highest.saturating_add(1));
            }
            inner.collections.insert(collection, records);
        }
        let loaded: usize = inner.collections.values().map(Vec::len).sum();
        info!(
            "Reading store opened at {} ({} records)",
            data_dir.display(),
            loaded
        );

        Ok(Self {
            inner: RwLock::new(inner),
            data_dir: Some(data_dir),
        })
    }

    /// Append a reading and return the stored record
    pub fn insert(&self, reading: &Reading) -> Result<StoredRecord, StoreError> {
        let collection = reading.collection();
        let timestamp = reading.producer_timestamp().unwrap_or_else(Utc::now);

        let mut inner = self.write();
        let record = StoredRecord {
            id: format!("{:08x}{:016x}", timestamp.timestamp() as u32, inner.next_seq),
            timestamp,
            fields: reading.fields(),
        };

        if let Some(dir) = &self.data_dir {
            let mut line = serde_json::to_string(&record)?;
            line.push('\n');
            let file = match inner.files.entry(collection) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(collection_path(dir, collection))?,
                ),
            };
            file.write_all(line.as_bytes())?;
        }

        inner.next_seq += 1;
        inner
            .collections
            .entry(collection)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    /// Most recent record by timestamp; on a tie the last inserted wins
    pub fn latest(&self, collection: Collection) -> Option<StoredRecord> {
        self.read()
            .collections
            .get(&collection)?
            .iter()
            .max_by_key(|record| record.timestamp)
            .cloned()
    }

    pub fn records(&self, collection: Collection) -> Vec<StoredRecord> {
        self.read()
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.read()
            .collections
            .get(&collection)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read().collections.values().all(Vec::is_empty)
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn collection_path(dir: &Path, collection: Collection) -> PathBuf {
    dir.join(format!("{}.jsonl", collection.name()))
}

fn load_collection(path: &Path) -> Result<Vec<StoredRecord>, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                "Skipping corrupt record at {}:{}: {}",
                path.display(),
                number + 1,
                e
            ),
        }
    }
    Ok(records)
}
