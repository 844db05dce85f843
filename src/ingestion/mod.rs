// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Delivery of readings from the pollers to the ingestion sink
//!
//! Pollers never call the sink directly. They hand readings to a
//! [`ReadingPublisher`], a bounded channel drained by a single forwarder task
//! that submits each reading to the configured [`IngestionSink`]. A full
//! channel drops the reading with a warning, so a slow sink can never stall a
//! poll loop. Delivery is at most once: a reading the sink refuses is logged
//! and lost, unless the producer asked for an acknowledgement with
//! [`ReadingPublisher::publish_acknowledged`] and publishes it again.

pub mod http;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::storage::{Reading, StoreError};

pub use http::HttpSink;
pub use local::LocalSink;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("ingestion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ingestion API answered {status} on /{endpoint}")]
    Status { endpoint: String, status: u16 },
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Destination of all readings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IngestionSink: Send + Sync {
    async fn submit(&self, reading: Reading) -> Result<(), SinkError>;
}

/// A queued reading, with an optional delivery acknowledgement
#[derive(Debug)]
pub struct Delivery {
    reading: Reading,
    ack: Option<oneshot::Sender<bool>>,
}

/// Producer side of the ingestion channel, cloned into every poller
#[derive(Debug, Clone)]
pub struct ReadingPublisher {
    sender: mpsc::Sender<Delivery>,
}

impl ReadingPublisher {
    /// Queue a reading without waiting.
    ///
    /// Returns `false` if the reading was dropped because the channel is
    /// full or the forwarder has stopped.
    pub fn publish(&self, reading: Reading) -> bool {
        self.enqueue(Delivery { reading, ack: None })
    }

    /// Queue a reading and get told whether the sink accepted it.
    ///
    /// `None` when the reading was dropped before reaching the forwarder.
    /// The receiver yields `true` once the sink accepted the reading; it
    /// yields `false`, or closes, when the sink refused it.
    pub fn publish_acknowledged(&self, reading: Reading) -> Option<oneshot::Receiver<bool>> {
        let (ack, receiver) = oneshot::channel();
        self.enqueue(Delivery {
            reading,
            ack: Some(ack),
        })
        .then_some(receiver)
    }

    fn enqueue(&self, delivery: Delivery) -> bool {
        match self.sender.try_send(delivery) {
            Ok(()) => true,
            Err(TrySendError::Full(delivery)) => {
                warn!(
                    "Ingestion queue full, dropping {} reading",
                    delivery.reading.collection()
                );
                false
            }
            Err(TrySendError::Closed(delivery)) => {
                warn!(
                    "Ingestion forwarder stopped, dropping {} reading",
                    delivery.reading.collection()
                );
                false
            }
        }
    }
}

/// Create the bounded channel between pollers and the forwarder
pub fn channel(capacity: usize) -> (ReadingPublisher, mpsc::Receiver<Delivery>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (ReadingPublisher { sender }, receiver)
}

/// Submit every queued reading to `sink` until all publishers are dropped.
///
/// Returns the number of readings the sink accepted.
pub async fn forward(mut receiver: mpsc::Receiver<Delivery>, sink: Arc<dyn IngestionSink>) -> u64 {
    let mut delivered = 0;
    while let Some(Delivery { reading, ack }) = receiver.recv().await {
        let collection = reading.collection();
        let accepted = match sink.submit(reading).await {
            Ok(()) => {
                delivered += 1;
                debug!("{} reading delivered", collection);
                true
            }
            Err(e) => {
                warn!("Failed to deliver {} reading: {}", collection, e);
                false
            }
        };
        if let Some(ack) = ack {
            // The producer may have stopped waiting.
            let _ = ack.send(accepted);
        }
    }
    info!("Ingestion forwarder stopped after {} readings", delivered);
    delivered
}

/// Spawn [`forward`] as a daemon task
pub fn spawn_forwarder(
    receiver: mpsc::Receiver<Delivery>,
    sink: Arc<dyn IngestionSink>,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        forward(receiver, sink).await;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Collection;

    fn status(value: i64) -> Reading {
        Reading::Status { status: value }
    }

    #[tokio::test]
    async fn test_forwarder_delivers_in_order() {
        let (publisher, receiver) = channel(8);
        let mut sink = MockIngestionSink::new();
        let mut sequence = mockall::Sequence::new();
        for expected in [1, 0, 1] {
            sink.expect_submit()
                .withf(move |reading| *reading == Reading::Status { status: expected })
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| Ok(()));
        }

        for value in [1, 0, 1] {
            assert!(publisher.publish(status(value)));
        }
        drop(publisher);

        assert_eq!(forward(receiver, Arc::new(sink)).await, 3);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_forwarder() {
        let (publisher, receiver) = channel(8);
        let mut sink = MockIngestionSink::new();
        sink.expect_submit()
            .withf(|reading| reading.collection() == Collection::Status)
            .times(1)
            .returning(|_| {
                Err(SinkError::Status {
                    endpoint: "status_logger".to_string(),
                    status: 500,
                })
            });
        sink.expect_submit()
            .withf(|reading| reading.collection() == Collection::Temperature)
            .times(1)
            .returning(|_| Ok(()));

        publisher.publish(status(1));
        publisher.publish(Reading::Temperature {
            sensor: "Sensor1".to_string(),
            valor: 21.0,
        });
        drop(publisher);

        assert_eq!(forward(receiver, Arc::new(sink)).await, 1);
    }

    #[tokio::test]
    async fn test_full_channel_drops_reading() {
        let (publisher, _receiver) = channel(1);
        assert!(publisher.publish(status(1)));
        assert!(!publisher.publish(status(0)));
    }

    #[tokio::test]
    async fn test_acknowledgement_reports_sink_outcome() {
        let (publisher, receiver) = channel(8);
        let mut sink = MockIngestionSink::new();
        let mut sequence = mockall::Sequence::new();
        sink.expect_submit()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| {
                Err(SinkError::Status {
                    endpoint: "status_logger".to_string(),
                    status: 503,
                })
            });
        sink.expect_submit()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));

        let refused = publisher.publish_acknowledged(status(1)).unwrap();
        let accepted = publisher.publish_acknowledged(status(1)).unwrap();
        drop(publisher);

        assert_eq!(forward(receiver, Arc::new(sink)).await, 1);
        assert_eq!(refused.await, Ok(false));
        assert_eq!(accepted.await, Ok(true));
    }

    #[tokio::test]
    async fn test_dropped_reading_has_no_acknowledgement() {
        let (publisher, _receiver) = channel(1);
        assert!(publisher.publish(status(1)));
        assert!(publisher.publish_acknowledged(status(0)).is_none());
    }

    #[tokio::test]
    async fn test_closed_channel_drops_reading() {
        let (publisher, receiver) = channel(4);
        drop(receiver);
        assert!(!publisher.publish(status(1)));
    }
}
