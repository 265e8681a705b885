// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The two flow-facing output channels.
//!
//! - **DataBus**: broadcast channel for successful action results (1:N)
//! - **StatusBus**: broadcast channel for lifecycle/status records (1:N)
//!
//! The channels are deliberately separate objects: a subscriber to one never
//! observes traffic from the other. Both use `tokio::sync::broadcast` for
//! efficient fan-out; publishing to a channel with no subscribers is treated
//! as a dropped (counted, logged at trace) emission, not an error, because
//! lifecycle events fire whether or not anyone is listening.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::message::{DataEnvelope, StatusEnvelope};

// =============================================================================
// BusStats
// =============================================================================

/// Publication statistics for one channel.
#[derive(Debug, Default)]
pub struct BusStats {
    /// Emissions delivered to at least one subscriber.
    published: AtomicU64,
    /// Emissions dropped because nobody was subscribed.
    dropped: AtomicU64,
}

impl BusStats {
    /// Records a delivered emission.
    fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped emission.
    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of delivered emissions.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Returns the number of dropped emissions.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// =============================================================================
// DataBus
// =============================================================================

/// Broadcast channel carrying successful action results.
#[derive(Debug)]
pub struct DataBus {
    sender: broadcast::Sender<DataEnvelope>,
    stats: BusStats,
}

impl DataBus {
    /// Creates a data bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            stats: BusStats::default(),
        }
    }

    /// Subscribes to the data channel.
    pub fn subscribe(&self) -> broadcast::Receiver<DataEnvelope> {
        self.sender.subscribe()
    }

    /// Publishes a data envelope.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, envelope: DataEnvelope) -> usize {
        match self.sender.send(envelope) {
            Ok(count) => {
                self.stats.record_published();
                count
            }
            Err(_) => {
                self.stats.record_dropped();
                tracing::trace!("Data emission dropped: no subscribers");
                0
            }
        }
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns the publication statistics.
    pub fn stats(&self) -> &BusStats {
        &self.stats
    }
}

// =============================================================================
// StatusBus
// =============================================================================

/// Broadcast channel carrying lifecycle/status records.
#[derive(Debug)]
pub struct StatusBus {
    sender: broadcast::Sender<StatusEnvelope>,
    stats: BusStats,
}

impl StatusBus {
    /// Creates a status bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            stats: BusStats::default(),
        }
    }

    /// Subscribes to the status channel.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEnvelope> {
        self.sender.subscribe()
    }

    /// Publishes a status envelope.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, envelope: StatusEnvelope) -> usize {
        match self.sender.send(envelope) {
            Ok(count) => {
                self.stats.record_published();
                count
            }
            Err(_) => {
                self.stats.record_dropped();
                tracing::trace!("Status emission dropped: no subscribers");
                0
            }
        }
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns the publication statistics.
    pub fn stats(&self) -> &BusStats {
        &self.stats
    }
}

// =============================================================================
// FlowBus
// =============================================================================

/// The pair of output channels handed to every component that emits.
#[derive(Debug)]
pub struct FlowBus {
    /// The data channel.
    pub data: DataBus,
    /// The status channel.
    pub status: StatusBus,
}

impl FlowBus {
    /// Creates both channels with the given capacities.
    pub fn new(data_capacity: usize, status_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            data: DataBus::new(data_capacity),
            status: StatusBus::new(status_capacity),
        })
    }

    /// Creates both channels with a shared default capacity.
    pub fn with_default_capacity() -> Arc<Self> {
        Self::new(256, 256)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ClientStatus, DataRecord, StatusRecord};
    use crate::types::{DataTypeTag, EndpointId};

    fn endpoint() -> EndpointId {
        EndpointId::new("opc.tcp://localhost:4840")
    }

    #[tokio::test]
    async fn test_data_bus_publish_subscribe() {
        let bus = DataBus::new(16);
        let mut rx = bus.subscribe();

        let envelope = DataEnvelope::single(
            endpoint(),
            DataRecord::new("ns=2;s=A", serde_json::json!(1), DataTypeTag::Int32),
        );

        assert_eq!(bus.publish(envelope.clone()), 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received, envelope);
        assert_eq!(bus.stats().published(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_counted() {
        let bus = StatusBus::new(16);
        let envelope = StatusEnvelope::record_only(StatusRecord::new(
            endpoint(),
            ClientStatus::Connected,
        ));

        assert_eq!(bus.publish(envelope), 0);
        assert_eq!(bus.stats().dropped(), 1);
        assert_eq!(bus.stats().published(), 0);
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let bus = FlowBus::with_default_capacity();
        let mut data_rx = bus.data.subscribe();
        let mut status_rx = bus.status.subscribe();

        bus.status.publish(StatusEnvelope::record_only(StatusRecord::new(
            endpoint(),
            ClientStatus::Disconnected,
        )));

        let status = status_rx.recv().await.unwrap();
        assert_eq!(status.record.status, ClientStatus::Disconnected);

        // Nothing must appear on the data channel.
        assert!(matches!(
            data_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_fan_out() {
        let bus = DataBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let envelope = DataEnvelope::batch(endpoint(), vec![]);
        assert_eq!(bus.publish(envelope.clone()), 2);

        assert_eq!(rx1.recv().await.unwrap(), envelope);
        assert_eq!(rx2.recv().await.unwrap(), envelope);
    }
}
