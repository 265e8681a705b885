// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Configurable mock transport for testing the orchestrator in isolation.
//!
//! ## Design Principles
//!
//! - Configurable behavior for different test scenarios
//! - Recording of interactions for verification
//! - Thread-safe for concurrent testing
//! - Easy error injection and event injection

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};

use nodelink_core::error::{ConnectionError, FlowError, FlowResult, SessionError};
use nodelink_core::types::EndpointId;

use nodelink_opcua::transport::{
    ReadOutcome, SessionHandle, TransportEvent, TransportState, UaTransport, WriteOutcome,
};
use nodelink_opcua::types::{ConnectOptions, NodeId, UserIdentity};
use nodelink_opcua::{TransportFactory, Variant};

// =============================================================================
// MockTransport
// =============================================================================

/// A highly configurable mock transport.
pub struct MockTransport {
    endpoint: EndpointId,

    /// Stored values keyed by node.
    values: RwLock<HashMap<NodeId, Variant>>,

    /// Connection state.
    connected: AtomicBool,

    /// Whether a session is currently installed.
    session_active: AtomicBool,

    /// Force connect to fail.
    pub fail_connect: AtomicBool,

    /// Force session creation to fail.
    pub fail_create_session: AtomicBool,

    /// Force session close to fail.
    pub fail_close_session: AtomicBool,

    /// Force all reads to fail at the transport level.
    pub fail_reads: AtomicBool,

    /// Force all writes to fail at the transport level.
    pub fail_writes: AtomicBool,

    /// Per-node bad status codes, injected into otherwise good batches.
    bad_status: RwLock<HashMap<NodeId, u32>>,

    /// Return batch read results in reverse order (the dispatcher must
    /// re-align them to request order).
    pub shuffle_reads: AtomicBool,

    /// Artificial latency for connect and session creation, to widen race
    /// windows in single-flight tests.
    pub handshake_delay: Mutex<Duration>,

    /// Interaction counters.
    pub connect_calls: AtomicU32,
    /// Number of disconnect calls.
    pub disconnect_calls: AtomicU32,
    /// Number of create_session calls.
    pub session_calls: AtomicU32,
    /// Number of close_session calls.
    pub close_session_calls: AtomicU32,
    /// Number of read_values calls.
    pub read_calls: AtomicU32,
    /// Number of write_values calls.
    pub write_calls: AtomicU32,

    /// Write history for verification.
    write_history: Mutex<Vec<(NodeId, Variant)>>,

    /// Event channel for injecting lifecycle signals.
    events: broadcast::Sender<TransportEvent>,
}

impl MockTransport {
    /// Creates a mock transport for the given endpoint.
    pub fn new(endpoint: impl Into<EndpointId>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            endpoint: endpoint.into(),
            values: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(false),
            session_active: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_create_session: AtomicBool::new(false),
            fail_close_session: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            bad_status: RwLock::new(HashMap::new()),
            shuffle_reads: AtomicBool::new(false),
            handshake_delay: Mutex::new(Duration::from_millis(5)),
            connect_calls: AtomicU32::new(0),
            disconnect_calls: AtomicU32::new(0),
            session_calls: AtomicU32::new(0),
            close_session_calls: AtomicU32::new(0),
            read_calls: AtomicU32::new(0),
            write_calls: AtomicU32::new(0),
            write_history: Mutex::new(Vec::new()),
            events,
        })
    }

    /// Seeds a node value.
    pub async fn set_value(&self, node: NodeId, value: Variant) {
        self.values.write().await.insert(node, value);
    }

    /// Returns a stored node value.
    pub async fn value(&self, node: &NodeId) -> Option<Variant> {
        self.values.read().await.get(node).cloned()
    }

    /// Injects a bad status code for one node.
    pub async fn set_bad_status(&self, node: NodeId, status_code: u32) {
        self.bad_status.write().await.insert(node, status_code);
    }

    /// Injects a lifecycle event as if the wire stack had emitted it.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    /// Returns the recorded writes in call order.
    pub async fn write_history(&self) -> Vec<(NodeId, Variant)> {
        self.write_history.lock().await.clone()
    }

    /// Returns the total network-touching calls (reads + writes).
    pub fn network_calls(&self) -> u32 {
        self.read_calls.load(Ordering::SeqCst) + self.write_calls.load(Ordering::SeqCst)
    }

    /// Returns `true` while a session is installed.
    pub fn has_session(&self) -> bool {
        self.session_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UaTransport for MockTransport {
    async fn connect(&self) -> FlowResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.handshake_delay.lock().await;
        tokio::time::sleep(delay).await;

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(FlowError::connection(ConnectionError::connect_failed(
                self.endpoint.as_str(),
                "connection refused",
            )));
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> FlowResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.session_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn state(&self) -> TransportState {
        if self.connected.load(Ordering::SeqCst) {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    async fn create_session(&self, identity: &UserIdentity) -> FlowResult<SessionHandle> {
        let call = self.session_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.handshake_delay.lock().await;
        tokio::time::sleep(delay).await;

        if self.fail_create_session.load(Ordering::SeqCst) {
            return Err(FlowError::session(SessionError::create_failed(
                self.endpoint.as_str(),
                "authentication rejected",
            )));
        }

        if !self.connected.load(Ordering::SeqCst) {
            return Err(FlowError::connection(ConnectionError::NotConnected));
        }

        self.session_active.store(true, Ordering::SeqCst);
        Ok(SessionHandle::new(format!("session-{call}"), identity))
    }

    async fn close_session(&self) -> FlowResult<()> {
        self.close_session_calls.fetch_add(1, Ordering::SeqCst);
        self.session_active.store(false, Ordering::SeqCst);

        if self.fail_close_session.load(Ordering::SeqCst) {
            return Err(FlowError::session(SessionError::close_failed(
                "close rejected",
            )));
        }
        Ok(())
    }

    async fn read_values(&self, nodes: &[NodeId]) -> FlowResult<Vec<ReadOutcome>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(FlowError::read_failed(
                nodes
                    .first()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "batch".to_string()),
                "read rejected",
            ));
        }

        let values = self.values.read().await;
        let bad = self.bad_status.read().await;

        let mut outcomes: Vec<ReadOutcome> = nodes
            .iter()
            .map(|node| {
                if let Some(status) = bad.get(node) {
                    return ReadOutcome::failure(node.clone(), *status);
                }
                match values.get(node) {
                    Some(value) => ReadOutcome::success(node.clone(), value.clone()),
                    // BadNodeIdUnknown
                    None => ReadOutcome::failure(node.clone(), 0x8034_0000),
                }
            })
            .collect();

        if self.shuffle_reads.load(Ordering::SeqCst) {
            outcomes.reverse();
        }

        Ok(outcomes)
    }

    async fn write_values(&self, writes: &[(NodeId, Variant)]) -> FlowResult<Vec<WriteOutcome>> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FlowError::write_failed(
                writes
                    .first()
                    .map(|(n, _)| n.to_string())
                    .unwrap_or_else(|| "batch".to_string()),
                "write rejected",
            ));
        }

        let bad = self.bad_status.read().await;
        let mut outcomes = Vec::with_capacity(writes.len());
        let mut history = self.write_history.lock().await;
        let mut values = self.values.write().await;

        for (node, value) in writes {
            if let Some(status) = bad.get(node) {
                outcomes.push(WriteOutcome::failure(node.clone(), *status));
                continue;
            }
            values.insert(node.clone(), value.clone());
            history.push((node.clone(), value.clone()));
            outcomes.push(WriteOutcome::success(node.clone()));
        }

        Ok(outcomes)
    }

    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn endpoint(&self) -> &EndpointId {
        &self.endpoint
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}

// =============================================================================
// MockFactory
// =============================================================================

/// Transport factory that creates and retains [`MockTransport`]s, so tests
/// can reach the transport behind any pooled connection.
pub struct MockFactory {
    created: Mutex<Vec<Arc<MockTransport>>>,
    created_count: AtomicU32,
}

impl MockFactory {
    /// Creates an empty factory.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Vec::new()),
            created_count: AtomicU32::new(0),
        })
    }

    /// Returns how many transports have been created.
    pub fn created_count(&self) -> u32 {
        self.created_count.load(Ordering::SeqCst)
    }

    /// Returns the transport created for an endpoint, if any.
    pub fn transport_for(&self, endpoint: &EndpointId) -> Option<Arc<MockTransport>> {
        self.created
            .try_lock()
            .ok()?
            .iter()
            .find(|t| t.endpoint() == endpoint)
            .cloned()
    }

    /// Returns the most recently created transport.
    pub fn last_transport(&self) -> Option<Arc<MockTransport>> {
        self.created.try_lock().ok()?.last().cloned()
    }
}

impl TransportFactory for MockFactory {
    fn create(&self, options: &ConnectOptions) -> Arc<dyn UaTransport> {
        self.created_count.fetch_add(1, Ordering::SeqCst);
        let transport = MockTransport::new(options.endpoint.clone());

        if let Ok(mut created) = self.created.try_lock() {
            created.push(transport.clone());
        }

        transport
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            created_count: AtomicU32::new(0),
        }
    }
}
