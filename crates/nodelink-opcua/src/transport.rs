// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport abstraction: the boundary to the wire-level OPC UA stack.
//!
//! Everything below this trait (the binary codec, the secure channel, the
//! reconnection loop itself) belongs to the underlying protocol library.
//! The bridge observes the transport through a closed set of tagged
//! [`TransportEvent`]s delivered on a broadcast channel rather than ad hoc
//! listener attachment.

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::broadcast;

use nodelink_core::error::FlowResult;
use nodelink_core::types::EndpointId;

use crate::conversion::Variant;
use crate::types::{NodeId, UserIdentity};

// =============================================================================
// TransportState
// =============================================================================

/// Connection state of the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// Not connected.
    #[default]
    Disconnected,

    /// Connection establishment in progress.
    Connecting,

    /// Connected and ready.
    Connected,

    /// Reconnecting after a failure.
    Reconnecting,
}

impl TransportState {
    /// Returns `true` if the transport is connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

// =============================================================================
// TransportEvent
// =============================================================================

/// Lifecycle signals published by a transport.
///
/// This is the complete set; the connection layer matches it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The transport lost its connection; background reconnection begins.
    ConnectionLost,

    /// The transport started a reconnection cycle.
    StartReconnection,

    /// One backoff step of the reconnection cycle.
    Backoff {
        /// Attempt counter (1-based).
        attempt: u32,
        /// Delay before this attempt.
        delay: std::time::Duration,
    },

    /// The connection was reestablished after loss.
    ConnectionReestablished,

    /// The server closed the active session.
    SessionClosed,

    /// Periodic session liveness signal.
    KeepAlive,
}

impl TransportEvent {
    /// Returns a short name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConnectionLost => "connection_lost",
            Self::StartReconnection => "start_reconnection",
            Self::Backoff { .. } => "backoff",
            Self::ConnectionReestablished => "connection_reestablished",
            Self::SessionClosed => "session_closed",
            Self::KeepAlive => "keepalive",
        }
    }
}

// =============================================================================
// SessionHandle
// =============================================================================

/// Opaque handle to an authenticated session owned by the transport.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Server-assigned (or transport-generated) session identifier.
    pub session_id: String,

    /// The identity kind the session was authenticated with.
    pub identity_kind: &'static str,

    /// When the session was created.
    pub created_at: Instant,
}

impl SessionHandle {
    /// Creates a new handle.
    pub fn new(session_id: impl Into<String>, identity: &UserIdentity) -> Self {
        Self {
            session_id: session_id.into(),
            identity_kind: identity.kind(),
            created_at: Instant::now(),
        }
    }

    /// Returns the session age.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

// =============================================================================
// ReadOutcome / WriteOutcome
// =============================================================================

/// Status code for a successful operation.
pub const STATUS_GOOD: u32 = 0;

/// Per-node result of a read, carrying the server status code.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// The node that was read.
    pub node_id: NodeId,

    /// The value, present when the status is good.
    pub value: Option<Variant>,

    /// OPC UA status code (0 = Good).
    pub status_code: u32,
}

impl ReadOutcome {
    /// Creates a successful outcome.
    pub fn success(node_id: NodeId, value: Variant) -> Self {
        Self {
            node_id,
            value: Some(value),
            status_code: STATUS_GOOD,
        }
    }

    /// Creates a failed outcome.
    pub fn failure(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            value: None,
            status_code,
        }
    }

    /// Returns `true` if the read succeeded.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code & 0x8000_0000 == 0
    }
}

/// Per-node result of a write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The node that was written.
    pub node_id: NodeId,

    /// OPC UA status code (0 = Good).
    pub status_code: u32,
}

impl WriteOutcome {
    /// Creates a successful outcome.
    pub fn success(node_id: NodeId) -> Self {
        Self {
            node_id,
            status_code: STATUS_GOOD,
        }
    }

    /// Creates a failed outcome.
    pub fn failure(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            status_code,
        }
    }

    /// Returns `true` if the write succeeded.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code & 0x8000_0000 == 0
    }
}

// =============================================================================
// UaTransport
// =============================================================================

/// Abstract OPC UA transport.
///
/// Implementations own the wire protocol, the secure channel, and the
/// background reconnection loop (driven by the `ReconnectPolicy` supplied at
/// construction). All methods take `&self`; implementations use interior
/// mutability and must be safe to share behind an `Arc`.
///
/// # Contract
///
/// - `read_values`/`write_values` require an authenticated session and
///   return one outcome per requested node **in request order**.
/// - Lifecycle signals are delivered through `subscribe_events`; the event
///   set is closed (see [`TransportEvent`]).
/// - `create_session` performs exactly one authentication handshake per
///   call; serialization of concurrent calls is the caller's job.
#[async_trait]
pub trait UaTransport: Send + Sync {
    /// Connects to the endpoint. Idempotent when already connected.
    async fn connect(&self) -> FlowResult<()>;

    /// Disconnects from the endpoint. Idempotent when already disconnected.
    async fn disconnect(&self) -> FlowResult<()>;

    /// Returns the current transport state.
    fn state(&self) -> TransportState;

    /// Authenticates and opens a session with the given identity.
    async fn create_session(&self, identity: &UserIdentity) -> FlowResult<SessionHandle>;

    /// Closes the active session on the server.
    async fn close_session(&self) -> FlowResult<()>;

    /// Reads the values of the given nodes in one request.
    async fn read_values(&self, nodes: &[NodeId]) -> FlowResult<Vec<ReadOutcome>>;

    /// Writes the given typed values in one request.
    async fn write_values(&self, writes: &[(NodeId, Variant)]) -> FlowResult<Vec<WriteOutcome>>;

    /// Subscribes to transport lifecycle events.
    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent>;

    /// Returns the endpoint this transport targets.
    fn endpoint(&self) -> &EndpointId;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::Reconnecting.to_string(), "Reconnecting");
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Connecting.is_connected());
    }

    #[test]
    fn test_outcome_status_codes() {
        let node = NodeId::string(2, "T");

        let good = ReadOutcome::success(node.clone(), Variant::Double(1.0));
        assert!(good.is_good());
        assert_eq!(good.status_code, STATUS_GOOD);

        // BadNodeIdUnknown
        let bad = ReadOutcome::failure(node.clone(), 0x8034_0000);
        assert!(!bad.is_good());
        assert!(bad.value.is_none());

        let write = WriteOutcome::failure(node, 0x803B_0000);
        assert!(!write.is_good());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(TransportEvent::ConnectionLost.name(), "connection_lost");
        assert_eq!(
            TransportEvent::Backoff {
                attempt: 1,
                delay: std::time::Duration::from_secs(5)
            }
            .name(),
            "backoff"
        );
    }

    #[test]
    fn test_session_handle_kind() {
        let handle = SessionHandle::new("s-1", &UserIdentity::Anonymous);
        assert_eq!(handle.identity_kind, "anonymous");
    }
}
