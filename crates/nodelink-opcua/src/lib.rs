// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nodelink-opcua
//!
//! OPC UA connection/session orchestrator for the NODELINK flow bridge.
//!
//! This crate is the core of the bridge: a pooled registry of per-endpoint
//! connections, each owning at most one authenticated session, with
//! reconnection observation, keepalive monitoring, and typed read/write
//! dispatch layered on top.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         ClientNode                              │
//! │        (inbound message → resolve → validate → dispatch)        │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ConnectionPool                            │
//! │              (endpoint identity → Connection, 1:1)              │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Connection + SessionCell                    │
//! │       (state machine, single-flight connect and session)        │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     UaTransport (trait)                         │
//! │            (wire codec and secure channel boundary)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Invariants the orchestrator maintains:
//!
//! - at most one connection per endpoint (pool entry creation is atomic)
//! - at most one live session per connection (single-flight creation)
//! - actions are validated before any network activity
//! - data and status emissions travel on structurally separate channels
//!
//! # Example
//!
//! ```rust,ignore
//! use nodelink_opcua::{ClientNode, InboundMessage};
//! use nodelink_core::bus::FlowBus;
//! use nodelink_core::types::ActionKind;
//!
//! let bus = FlowBus::with_default_capacity();
//! let node = ClientNode::new("plant-a", factory, bus)
//!     .with_default_config(config);
//!
//! let mut data_rx = node.subscribe_data();
//! node.handle(
//!     InboundMessage::new()
//!         .with_action(ActionKind::Read)
//!         .with_topic("ns=2;s=Temperature"),
//! )
//! .await;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod connection;
pub mod conversion;
pub mod dispatch;
pub mod node;
pub mod pool;
pub mod report;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(feature = "real-transport")]
pub mod real_transport;

// Re-export commonly used types
pub use connection::{Connection, ConnectionState};
pub use conversion::{DataConverter, Variant};
pub use dispatch::{ActionDispatcher, DispatchStats, PendingAction};
pub use node::{ClientNode, InboundMessage};
pub use pool::{ConnectionPool, TransportFactory};
pub use report::Reporter;
pub use session::{SessionCell, SessionState, SessionStats};
pub use transport::{
    ReadOutcome, SessionHandle, TransportEvent, TransportState, UaTransport, WriteOutcome,
    STATUS_GOOD,
};
pub use types::{
    ConnectOptions, ConnectOptionsBuilder, NodeId, NodeIdentifier, ResolvedTarget, UserIdentity,
};

#[cfg(feature = "real-transport")]
pub use real_transport::RealUaTransport;
