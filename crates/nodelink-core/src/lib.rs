// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nodelink-core
//!
//! Core contracts and shared types for the NODELINK OPC UA flow bridge.
//!
//! This crate provides the vocabulary used across all NODELINK components:
//!
//! - **Types**: `EndpointId`, `ActionKind`, `SecurityMode`, `SecurityPolicy`,
//!   `DataTypeTag`
//! - **Error**: the unified `FlowError` hierarchy
//! - **Message**: data and status record types for the two output channels
//! - **Bus**: the structurally separate data/status broadcast channels
//! - **Retry**: the transport reconnection policy surface
//!
//! ## Example
//!
//! ```rust
//! use nodelink_core::bus::FlowBus;
//! use nodelink_core::message::{ClientStatus, StatusEnvelope, StatusRecord};
//! use nodelink_core::types::EndpointId;
//!
//! let bus = FlowBus::with_default_capacity();
//! let mut status_rx = bus.status.subscribe();
//!
//! bus.status.publish(StatusEnvelope::record_only(StatusRecord::new(
//!     EndpointId::new("opc.tcp://localhost:4840"),
//!     ClientStatus::Connected,
//! )));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod bus;
pub mod error;
pub mod message;
pub mod retry;
pub mod types;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use bus::{BusStats, DataBus, FlowBus, StatusBus};
pub use error::{
    BusError, ConfigError, ConnectionError, FlowError, FlowResult, ProtocolError, SessionError,
    ValidationError,
};
pub use message::{
    ClientStatus, DataBody, DataEnvelope, DataRecord, IndicatorFill, IndicatorShape,
    StatusEnvelope, StatusIndicator, StatusRecord,
};
pub use retry::ReconnectPolicy;
pub use types::{ActionKind, DataTypeTag, EndpointId, SecurityMode, SecurityPolicy};
