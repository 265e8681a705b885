// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Status reporting: lifecycle signals → status-channel emissions.
//!
//! The reporter is the single place internal events become user-visible.
//! Each emission pairs a structured [`StatusRecord`] with, for most signals,
//! a visual [`StatusIndicator`] (color, shape, short label). Status records
//! never travel on the data channel.

use std::sync::Arc;
use std::time::Duration;

use nodelink_core::bus::FlowBus;
use nodelink_core::message::{
    format_delay, ClientStatus, StatusEnvelope, StatusIndicator, StatusRecord,
};
use nodelink_core::types::EndpointId;

// =============================================================================
// Reporter
// =============================================================================

/// Publishes lifecycle and error records for one endpoint.
#[derive(Clone)]
pub struct Reporter {
    bus: Arc<FlowBus>,
    endpoint: EndpointId,
}

impl Reporter {
    /// Creates a reporter for the given endpoint.
    pub fn new(bus: Arc<FlowBus>, endpoint: EndpointId) -> Self {
        Self { bus, endpoint }
    }

    /// Returns the endpoint this reporter speaks for.
    pub fn endpoint(&self) -> &EndpointId {
        &self.endpoint
    }

    /// Initial connect in progress.
    pub fn connecting(&self) {
        self.emit(
            StatusRecord::new(self.endpoint.clone(), ClientStatus::Connecting),
            Some(StatusIndicator::reconnecting("Connecting")),
        );
    }

    /// Connection established (initial connect).
    pub fn connected(&self) {
        self.emit(
            StatusRecord::new(self.endpoint.clone(), ClientStatus::Connected),
            Some(StatusIndicator::connected("Connected")),
        );
    }

    /// Connection reestablished after loss.
    pub fn reestablished(&self) {
        self.emit(
            StatusRecord::new(self.endpoint.clone(), ClientStatus::Connected),
            Some(StatusIndicator::connected("Connection reestablished")),
        );
    }

    /// A reconnection cycle started.
    pub fn start_reconnection(&self) {
        self.emit(
            StatusRecord::new(self.endpoint.clone(), ClientStatus::Reconnecting),
            Some(StatusIndicator::reconnecting("Starting reconnection")),
        );
    }

    /// One backoff step of a reconnection cycle.
    pub fn backoff(&self, attempt: u32, delay: Duration) {
        let label = format!(
            "Reconnecting in {} (attempt {})",
            format_delay(delay),
            attempt
        );
        self.emit(
            StatusRecord::new(self.endpoint.clone(), ClientStatus::Reconnecting),
            Some(StatusIndicator::reconnecting(label)),
        );
    }

    /// The transport connection was lost.
    pub fn connection_lost(&self) {
        self.emit(
            StatusRecord::new(self.endpoint.clone(), ClientStatus::Disconnected),
            Some(StatusIndicator::lost("Connection lost")),
        );
    }

    /// The server closed the session. Record-only: the connection itself is
    /// still up, so the indicator is left untouched.
    pub fn session_closed(&self) {
        self.emit(
            StatusRecord::with_error(
                self.endpoint.clone(),
                ClientStatus::Disconnected,
                format!("Session closed for endpoint: {}", self.endpoint),
            ),
            None,
        );
    }

    /// Periodic session liveness signal.
    pub fn keep_alive(&self) {
        self.emit(
            StatusRecord::new(self.endpoint.clone(), ClientStatus::KeepAlive),
            Some(StatusIndicator::connected("Session keep-alive")),
        );
    }

    /// Deliberate disconnect during shutdown.
    pub fn shutdown(&self) {
        self.emit(
            StatusRecord::new(self.endpoint.clone(), ClientStatus::Disconnected),
            Some(StatusIndicator::inactive("Disconnected")),
        );
    }

    /// An operation or lifecycle step failed.
    ///
    /// Every failure produces exactly one such emission with a
    /// human-readable message.
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        self.emit(
            StatusRecord::with_error(self.endpoint.clone(), ClientStatus::Error, message),
            None,
        );
    }

    fn emit(&self, record: StatusRecord, indicator: Option<StatusIndicator>) {
        tracing::debug!(
            endpoint = %self.endpoint,
            status = %record.status,
            error = record.error.as_deref().unwrap_or(""),
            "Status emission"
        );

        let envelope = match indicator {
            Some(indicator) => StatusEnvelope::with_indicator(record, indicator),
            None => StatusEnvelope::record_only(record),
        };

        self.bus.status.publish(envelope);
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
