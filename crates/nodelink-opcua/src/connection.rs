// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-endpoint connection: one transport handle, one session slot, and an
//! event pump republishing transport signals.
//!
//! The connection is a state machine observing its transport:
//!
//! ```text
//! Disconnected --connect()--> Connecting --success--> Connected
//!                                        --failure--> Disconnected
//! Connected    --loss signal------------> Reconnecting
//! Reconnecting --reestablished signal---> Connected
//! Connected/Reconnecting --disconnect()-> Disconnected (terminal)
//! ```
//!
//! Reconnection itself is driven by the transport per its
//! [`ReconnectPolicy`](nodelink_core::retry::ReconnectPolicy); the
//! connection merely observes and republishes the signals. On loss the
//! owned session is invalidated immediately, because the authenticated channel
//! cannot survive a transport reconnect.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use nodelink_core::error::{ConnectionError, FlowError, FlowResult};
use nodelink_core::types::EndpointId;

use crate::report::Reporter;
use crate::session::{SessionCell, SessionState};
use crate::transport::{SessionHandle, TransportEvent, UaTransport};
use crate::types::{ConnectOptions, UserIdentity};

// =============================================================================
// ConnectionState
// =============================================================================

/// State of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,

    /// Initial connect in progress.
    Connecting,

    /// Connected and usable.
    Connected,

    /// Transport lost; background reconnection in progress.
    Reconnecting,
}

impl ConnectionState {
    /// Returns `true` if the connection is usable.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
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
// Connection
// =============================================================================

/// One pooled connection to one endpoint.
pub struct Connection {
    options: ConnectOptions,
    transport: Arc<dyn UaTransport>,
    state: RwLock<ConnectionState>,
    /// Serializes `connect`: one establishment attempt at a time; losers of
    /// the race observe the winner's outcome.
    connect_lock: Mutex<()>,
    session: SessionCell,
    reporter: Reporter,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Creates a connection and starts its event pump.
    ///
    /// Construction performs no I/O; the transport connects lazily on the
    /// first action.
    pub fn new(
        options: ConnectOptions,
        transport: Arc<dyn UaTransport>,
        reporter: Reporter,
    ) -> Arc<Self> {
        let connection = Arc::new(Self {
            options,
            transport,
            state: RwLock::new(ConnectionState::Disconnected),
            connect_lock: Mutex::new(()),
            session: SessionCell::new(),
            reporter,
            pump: Mutex::new(None),
        });

        connection.clone().spawn_event_pump();
        connection
    }

    /// Returns the endpoint identity.
    pub fn endpoint(&self) -> &EndpointId {
        &self.options.endpoint
    }

    /// Returns the connection options.
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &dyn UaTransport {
        self.transport.as_ref()
    }

    /// Returns the current state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Returns the session slot state.
    pub async fn session_state(&self) -> SessionState {
        self.session.state().await
    }

    /// Returns the session cell (used by tests and the pool).
    pub fn session(&self) -> &SessionCell {
        &self.session
    }

    /// Connects the transport if not already connected.
    ///
    /// Single-flight: concurrent callers serialize on the connect lock and
    /// the late arrivals see the established state without a second attempt.
    /// A failure leaves the state Disconnected and is returned to the
    /// caller; the pool entry survives and the transport may keep retrying
    /// in the background per its policy.
    pub async fn connect(&self) -> FlowResult<()> {
        let _guard = self.connect_lock.lock().await;

        match *self.state.read().await {
            ConnectionState::Connected | ConnectionState::Reconnecting => return Ok(()),
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }

        self.set_state(ConnectionState::Connecting).await;

        match self.transport.connect().await {
            Ok(()) => {
                self.set_state(ConnectionState::Connected).await;
                tracing::info!(endpoint = %self.endpoint(), "Connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected).await;
                tracing::warn!(endpoint = %self.endpoint(), error = %e, "Connect failed");
                Err(FlowError::connection(ConnectionError::connect_failed(
                    self.endpoint().as_str(),
                    e.user_message(),
                )))
            }
        }
    }

    /// Returns the active session, creating it if absent.
    pub async fn ensure_session(&self, identity: &UserIdentity) -> FlowResult<SessionHandle> {
        self.session.ensure(self.transport.as_ref(), identity).await
    }

    /// Disconnects the transport and closes the session, best-effort.
    ///
    /// Terminal for this connection instance: only the pool teardown calls
    /// it, and the instance is dropped afterwards.
    pub async fn shutdown(&self) {
        self.session.destroy(self.transport.as_ref()).await;

        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!(
                endpoint = %self.endpoint(),
                error = %e,
                "Disconnect failed (ignored)"
            );
        }

        self.set_state(ConnectionState::Disconnected).await;

        // Stop the event pump so no timer or task outlives teardown.
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }

        tracing::info!(endpoint = %self.endpoint(), "Connection shut down");
    }

    async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write().await;
        if *state != new_state {
            tracing::trace!(
                endpoint = %self.options.endpoint,
                old = %*state,
                new = %new_state,
                "Connection state changed"
            );
            *state = new_state;
        }
    }

    /// Starts the task that forwards transport events to the reporter.
    ///
    /// Lifecycle events arrive at any time, not only in response to user
    /// actions; the pump runs until teardown aborts it or the transport
    /// drops its event channel.
    fn spawn_event_pump(self: Arc<Self>) {
        let mut events = self.transport.subscribe_events();
        let connection = Arc::downgrade(&self);

        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Transport event stream lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };

                let Some(connection) = connection.upgrade() else {
                    break;
                };
                connection.handle_event(event).await;
            }
        });

        // Registering the pump handle never races: new() has exclusive
        // access to the freshly created Arc.
        if let Ok(mut pump) = self.pump.try_lock() {
            *pump = Some(handle);
        }
    }

    /// Applies one transport event: state transition, session bookkeeping,
    /// status emission.
    pub(crate) async fn handle_event(&self, event: TransportEvent) {
        tracing::debug!(endpoint = %self.endpoint(), event = event.name(), "Transport event");

        match event {
            TransportEvent::ConnectionLost => {
                // The authenticated channel dies with the transport.
                self.session.invalidate().await;
                self.set_state(ConnectionState::Reconnecting).await;
                self.reporter.connection_lost();
            }
            TransportEvent::StartReconnection => {
                self.set_state(ConnectionState::Reconnecting).await;
                self.reporter.start_reconnection();
            }
            TransportEvent::Backoff { attempt, delay } => {
                self.set_state(ConnectionState::Reconnecting).await;
                self.reporter.backoff(attempt, delay);
            }
            TransportEvent::ConnectionReestablished => {
                // The session stays Absent until the next action recreates it.
                self.set_state(ConnectionState::Connected).await;
                self.reporter.reestablished();
            }
            TransportEvent::SessionClosed => {
                self.session.destroy(self.transport.as_ref()).await;
                self.reporter.session_closed();
            }
            TransportEvent::KeepAlive => {
                self.reporter.keep_alive();
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.options.endpoint)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
