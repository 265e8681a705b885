// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle management.
//!
//! A connection owns at most one authenticated session. The [`SessionCell`]
//! enforces that: session creation is a guarded single-flight operation (the
//! first caller authenticates and publishes the handle; concurrent callers
//! wait on the same creation lock and reuse the result), teardown is
//! best-effort, and loss of the transport invalidates the slot without a
//! close round-trip.
//!
//! A session is never exposed as permanently failed: after closure or loss
//! the slot is Absent and the next `ensure` call transparently recreates it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};

use nodelink_core::error::{FlowError, FlowResult, SessionError};

use crate::transport::{SessionHandle, UaTransport};
use crate::types::UserIdentity;

// =============================================================================
// SessionState
// =============================================================================

/// Observable state of a connection's session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No session exists; the next action will create one.
    #[default]
    Absent,

    /// An authenticated session is installed.
    Active,
}

impl SessionState {
    /// Returns `true` if a session is installed.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "Absent"),
            Self::Active => write!(f, "Active"),
        }
    }
}

// =============================================================================
// SessionStats
// =============================================================================

/// Counters for session lifecycle operations.
#[derive(Debug, Default)]
pub struct SessionStats {
    creations: AtomicU64,
    closures: AtomicU64,
    invalidations: AtomicU64,
    failures: AtomicU64,
}

impl SessionStats {
    /// Records a session creation.
    pub fn record_creation(&self) {
        self.creations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a deliberate session closure.
    pub fn record_closure(&self) {
        self.closures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an invalidation due to loss or server-side closure.
    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed creation attempt.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of sessions created.
    pub fn creations(&self) -> u64 {
        self.creations.load(Ordering::Relaxed)
    }

    /// Returns the number of deliberate closures.
    pub fn closures(&self) -> u64 {
        self.closures.load(Ordering::Relaxed)
    }

    /// Returns the number of invalidations.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Returns the number of failed creations.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

// =============================================================================
// SessionCell
// =============================================================================

/// Holds a connection's zero-or-one session and serializes its lifecycle.
pub struct SessionCell {
    /// The installed session, if any.
    slot: RwLock<Option<SessionHandle>>,

    /// Serializes session creation: at most one authentication handshake is
    /// in flight per connection at any time.
    create_lock: Mutex<()>,

    /// Lifecycle counters.
    stats: SessionStats,
}

impl SessionCell {
    /// Creates an empty cell.
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            create_lock: Mutex::new(()),
            stats: SessionStats::default(),
        }
    }

    /// Returns the observable session state.
    pub async fn state(&self) -> SessionState {
        if self.slot.read().await.is_some() {
            SessionState::Active
        } else {
            SessionState::Absent
        }
    }

    /// Returns the current session handle, if any.
    pub async fn current(&self) -> Option<SessionHandle> {
        self.slot.read().await.clone()
    }

    /// Returns the lifecycle counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Returns the active session, creating one if absent.
    ///
    /// Creation is single-flight: concurrent callers serialize on the
    /// creation lock, and late arrivals observe the installed handle instead
    /// of starting a second handshake. An installed session authenticated
    /// with a *different* identity kind is destroyed and recreated: the
    /// identity variant is fixed for a session's lifetime.
    pub async fn ensure(
        &self,
        transport: &dyn UaTransport,
        identity: &UserIdentity,
    ) -> FlowResult<SessionHandle> {
        // Fast path outside the creation lock.
        if let Some(handle) = self.slot.read().await.as_ref() {
            if handle.identity_kind == identity.kind() {
                return Ok(handle.clone());
            }
        }

        let _guard = self.create_lock.lock().await;

        // Re-check under the lock: a concurrent caller may have finished.
        if let Some(handle) = self.slot.read().await.as_ref() {
            if handle.identity_kind == identity.kind() {
                return Ok(handle.clone());
            }
            tracing::info!(
                endpoint = %transport.endpoint(),
                old = handle.identity_kind,
                new = identity.kind(),
                "Credential mode changed, recreating session"
            );
        }

        // Identity switch: close the stale session first, best-effort.
        if self.slot.read().await.is_some() {
            self.destroy(transport).await;
        }

        let handle = transport.create_session(identity).await.map_err(|e| {
            self.stats.record_failure();
            FlowError::session(SessionError::create_failed(
                transport.endpoint().as_str(),
                e.user_message(),
            ))
        })?;

        *self.slot.write().await = Some(handle.clone());
        self.stats.record_creation();

        tracing::info!(
            endpoint = %transport.endpoint(),
            session_id = %handle.session_id,
            identity = handle.identity_kind,
            "Session created"
        );

        Ok(handle)
    }

    /// Closes the session on the server, best-effort.
    ///
    /// The local slot is always cleared, even when the close call fails;
    /// a stale reference must never survive.
    pub async fn destroy(&self, transport: &dyn UaTransport) {
        let had_session = self.slot.write().await.take().is_some();
        if !had_session {
            return;
        }

        self.stats.record_closure();

        if let Err(e) = transport.close_session().await {
            tracing::warn!(
                endpoint = %transport.endpoint(),
                error = %e,
                "Session close failed (ignored)"
            );
        } else {
            tracing::debug!(endpoint = %transport.endpoint(), "Session closed");
        }
    }

    /// Drops the session without a close round-trip.
    ///
    /// Used when the transport connection is lost: the authenticated channel
    /// cannot survive a reconnect, so there is nothing left to close.
    pub async fn invalidate(&self) {
        if self.slot.write().await.take().is_some() {
            self.stats.record_invalidation();
            tracing::debug!("Session invalidated");
        }
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCell")
            .field("creations", &self.stats.creations())
            .field("invalidations", &self.stats.invalidations())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
