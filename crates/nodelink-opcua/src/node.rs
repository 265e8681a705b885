// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The flow-facing client node: the top-level orchestrator.
//!
//! A [`ClientNode`] owns the connection pool and the two output channels.
//! For each inbound message it runs the full control flow: resolve the
//! configuration (node default or per-message override) → validate the
//! action → look up or create the pooled connection → connect → ensure a
//! session → dispatch → emit.
//!
//! Validation deliberately precedes the pool lookup: a request that fails
//! validation must not trigger any network activity, including a lazy
//! connect.
//!
//! All outcomes flow through the channels. A success emits exactly one
//! data-channel envelope; every failure emits exactly one status-channel
//! record with a human-readable message. `handle` itself never propagates
//! errors to the caller.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as Json;

use nodelink_config::schema::EndpointConfig;
use nodelink_core::bus::FlowBus;
use nodelink_core::error::{FlowError, FlowResult, ValidationError};
use nodelink_core::message::{DataEnvelope, StatusEnvelope};
use nodelink_core::types::{ActionKind, DataTypeTag};

use crate::dispatch::{ActionDispatcher, PendingAction};
use crate::pool::{ConnectionPool, TransportFactory};
use crate::report::Reporter;
use crate::types::ResolvedTarget;

// =============================================================================
// InboundMessage
// =============================================================================

/// A request delivered by the host flow runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    /// Inline configuration override; falls back to the node default.
    #[serde(default)]
    pub config: Option<EndpointConfig>,

    /// Requested action; falls back to the node default.
    #[serde(default)]
    pub action: Option<ActionKind>,

    /// Node identifier for single-node actions.
    #[serde(default)]
    pub topic: Option<String>,

    /// Value for writes; array of entries for batch actions.
    #[serde(default)]
    pub payload: Option<Json>,

    /// Declared data type for single-node writes.
    #[serde(default, rename = "dataType")]
    pub data_type: Option<DataTypeTag>,
}

impl InboundMessage {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the action.
    pub fn with_action(mut self, action: ActionKind) -> Self {
        self.action = Some(action);
        self
    }

    /// Sets the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: Json) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the data type.
    pub fn with_data_type(mut self, data_type: DataTypeTag) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Sets an inline configuration override.
    pub fn with_config(mut self, config: EndpointConfig) -> Self {
        self.config = Some(config);
        self
    }
}

// =============================================================================
// ClientNode
// =============================================================================

/// The OPC UA client node: pool, channels, and per-message control flow.
pub struct ClientNode {
    name: String,
    default_config: Option<EndpointConfig>,
    default_action: Option<ActionKind>,
    pool: ConnectionPool,
    bus: Arc<FlowBus>,
    dispatcher: ActionDispatcher,
}

impl ClientNode {
    /// Creates a node with the given transport factory and output bus.
    pub fn new(name: impl Into<String>, factory: Arc<dyn TransportFactory>, bus: Arc<FlowBus>) -> Self {
        Self {
            name: name.into(),
            default_config: None,
            default_action: None,
            pool: ConnectionPool::new(factory, bus.clone()),
            bus,
            dispatcher: ActionDispatcher::new(),
        }
    }

    /// Sets the node-level default configuration.
    pub fn with_default_config(mut self, config: EndpointConfig) -> Self {
        self.default_config = Some(config);
        self
    }

    /// Sets the node-level default action.
    pub fn with_default_action(mut self, action: ActionKind) -> Self {
        self.default_action = Some(action);
        self
    }

    /// Returns the node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Returns the output bus.
    pub fn bus(&self) -> &Arc<FlowBus> {
        &self.bus
    }

    /// Subscribes to the data channel.
    pub fn subscribe_data(&self) -> tokio::sync::broadcast::Receiver<DataEnvelope> {
        self.bus.data.subscribe()
    }

    /// Subscribes to the status channel.
    pub fn subscribe_status(&self) -> tokio::sync::broadcast::Receiver<StatusEnvelope> {
        self.bus.status.subscribe()
    }

    /// Handles one inbound message.
    ///
    /// Never returns an error: successes emit on the data channel, failures
    /// emit exactly once on the status channel.
    pub async fn handle(&self, msg: InboundMessage) {
        // Configuration must resolve before anything else; without it there
        // is no endpoint to report against, so failures here use a reporter
        // with an empty endpoint.
        let config = match msg.config.as_ref().or(self.default_config.as_ref()) {
            Some(config) => config,
            None => {
                self.report_unresolved(FlowError::config(
                    nodelink_core::error::ConfigError::MissingConfig,
                ));
                return;
            }
        };

        let target = match ResolvedTarget::resolve(config) {
            Ok(target) => target,
            Err(e) => {
                self.report_unresolved(e);
                return;
            }
        };

        let reporter = Reporter::new(self.bus.clone(), target.options.endpoint.clone());

        if let Err(e) = self.run_action(&msg, &target).await {
            tracing::warn!(
                node = %self.name,
                endpoint = %target.options.endpoint,
                category = e.category(),
                error = %e,
                "Action failed"
            );
            reporter.error(e.user_message());
        }
    }

    /// The happy-path pipeline; any error is reported once by `handle`.
    async fn run_action(&self, msg: &InboundMessage, target: &ResolvedTarget) -> FlowResult<()> {
        let action = msg
            .action
            .or(self.default_action)
            .ok_or(ValidationError::MissingAction)?;

        // Validate before the pool lookup: a rejected request must not
        // trigger a lazy connect.
        let pending: PendingAction = self.dispatcher.prepare(
            action,
            msg.topic.as_deref(),
            msg.payload.as_ref(),
            msg.data_type,
        )?;

        let connection = self.pool.get_or_create(&target.options);
        connection.connect().await?;
        connection.ensure_session(&target.identity).await?;

        let body = self
            .dispatcher
            .execute(connection.transport(), &pending)
            .await?;

        self.bus.data.publish(DataEnvelope {
            endpoint: target.options.endpoint.clone(),
            body,
        });

        Ok(())
    }

    /// Reports a failure that occurred before an endpoint was known.
    fn report_unresolved(&self, error: FlowError) {
        tracing::warn!(node = %self.name, error = %error, "Request rejected");
        let reporter = Reporter::new(
            self.bus.clone(),
            nodelink_core::types::EndpointId::new(""),
        );
        reporter.error(error.user_message());
    }

    /// Shuts the node down: one status emission per endpoint, then full pool
    /// teardown. Completes only after every session close and disconnect has
    /// been attempted and all event pumps are stopped.
    pub async fn close(&self) {
        self.pool.for_each(|connection| {
            Reporter::new(self.bus.clone(), connection.endpoint().clone()).shutdown();
        });

        self.pool.teardown_all().await;

        tracing::info!(node = %self.name, "Client node closed");
    }
}

impl fmt::Debug for ClientNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientNode")
            .field("name", &self.name)
            .field("pool", &self.pool)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
