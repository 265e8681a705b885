// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! Builders for assembling test nodes and harness pieces.

use std::sync::Arc;

use nodelink_config::schema::EndpointConfig;
use nodelink_core::bus::FlowBus;
use nodelink_core::message::{DataEnvelope, StatusEnvelope};
use nodelink_core::types::ActionKind;
use nodelink_opcua::ClientNode;
use tokio::sync::broadcast;

use super::fixtures;
use super::mocks::MockFactory;

/// Everything a client-node test needs in one place.
pub struct TestNode {
    /// The node under test.
    pub node: ClientNode,
    /// The factory that creates (and retains) mock transports.
    pub factory: Arc<MockFactory>,
    /// The shared output bus.
    pub bus: Arc<FlowBus>,
    /// Subscribed data channel.
    pub data_rx: broadcast::Receiver<DataEnvelope>,
    /// Subscribed status channel.
    pub status_rx: broadcast::Receiver<StatusEnvelope>,
}

/// Builder for [`TestNode`].
pub struct TestNodeBuilder {
    name: String,
    config: Option<EndpointConfig>,
    default_action: Option<ActionKind>,
}

impl TestNodeBuilder {
    /// Starts a builder with the anonymous fixture config.
    pub fn new() -> Self {
        Self {
            name: "test-node".to_string(),
            config: Some(fixtures::anonymous_config()),
            default_action: None,
        }
    }

    /// Overrides the node name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the default configuration (or removes it with `None`).
    pub fn config(mut self, config: Option<EndpointConfig>) -> Self {
        self.config = config;
        self
    }

    /// Sets a node-level default action.
    pub fn default_action(mut self, action: ActionKind) -> Self {
        self.default_action = Some(action);
        self
    }

    /// Builds the node plus its channels.
    pub fn build(self) -> TestNode {
        let factory = MockFactory::new();
        let bus = FlowBus::with_default_capacity();

        let mut node = ClientNode::new(self.name, factory.clone(), bus.clone());
        if let Some(config) = self.config {
            node = node.with_default_config(config);
        }
        if let Some(action) = self.default_action {
            node = node.with_default_action(action);
        }

        let data_rx = node.subscribe_data();
        let status_rx = node.subscribe_status();

        TestNode {
            node,
            factory,
            bus,
            data_rx,
            status_rx,
        }
    }
}

impl Default for TestNodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
