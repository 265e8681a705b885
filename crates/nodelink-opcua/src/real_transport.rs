// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Production transport backed by the `opcua` crate.
//!
//! This is the wire boundary: secure channel establishment, the binary
//! codec, and session retry all belong to the `opcua` stack. The transport
//! maps the bridge's [`UaTransport`] contract onto it:
//!
//! - `connect` discovers the server endpoints and selects the one matching
//!   the configured security profile
//! - `create_session` authenticates with the resolved identity
//! - `read_values`/`write_values` issue attribute service calls
//! - keepalive events are emitted on a timer while a session is active
//!
//! Enabled with the `real-transport` feature.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::{
    AttributeId, Client, ClientBuilder, DataValue, EndpointDescription, IdentityToken,
    ReadValueId, Session, TimestampsToReturn, WriteValue,
};
use opcua::sync::RwLock as OpcUaRwLock;

use nodelink_core::error::{ConnectionError, FlowError, FlowResult, ProtocolError, SessionError};
use nodelink_core::types::{EndpointId, SecurityMode, SecurityPolicy};

use crate::conversion::Variant;
use crate::transport::{
    ReadOutcome, SessionHandle, TransportEvent, TransportState, UaTransport, WriteOutcome,
};
use crate::types::{ConnectOptions, NodeId, NodeIdentifier, UserIdentity};

// =============================================================================
// RealUaTransport
// =============================================================================

/// OPC UA transport over the `opcua` crate.
pub struct RealUaTransport {
    options: ConnectOptions,
    state: RwLock<TransportState>,
    /// Client plus the endpoint selected during connect.
    client: RwLock<Option<(Client, EndpointDescription)>>,
    session: RwLock<Option<Arc<OpcUaRwLock<Session>>>>,
    events: broadcast::Sender<TransportEvent>,
    keepalive: RwLock<Option<JoinHandle<()>>>,
}

impl RealUaTransport {
    /// Creates a transport for the given options. No I/O happens here.
    pub fn new(options: ConnectOptions) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            options,
            state: RwLock::new(TransportState::Disconnected),
            client: RwLock::new(None),
            session: RwLock::new(None),
            events,
            keepalive: RwLock::new(None),
        }
    }

    fn build_client(&self) -> FlowResult<Client> {
        let retry_limit = match self.options.reconnect.max_retries {
            None => -1,
            Some(n) => n as i32,
        };

        ClientBuilder::new()
            .application_name(&self.options.application_name)
            .application_uri(format!("urn:{}", self.options.application_name))
            .session_retry_limit(retry_limit)
            .session_retry_interval(self.options.reconnect.initial_delay.as_millis() as u32)
            .session_timeout(self.options.session_timeout.as_millis() as u32)
            .trust_server_certs(true)
            .client()
            .ok_or_else(|| {
                FlowError::connection(ConnectionError::connect_failed(
                    self.options.endpoint.as_str(),
                    "failed to build OPC UA client",
                ))
            })
    }

    fn security_policy(&self) -> opcua::client::prelude::SecurityPolicy {
        match self.options.security_policy {
            SecurityPolicy::None => opcua::client::prelude::SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15 => opcua::client::prelude::SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256 => opcua::client::prelude::SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256 => {
                opcua::client::prelude::SecurityPolicy::Basic256Sha256
            }
            SecurityPolicy::Aes128Sha256RsaOaep => {
                opcua::client::prelude::SecurityPolicy::Aes128Sha256RsaOaep
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                opcua::client::prelude::SecurityPolicy::Aes256Sha256RsaPss
            }
        }
    }

    fn security_mode(&self) -> opcua::types::MessageSecurityMode {
        match self.options.security_mode {
            SecurityMode::None => opcua::types::MessageSecurityMode::None,
            SecurityMode::Sign => opcua::types::MessageSecurityMode::Sign,
            SecurityMode::SignAndEncrypt => opcua::types::MessageSecurityMode::SignAndEncrypt,
        }
    }

    fn identity_token(identity: &UserIdentity) -> IdentityToken {
        match identity {
            UserIdentity::Anonymous => IdentityToken::Anonymous,
            UserIdentity::UserName { username, password } => {
                IdentityToken::UserName(username.clone(), password.clone())
            }
            UserIdentity::Certificate {
                certificate,
                private_key,
            } => {
                // The opcua crate loads certificate material from disk;
                // persist the in-config PEM blobs to the PKI directory.
                let dir = std::env::temp_dir().join("nodelink-pki");
                let _ = std::fs::create_dir_all(&dir);
                let cert_path = dir.join("client_cert.pem");
                let key_path = dir.join("client_key.pem");
                if let Err(e) = std::fs::write(&cert_path, certificate) {
                    warn!(error = %e, "Failed to persist client certificate");
                }
                if let Err(e) = std::fs::write(&key_path, private_key) {
                    warn!(error = %e, "Failed to persist client private key");
                }
                IdentityToken::X509(cert_path, key_path)
            }
        }
    }

    fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
        match &node_id.identifier {
            NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(node_id.namespace, *v),
            NodeIdentifier::String(v) => opcua::types::NodeId::new(node_id.namespace, v.clone()),
            NodeIdentifier::Guid(v) => {
                opcua::types::NodeId::new(node_id.namespace, opcua::types::Guid::from(*v))
            }
        }
    }

    fn from_opcua_variant(variant: &opcua::types::Variant) -> Option<Variant> {
        use opcua::types::Variant as V;

        Some(match variant {
            V::Boolean(v) => Variant::Boolean(*v),
            V::SByte(v) => Variant::SByte(*v),
            V::Byte(v) => Variant::Byte(*v),
            V::Int16(v) => Variant::Int16(*v),
            V::UInt16(v) => Variant::UInt16(*v),
            V::Int32(v) => Variant::Int32(*v),
            V::UInt32(v) => Variant::UInt32(*v),
            V::Int64(v) => Variant::Int64(*v),
            V::UInt64(v) => Variant::UInt64(*v),
            V::Float(v) => Variant::Float(*v),
            V::Double(v) => Variant::Double(*v),
            V::String(v) => Variant::String(v.as_ref().to_string()),
            V::DateTime(v) => Variant::DateTime(v.as_chrono()),
            V::ByteString(v) => Variant::ByteString(v.value.clone().unwrap_or_default()),
            _ => return None,
        })
    }

    fn to_opcua_variant(variant: &Variant) -> opcua::types::Variant {
        use opcua::types::Variant as V;

        match variant {
            Variant::Boolean(v) => V::Boolean(*v),
            Variant::SByte(v) => V::SByte(*v),
            Variant::Byte(v) => V::Byte(*v),
            Variant::Int16(v) => V::Int16(*v),
            Variant::UInt16(v) => V::UInt16(*v),
            Variant::Int32(v) => V::Int32(*v),
            Variant::UInt32(v) => V::UInt32(*v),
            Variant::Int64(v) => V::Int64(*v),
            Variant::UInt64(v) => V::UInt64(*v),
            Variant::Float(v) => V::Float(*v),
            Variant::Double(v) => V::Double(*v),
            Variant::String(v) => V::String(opcua::types::UAString::from(v.as_str())),
            Variant::DateTime(v) => V::DateTime(Box::new(opcua::types::DateTime::from(*v))),
            Variant::ByteString(v) => {
                V::ByteString(opcua::types::ByteString::from(v.as_slice()))
            }
        }
    }

    async fn current_session(&self) -> FlowResult<Arc<OpcUaRwLock<Session>>> {
        self.session
            .read()
            .await
            .clone()
            .ok_or_else(|| FlowError::connection(ConnectionError::NotConnected))
    }

    fn read_outcome(node_id: &NodeId, data_value: &DataValue) -> ReadOutcome {
        let status_code = data_value.status.map(|s| s.bits()).unwrap_or(0);

        match data_value.value.as_ref().and_then(Self::from_opcua_variant) {
            Some(value) if status_code & 0x8000_0000 == 0 => ReadOutcome {
                node_id: node_id.clone(),
                value: Some(value),
                status_code,
            },
            _ => ReadOutcome::failure(node_id.clone(), status_code | 0x8000_0000),
        }
    }

    /// Starts the keepalive timer, emitting one event per interval while a
    /// session is installed.
    async fn start_keepalive(&self) {
        let interval = self.options.keepalive_interval;
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            // First tick after one full interval, not immediately.
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let _ = events.send(TransportEvent::KeepAlive);
            }
        });

        if let Some(old) = self.keepalive.write().await.replace(handle) {
            old.abort();
        }
    }

    async fn stop_keepalive(&self) {
        if let Some(handle) = self.keepalive.write().await.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl UaTransport for RealUaTransport {
    async fn connect(&self) -> FlowResult<()> {
        if self.client.read().await.is_some() {
            return Ok(());
        }

        *self.state.write().await = TransportState::Connecting;
        info!(endpoint = %self.options.endpoint, "Connecting to OPC UA server");

        let client = self.build_client()?;

        let endpoints = match client.get_server_endpoints_from_url(self.options.endpoint.as_str())
        {
            Ok(endpoints) => endpoints,
            Err(e) => {
                *self.state.write().await = TransportState::Disconnected;
                return Err(FlowError::connection(ConnectionError::connect_failed(
                    self.options.endpoint.as_str(),
                    format!("endpoint discovery failed: {}", e),
                )));
            }
        };

        let policy_uri = self.security_policy().to_uri();
        let mode = self.security_mode();

        let endpoint = endpoints
            .iter()
            .find(|e| e.security_policy_uri.as_ref() == policy_uri && e.security_mode == mode)
            .cloned();

        let Some(endpoint) = endpoint else {
            *self.state.write().await = TransportState::Disconnected;
            return Err(FlowError::connection(ConnectionError::connect_failed(
                self.options.endpoint.as_str(),
                format!(
                    "no endpoint matches security profile {}/{}",
                    self.options.security_policy, self.options.security_mode
                ),
            )));
        };

        debug!(
            security_policy = %endpoint.security_policy_uri,
            "Selected server endpoint"
        );

        *self.client.write().await = Some((client, endpoint));
        *self.state.write().await = TransportState::Connected;

        info!(endpoint = %self.options.endpoint, "Connected to OPC UA server");
        Ok(())
    }

    async fn disconnect(&self) -> FlowResult<()> {
        self.stop_keepalive().await;

        if let Some(session) = self.session.write().await.take() {
            session.read().disconnect();
        }
        *self.client.write().await = None;
        *self.state.write().await = TransportState::Disconnected;

        info!(endpoint = %self.options.endpoint, "Disconnected from OPC UA server");
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.state
            .try_read()
            .map(|s| *s)
            .unwrap_or(TransportState::Disconnected)
    }

    async fn create_session(&self, identity: &UserIdentity) -> FlowResult<SessionHandle> {
        let endpoint = {
            let guard = self.client.read().await;
            let Some((_, endpoint)) = guard.as_ref() else {
                return Err(FlowError::connection(ConnectionError::NotConnected));
            };
            endpoint.clone()
        };

        let token = Self::identity_token(identity);

        let session = {
            let mut guard = self.client.write().await;
            let Some((client, _)) = guard.as_mut() else {
                return Err(FlowError::connection(ConnectionError::NotConnected));
            };
            client.connect_to_endpoint(endpoint, token).map_err(|e| {
                FlowError::session(SessionError::create_failed(
                    self.options.endpoint.as_str(),
                    format!("{}", e),
                ))
            })?
        };

        *self.session.write().await = Some(session);
        self.start_keepalive().await;

        let handle = SessionHandle::new(uuid::Uuid::new_v4().to_string(), identity);

        info!(
            endpoint = %self.options.endpoint,
            identity = identity.kind(),
            "OPC UA session established"
        );

        Ok(handle)
    }

    async fn close_session(&self) -> FlowResult<()> {
        self.stop_keepalive().await;

        if let Some(session) = self.session.write().await.take() {
            session.read().disconnect();
        }
        Ok(())
    }

    async fn read_values(&self, nodes: &[NodeId]) -> FlowResult<Vec<ReadOutcome>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.current_session().await?;

        let read_ids: Vec<ReadValueId> = nodes
            .iter()
            .map(|node| ReadValueId {
                node_id: Self::to_opcua_node_id(node),
                attribute_id: AttributeId::Value as u32,
                index_range: opcua::types::UAString::null(),
                data_encoding: opcua::types::QualifiedName::null(),
            })
            .collect();

        trace!(count = nodes.len(), "Reading node values");

        let results = {
            let session = session.read();
            session
                .read(&read_ids, TimestampsToReturn::Both, 0.0)
                .map_err(|e| {
                    FlowError::protocol(ProtocolError::batch_read_failed(format!("{}", e)))
                })?
        };

        if results.len() != nodes.len() {
            return Err(FlowError::protocol(ProtocolError::batch_read_failed(
                format!(
                    "server returned {} results for {} nodes",
                    results.len(),
                    nodes.len()
                ),
            )));
        }

        Ok(nodes
            .iter()
            .zip(results.iter())
            .map(|(node, data_value)| Self::read_outcome(node, data_value))
            .collect())
    }

    async fn write_values(&self, writes: &[(NodeId, Variant)]) -> FlowResult<Vec<WriteOutcome>> {
        if writes.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.current_session().await?;

        let write_values: Vec<WriteValue> = writes
            .iter()
            .map(|(node, value)| WriteValue {
                node_id: Self::to_opcua_node_id(node),
                attribute_id: AttributeId::Value as u32,
                index_range: opcua::types::UAString::null(),
                value: DataValue::value_only(Self::to_opcua_variant(value)),
            })
            .collect();

        trace!(count = writes.len(), "Writing node values");

        let results = {
            let session = session.read();
            session.write(&write_values).map_err(|e| {
                FlowError::protocol(ProtocolError::batch_write_failed(format!("{}", e)))
            })?
        };

        Ok(writes
            .iter()
            .zip(results.iter())
            .map(|((node, _), status)| WriteOutcome {
                node_id: node.clone(),
                status_code: status.bits(),
            })
            .collect())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn endpoint(&self) -> &EndpointId {
        &self.options.endpoint
    }
}

impl std::fmt::Debug for RealUaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealUaTransport")
            .field("endpoint", &self.options.endpoint)
            .field("state", &self.state())
            .finish()
    }
}
