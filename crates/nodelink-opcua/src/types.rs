// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol-side types: node identifiers, resolved user identities, and
//! connection options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nodelink_config::schema::{CredentialsConfig, EndpointConfig};
use nodelink_core::error::{ConfigError, FlowError, ValidationError};
use nodelink_core::retry::ReconnectPolicy;
use nodelink_core::types::{EndpointId, SecurityMode, SecurityPolicy};

// =============================================================================
// NodeId
// =============================================================================

/// An OPC UA node identifier: namespace index plus identifier.
///
/// Parses the standard string forms:
///
/// - `ns=2;i=1001` (numeric)
/// - `ns=2;s=Device.Temperature` (string)
/// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
/// - `i=2258` / `s=Temperature` (namespace 0)
///
/// A bare identifier without a `ns=`/`i=`/`s=`/`g=` prefix is treated as a
/// string identifier in namespace 0, matching how flow messages commonly
/// address custom nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

/// The identifier portion of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(String),
    /// GUID identifier.
    Guid(Uuid),
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Parses a node ID from flow-message text, rejecting empty input.
    pub fn parse_topic(topic: &str) -> Result<Self, FlowError> {
        let trimmed = topic.trim();
        if trimmed.is_empty() {
            return Err(
                ValidationError::invalid_node_id(topic, "node identifier is empty").into(),
            );
        }
        trimmed.parse()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            NodeIdentifier::Numeric(v) => write!(f, "i={}", v),
            NodeIdentifier::String(v) => write!(f, "s={}", v),
            NodeIdentifier::Guid(v) => write!(f, "g={}", v),
        }
    }
}

impl FromStr for NodeId {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (namespace, identifier_part) = if let Some(rest) = s.strip_prefix("ns=") {
            let (ns_str, id_part) = rest.split_once(';').ok_or_else(|| {
                ValidationError::invalid_node_id(s, "missing identifier after namespace")
            })?;
            let ns: u16 = ns_str.parse().map_err(|_| {
                ValidationError::invalid_node_id(s, "invalid namespace index")
            })?;
            (ns, id_part)
        } else {
            (0, s)
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            let value: u32 = id.parse().map_err(|_| {
                ValidationError::invalid_node_id(s, "invalid numeric identifier")
            })?;
            NodeIdentifier::Numeric(value)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            if id.is_empty() {
                return Err(
                    ValidationError::invalid_node_id(s, "empty string identifier").into(),
                );
            }
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id).map_err(|e| {
                ValidationError::invalid_node_id(s, format!("invalid GUID: {}", e))
            })?;
            NodeIdentifier::Guid(uuid)
        } else if identifier_part.is_empty() {
            return Err(ValidationError::invalid_node_id(s, "empty identifier").into());
        } else {
            // Bare text addresses a string node in namespace 0.
            NodeIdentifier::String(identifier_part.to_string())
        };

        Ok(Self {
            namespace,
            identifier,
        })
    }
}

// =============================================================================
// UserIdentity
// =============================================================================

/// Resolved authentication identity for session creation.
///
/// This is the output of the credential resolver: exactly one mode, matched
/// exhaustively at the single point authentication is performed. The
/// identity variant is fixed for the lifetime of the session created with
/// it; switching modes destroys and recreates the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdentity {
    /// Anonymous authentication.
    Anonymous,

    /// Username/password authentication.
    UserName {
        /// The user name.
        username: String,
        /// The password.
        password: String,
    },

    /// X.509 certificate authentication.
    Certificate {
        /// Client certificate bytes (PEM).
        certificate: Vec<u8>,
        /// Private key (PEM text).
        private_key: String,
    },
}

impl UserIdentity {
    /// Resolves a declarative credentials record into an identity.
    pub fn from_config(credentials: &CredentialsConfig) -> Result<Self, FlowError> {
        credentials.validate()?;

        Ok(match credentials {
            CredentialsConfig::Anonymous => Self::Anonymous,
            CredentialsConfig::Username { username, password } => Self::UserName {
                username: username.clone(),
                password: password.clone(),
            },
            CredentialsConfig::Certificate {
                certificate,
                private_key,
            } => Self::Certificate {
                certificate: certificate.clone().into_bytes(),
                private_key: private_key.clone(),
            },
        })
    }

    /// Returns the identity kind name.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::UserName { .. } => "username",
            Self::Certificate { .. } => "certificate",
        }
    }

    /// Returns `true` for the anonymous identity.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::UserName { username, .. } => write!(f, "UserName({})", username),
            Self::Certificate { .. } => write!(f, "Certificate"),
        }
    }
}

// =============================================================================
// ConnectOptions
// =============================================================================

/// Options for establishing and maintaining one endpoint connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// The resolved endpoint.
    pub endpoint: EndpointId,

    /// Security policy.
    #[serde(default)]
    pub security_policy: SecurityPolicy,

    /// Security mode.
    #[serde(default)]
    pub security_mode: SecurityMode,

    /// Application name presented to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Transport reconnection policy.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Session keepalive interval.
    #[serde(default = "default_keepalive_interval", with = "duration_millis")]
    pub keepalive_interval: Duration,

    /// Requested session timeout.
    #[serde(default = "default_session_timeout", with = "duration_millis")]
    pub session_timeout: Duration,
}

fn default_application_name() -> String {
    "nodelink".to_string()
}

fn default_keepalive_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

impl ConnectOptions {
    /// Creates a builder.
    pub fn builder() -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::default()
    }

    /// Validates the options.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.endpoint.as_str().is_empty() {
            return Err(ConfigError::MissingEndpoint.into());
        }
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::invalid_endpoint(
                self.endpoint.as_str(),
                "keepalive interval must be non-zero",
            )
            .into());
        }
        if self.security_mode != SecurityMode::None
            && !self.security_policy.requires_certificates()
        {
            return Err(ConfigError::invalid_endpoint(
                self.endpoint.as_str(),
                "security mode requires a non-None security policy",
            )
            .into());
        }
        Ok(())
    }
}

/// Builder for [`ConnectOptions`].
#[derive(Debug, Default)]
pub struct ConnectOptionsBuilder {
    endpoint: Option<EndpointId>,
    security_policy: SecurityPolicy,
    security_mode: SecurityMode,
    application_name: Option<String>,
    reconnect: Option<ReconnectPolicy>,
    keepalive_interval: Option<Duration>,
    session_timeout: Option<Duration>,
}

impl ConnectOptionsBuilder {
    /// Sets the endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<EndpointId>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the security policy.
    pub fn security_policy(mut self, policy: SecurityPolicy) -> Self {
        self.security_policy = policy;
        self
    }

    /// Sets the security mode.
    pub fn security_mode(mut self, mode: SecurityMode) -> Self {
        self.security_mode = mode;
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the reconnection policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Sets the keepalive interval.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Builds and validates the options.
    pub fn build(self) -> Result<ConnectOptions, FlowError> {
        let options = ConnectOptions {
            endpoint: self.endpoint.ok_or(ConfigError::MissingEndpoint)?,
            security_policy: self.security_policy,
            security_mode: self.security_mode,
            application_name: self
                .application_name
                .unwrap_or_else(default_application_name),
            reconnect: self.reconnect.unwrap_or_default(),
            keepalive_interval: self
                .keepalive_interval
                .unwrap_or_else(default_keepalive_interval),
            session_timeout: self.session_timeout.unwrap_or_else(default_session_timeout),
        };
        options.validate()?;
        Ok(options)
    }
}

// =============================================================================
// ResolvedTarget
// =============================================================================

/// The result of resolving a declarative [`EndpointConfig`]: connection
/// options plus the authentication identity.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// Transport connection options.
    pub options: ConnectOptions,
    /// Authentication identity for session creation.
    pub identity: UserIdentity,
}

impl ResolvedTarget {
    /// Resolves a configuration record: endpoint template against the
    /// process environment, credentials into an identity.
    pub fn resolve(config: &EndpointConfig) -> Result<Self, FlowError> {
        config.validate()?;

        let endpoint = nodelink_config::resolve::resolve_endpoint(&config.endpoint)?;
        let identity = UserIdentity::from_config(&config.credentials)?;

        let options = ConnectOptions::builder()
            .endpoint(endpoint)
            .security_policy(config.security_policy)
            .security_mode(config.security_mode)
            .build()?;

        Ok(Self { options, identity })
    }
}

/// Serialization helper for `Duration` as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_parse_forms() {
        let node: NodeId = "ns=2;i=1001".parse().unwrap();
        assert_eq!(node, NodeId::numeric(2, 1001));

        let node: NodeId = "ns=2;s=Device.Temperature".parse().unwrap();
        assert_eq!(node, NodeId::string(2, "Device.Temperature"));

        let node: NodeId = "i=2258".parse().unwrap();
        assert_eq!(node, NodeId::numeric(0, 2258));

        let node: NodeId = "s=Temperature".parse().unwrap();
        assert_eq!(node, NodeId::string(0, "Temperature"));

        let node: NodeId = "ns=3;g=550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert!(matches!(node.identifier, NodeIdentifier::Guid(_)));
    }

    #[test]
    fn test_node_id_bare_string_fallback() {
        let node: NodeId = "Temperature".parse().unwrap();
        assert_eq!(node, NodeId::string(0, "Temperature"));
    }

    #[test]
    fn test_node_id_rejects_malformed() {
        assert!("".parse::<NodeId>().is_err());
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("ns=abc;s=X".parse::<NodeId>().is_err());
        assert!("ns=2;i=notanumber".parse::<NodeId>().is_err());
        assert!("ns=2;s=".parse::<NodeId>().is_err());
        assert!(NodeId::parse_topic("   ").is_err());
    }

    #[test]
    fn test_node_id_display_round_trip() {
        for text in ["ns=2;i=1001", "ns=2;s=Device.Temperature", "i=2258", "s=Plain"] {
            let node: NodeId = text.parse().unwrap();
            let reparsed: NodeId = node.to_string().parse().unwrap();
            assert_eq!(node, reparsed);
        }
    }

    #[test]
    fn test_identity_resolution_is_exhaustive() {
        let identity = UserIdentity::from_config(&CredentialsConfig::Anonymous).unwrap();
        assert!(identity.is_anonymous());
        assert_eq!(identity.kind(), "anonymous");

        let identity = UserIdentity::from_config(&CredentialsConfig::Username {
            username: "op".to_string(),
            password: "secret".to_string(),
        })
        .unwrap();
        assert_eq!(identity.kind(), "username");

        let identity = UserIdentity::from_config(&CredentialsConfig::Certificate {
            certificate: "CERT".to_string(),
            private_key: "KEY".to_string(),
        })
        .unwrap();
        assert_eq!(identity.kind(), "certificate");
    }

    #[test]
    fn test_identity_resolution_rejects_incomplete() {
        let err = UserIdentity::from_config(&CredentialsConfig::Username {
            username: String::new(),
            password: "p".to_string(),
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_connect_options_builder() {
        let options = ConnectOptions::builder()
            .endpoint("opc.tcp://localhost:4840")
            .build()
            .unwrap();

        assert_eq!(options.endpoint.as_str(), "opc.tcp://localhost:4840");
        assert_eq!(options.keepalive_interval, Duration::from_secs(3));
        assert_eq!(options.reconnect.max_retries, None);
    }

    #[test]
    fn test_connect_options_validation() {
        assert!(ConnectOptions::builder().build().is_err());

        let err = ConnectOptions::builder()
            .endpoint("opc.tcp://localhost:4840")
            .security_mode(SecurityMode::SignAndEncrypt)
            .security_policy(SecurityPolicy::None)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn test_resolve_target() {
        let config = EndpointConfig::anonymous("opc.tcp://localhost:4840");
        let target = ResolvedTarget::resolve(&config).unwrap();
        assert_eq!(target.options.endpoint.as_str(), "opc.tcp://localhost:4840");
        assert!(target.identity.is_anonymous());
    }
}
