// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for the NODELINK bridge.
//!
//! Errors are categorized by the lifecycle stage at which they occur:
//!
//! ```text
//! FlowError
//! ├── Config      - Missing/invalid configuration, unresolved templates
//! ├── Validation  - Malformed action requests (never reach the network)
//! ├── Connection  - Transport connect failures
//! ├── Session     - Authentication / session lifecycle failures
//! ├── Protocol    - Read/write failures reported by the server
//! └── Bus         - Output channel delivery failures
//! ```
//!
//! Config and validation errors are local and synchronous; they never enter
//! the retry/reconnection machinery. Connection, session, and protocol
//! errors are reported through the status channel.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Convenience result alias for flow operations.
pub type FlowResult<T> = Result<T, FlowError>;

// =============================================================================
// FlowError - Root Error Type
// =============================================================================

/// The root error type for bridge operations.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Action validation error.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Transport connection error.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle error.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Protocol-level operation error.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Output bus error.
    #[error("{0}")]
    Bus(#[from] BusError),
}

impl FlowError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a configuration error.
    #[inline]
    pub fn config(error: ConfigError) -> Self {
        Self::Config(error)
    }

    /// Creates a validation error.
    #[inline]
    pub fn validation(error: ValidationError) -> Self {
        Self::Validation(error)
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a session error.
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }

    /// Creates a connect-failed error.
    pub fn connect_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::connect_failed(endpoint, message))
    }

    /// Creates a not-connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a read-failed error.
    pub fn read_failed(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::read_failed(node, message))
    }

    /// Creates a write-failed error.
    pub fn write_failed(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::write_failed(node, message))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if this error is transient and may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Validation(_) => false,
            Self::Connection(e) => e.is_retryable(),
            Self::Session(e) => e.is_retryable(),
            Self::Protocol(e) => e.is_retryable(),
            Self::Bus(_) => false,
        }
    }

    /// Returns the error category name used in structured logging.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Protocol(_) => "protocol",
            Self::Bus(_) => "bus",
        }
    }

    /// Returns a human-readable message suitable for the status channel.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration errors: surfaced immediately, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration was supplied for the request.
    #[error("No OPC UA configuration specified")]
    MissingConfig,

    /// The endpoint was empty after template resolution.
    #[error("No endpoint specified in OPC UA configuration")]
    MissingEndpoint,

    /// The endpoint URL is structurally invalid.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending endpoint value.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An environment variable referenced by a template is not set.
    #[error("Unresolved environment variable '${{{name}}}' in endpoint template")]
    UnresolvedVariable {
        /// The variable name.
        name: String,
    },

    /// The credentials record is incomplete for its declared mode.
    #[error("Invalid credentials: {reason}")]
    InvalidCredentials {
        /// Why the credentials were rejected.
        reason: String,
    },

    /// Unknown action name in configuration.
    #[error("Unknown action '{action}'")]
    InvalidAction {
        /// The unrecognized action name.
        action: String,
    },

    /// Unknown security mode name.
    #[error("Unknown security mode '{mode}'")]
    InvalidSecurityMode {
        /// The unrecognized mode name.
        mode: String,
    },

    /// Unknown security policy name.
    #[error("Unknown security policy '{policy}'")]
    InvalidSecurityPolicy {
        /// The unrecognized policy name.
        policy: String,
    },

    /// A configuration file could not be read.
    #[error("Failed to read config file '{path}': {message}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying I/O message.
        message: String,
    },

    /// A configuration file could not be parsed.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// The file path.
        path: String,
        /// The parser message.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid-endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unresolved-variable error.
    pub fn unresolved_variable(name: impl Into<String>) -> Self {
        Self::UnresolvedVariable { name: name.into() }
    }

    /// Creates an invalid-credentials error.
    pub fn invalid_credentials(reason: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-action error.
    pub fn invalid_action(action: impl Into<String>) -> Self {
        Self::InvalidAction {
            action: action.into(),
        }
    }

    /// Creates an invalid-security-mode error.
    pub fn invalid_security_mode(mode: impl Into<String>) -> Self {
        Self::InvalidSecurityMode { mode: mode.into() }
    }

    /// Creates an invalid-security-policy error.
    pub fn invalid_security_policy(policy: impl Into<String>) -> Self {
        Self::InvalidSecurityPolicy {
            policy: policy.into(),
        }
    }

    /// Creates a file-io error.
    pub fn io(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

// =============================================================================
// ValidationError
// =============================================================================

/// Action validation errors: rejected before any network activity.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// No action was specified on the message or the node.
    #[error("No action specified")]
    MissingAction,

    /// No topic (node identifier) was specified.
    #[error("No topic specified for {action} action")]
    MissingTopic {
        /// The action that was requested.
        action: String,
    },

    /// No payload was specified for a write.
    #[error("No payload specified for {action} action")]
    MissingPayload {
        /// The action that was requested.
        action: String,
    },

    /// No data type was specified for a write.
    #[error("No data type specified for {action} action")]
    MissingDataType {
        /// The action that was requested.
        action: String,
    },

    /// A batch payload was empty or not an array.
    #[error("Invalid payload for {action} action: expected a non-empty array")]
    EmptyBatch {
        /// The action that was requested.
        action: String,
    },

    /// A batch entry was missing a required field.
    #[error("Invalid entry at index {index} for {action} action: {reason}")]
    MalformedEntry {
        /// The action that was requested.
        action: String,
        /// Zero-based index of the offending entry.
        index: usize,
        /// Why the entry was rejected.
        reason: String,
    },

    /// A node identifier failed to parse.
    #[error("Invalid node identifier '{node}': {reason}")]
    InvalidNodeId {
        /// The offending identifier.
        node: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A payload value is not representable as the declared data type.
    #[error("Payload not convertible to {data_type} for node '{node}': {reason}")]
    IncompatiblePayload {
        /// The target node.
        node: String,
        /// The declared data type.
        data_type: String,
        /// The conversion failure.
        reason: String,
    },
}

impl ValidationError {
    /// Creates a missing-topic error.
    pub fn missing_topic(action: impl Into<String>) -> Self {
        Self::MissingTopic {
            action: action.into(),
        }
    }

    /// Creates a missing-payload error.
    pub fn missing_payload(action: impl Into<String>) -> Self {
        Self::MissingPayload {
            action: action.into(),
        }
    }

    /// Creates a missing-data-type error.
    pub fn missing_data_type(action: impl Into<String>) -> Self {
        Self::MissingDataType {
            action: action.into(),
        }
    }

    /// Creates an empty-batch error.
    pub fn empty_batch(action: impl Into<String>) -> Self {
        Self::EmptyBatch {
            action: action.into(),
        }
    }

    /// Creates a malformed-entry error.
    pub fn malformed_entry(
        action: impl Into<String>,
        index: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedEntry {
            action: action.into(),
            index,
            reason: reason.into(),
        }
    }

    /// Creates an invalid-node-id error.
    pub fn invalid_node_id(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Creates an incompatible-payload error.
    pub fn incompatible_payload(
        node: impl Into<String>,
        data_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::IncompatiblePayload {
            node: node.into(),
            data_type: data_type.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Transport connection errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The initial connect to the endpoint failed.
    #[error("Failed to connect to '{endpoint}': {message}")]
    ConnectFailed {
        /// The target endpoint.
        endpoint: String,
        /// The transport failure message.
        message: String,
    },

    /// An operation was attempted while the transport is not connected.
    #[error("Client is not connected")]
    NotConnected,

    /// The connect attempt exceeded its deadline.
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),
}

impl ConnectionError {
    /// Creates a connect-failed error.
    pub fn connect_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the error is transient.
    pub fn is_retryable(&self) -> bool {
        // Connect failures and timeouts may succeed once the server is back;
        // the background reconnection machinery handles them independently.
        true
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle errors.
///
/// Session failures never poison the owning connection: a later action may
/// retry session creation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Authentication/session creation failed.
    #[error("Failed to create session on '{endpoint}': {message}")]
    CreateFailed {
        /// The target endpoint.
        endpoint: String,
        /// The failure message.
        message: String,
    },

    /// The session was closed by the server.
    #[error("Session closed for endpoint: {endpoint}")]
    Closed {
        /// The endpoint whose session closed.
        endpoint: String,
    },

    /// Closing the session failed (treated as non-fatal).
    #[error("Failed to close session: {message}")]
    CloseFailed {
        /// The failure message.
        message: String,
    },
}

impl SessionError {
    /// Creates a create-failed error.
    pub fn create_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CreateFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a session-closed error.
    pub fn closed(endpoint: impl Into<String>) -> Self {
        Self::Closed {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a close-failed error.
    pub fn close_failed(message: impl Into<String>) -> Self {
        Self::CloseFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if the error is transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CreateFailed { .. } | Self::Closed { .. })
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Read/write failures reported at the protocol level.
///
/// These are never fatal to the connection or session; they surface through
/// the status channel with the originating node identifier(s).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A single-node read failed.
    #[error("Error reading from node {node}: {message}")]
    ReadFailed {
        /// The node that failed.
        node: String,
        /// The failure message.
        message: String,
    },

    /// A single-node write failed.
    #[error("Error writing to node {node}: {message}")]
    WriteFailed {
        /// The node that failed.
        node: String,
        /// The failure message.
        message: String,
    },

    /// A batch read failed as a whole.
    #[error("Error reading multiple nodes: {message}")]
    BatchReadFailed {
        /// The failure message, naming the offending node(s).
        message: String,
    },

    /// A batch write failed as a whole.
    #[error("Error writing multiple nodes: {message}")]
    BatchWriteFailed {
        /// The failure message, naming the offending node(s).
        message: String,
    },

    /// The server returned a bad status code for a node.
    #[error("Bad status 0x{status_code:08X} for node {node}")]
    BadStatus {
        /// The node that failed.
        node: String,
        /// The OPC UA status code.
        status_code: u32,
    },

    /// A value could not be converted between wire and JSON representations.
    #[error("Conversion failed for node {node}: {message}")]
    Conversion {
        /// The node involved.
        node: String,
        /// The conversion failure.
        message: String,
    },
}

impl ProtocolError {
    /// Creates a read-failed error.
    pub fn read_failed(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Creates a write-failed error.
    pub fn write_failed(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Creates a batch-read-failed error.
    pub fn batch_read_failed(message: impl Into<String>) -> Self {
        Self::BatchReadFailed {
            message: message.into(),
        }
    }

    /// Creates a batch-write-failed error.
    pub fn batch_write_failed(message: impl Into<String>) -> Self {
        Self::BatchWriteFailed {
            message: message.into(),
        }
    }

    /// Creates a bad-status error.
    pub fn bad_status(node: impl Into<String>, status_code: u32) -> Self {
        Self::BadStatus {
            node: node.into(),
            status_code,
        }
    }

    /// Creates a conversion error.
    pub fn conversion(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the error is transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Conversion { .. })
    }
}

// =============================================================================
// BusError
// =============================================================================

/// Output channel delivery errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// Nobody is subscribed to the channel.
    #[error("No subscribers on the {channel} channel")]
    NoSubscribers {
        /// The channel name ("data" or "status").
        channel: &'static str,
    },
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = FlowError::config(ConfigError::MissingEndpoint);
        assert_eq!(err.category(), "config");
        assert!(!err.is_retryable());

        let err = FlowError::validation(ValidationError::missing_topic("read"));
        assert_eq!(err.category(), "validation");
        assert!(!err.is_retryable());

        let err = FlowError::connect_failed("opc.tcp://x:4840", "refused");
        assert_eq!(err.category(), "connection");
        assert!(err.is_retryable());

        let err = FlowError::read_failed("ns=2;s=T", "timeout");
        assert_eq!(err.category(), "protocol");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::missing_topic("read");
        assert_eq!(err.to_string(), "No topic specified for read action");

        let err = ValidationError::missing_data_type("write");
        assert_eq!(err.to_string(), "No data type specified for write action");

        let err = ValidationError::empty_batch("write-multiple");
        assert_eq!(
            err.to_string(),
            "Invalid payload for write-multiple action: expected a non-empty array"
        );
    }

    #[test]
    fn test_protocol_messages() {
        let err = ProtocolError::read_failed("ns=2;s=Temperature", "BadNodeIdUnknown");
        assert_eq!(
            err.to_string(),
            "Error reading from node ns=2;s=Temperature: BadNodeIdUnknown"
        );

        let err = ProtocolError::bad_status("ns=2;i=1001", 0x8034_0000);
        assert!(err.to_string().contains("0x80340000"));
        assert!(err.is_retryable());
        assert!(!ProtocolError::conversion("n", "m").is_retryable());
    }

    #[test]
    fn test_session_closed_message() {
        let err = SessionError::closed("opc.tcp://host:4840");
        assert_eq!(
            err.to_string(),
            "Session closed for endpoint: opc.tcp://host:4840"
        );
    }
}
