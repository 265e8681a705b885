// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core identifier and contract types shared across NODELINK crates.
//!
//! These types form the vocabulary of the flow-facing interface: endpoint
//! identity, action kinds, the negotiated security profile, and the data
//! type tags carried alongside every value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FlowError};

// =============================================================================
// EndpointId
// =============================================================================

/// Identity of a target OPC UA server: the fully resolved endpoint URL.
///
/// This is the partition key of the connection pool. It is created only
/// after template/environment substitution has been applied to the
/// configured endpoint and is immutable afterwards.
///
/// # Examples
///
/// ```
/// use nodelink_core::types::EndpointId;
///
/// let endpoint = EndpointId::new("opc.tcp://plant-a:4840");
/// assert_eq!(endpoint.as_str(), "opc.tcp://plant-a:4840");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    /// Creates a new endpoint identity from a resolved URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Returns the endpoint URL as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the URL uses the standard OPC UA TCP scheme.
    #[inline]
    pub fn is_opc_tcp(&self) -> bool {
        self.0.starts_with("opc.tcp://")
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EndpointId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// ActionKind
// =============================================================================

/// The four actions a flow step may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Read a single node value.
    #[serde(rename = "read")]
    Read,

    /// Write a single typed value to a node.
    #[serde(rename = "write")]
    Write,

    /// Read a batch of nodes in one request.
    #[serde(rename = "read-multiple")]
    ReadMultiple,

    /// Write a batch of typed values in one request.
    #[serde(rename = "write-multiple")]
    WriteMultiple,
}

impl ActionKind {
    /// Returns the wire name of the action.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadMultiple => "read-multiple",
            Self::WriteMultiple => "write-multiple",
        }
    }

    /// Returns `true` if the action carries a batch payload.
    #[inline]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::ReadMultiple | Self::WriteMultiple)
    }

    /// Returns `true` if the action mutates server state.
    #[inline]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Write | Self::WriteMultiple)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ActionKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "read-multiple" => Ok(Self::ReadMultiple),
            "write-multiple" => Ok(Self::WriteMultiple),
            other => Err(FlowError::config(ConfigError::invalid_action(other))),
        }
    }
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode negotiated for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SecurityMode {
    /// Messages are neither signed nor encrypted.
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }

    /// Returns `true` if this mode provides message signing.
    #[inline]
    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Sign | Self::SignAndEncrypt)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityMode {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "sign" | "signed" => Ok(Self::Sign),
            "signandencrypt" | "encrypted" => Ok(Self::SignAndEncrypt),
            _ => Err(FlowError::config(ConfigError::invalid_security_mode(s))),
        }
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// OPC UA security policy: the cryptographic profile of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SecurityPolicy {
    /// No security (pairs with [`SecurityMode::None`]).
    #[default]
    None,

    /// Basic128Rsa15 (legacy systems only).
    Basic128Rsa15,

    /// Basic256 (legacy systems only).
    Basic256,

    /// Basic256Sha256 (recommended minimum).
    Basic256Sha256,

    /// Aes128-Sha256-RsaOaep.
    Aes128Sha256RsaOaep,

    /// Aes256-Sha256-RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }

    /// Returns `true` if this policy requires client certificates.
    #[inline]
    pub const fn requires_certificates(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both the short name and the full policy URI.
        if let Some(fragment) = s.rsplit('#').next() {
            match fragment.to_lowercase().replace(['-', '_'], "").as_str() {
                "none" => return Ok(Self::None),
                "basic128rsa15" => return Ok(Self::Basic128Rsa15),
                "basic256" => return Ok(Self::Basic256),
                "basic256sha256" => return Ok(Self::Basic256Sha256),
                "aes128sha256rsaoaep" => return Ok(Self::Aes128Sha256RsaOaep),
                "aes256sha256rsapss" => return Ok(Self::Aes256Sha256RsaPss),
                _ => {}
            }
        }
        Err(FlowError::config(ConfigError::invalid_security_policy(s)))
    }
}

// =============================================================================
// DataTypeTag
// =============================================================================

/// OPC UA scalar data type tag carried with every read/write value.
///
/// Serialized with the PascalCase names used on the wire and in flow
/// messages (`"Double"`, `"UInt32"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeTag {
    /// Boolean value.
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit IEEE 754 float.
    Float,
    /// 64-bit IEEE 754 double.
    Double,
    /// UTF-8 string.
    String,
    /// Date and time.
    DateTime,
    /// Raw byte string.
    ByteString,
}

impl DataTypeTag {
    /// Returns the wire name of the tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::ByteString => "ByteString",
        }
    }

    /// Returns `true` if the tag denotes a numeric type.
    #[inline]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::SByte
                | Self::Byte
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float
                | Self::Double
        )
    }
}

impl fmt::Display for DataTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_id() {
        let endpoint = EndpointId::new("opc.tcp://localhost:4840");
        assert!(endpoint.is_opc_tcp());
        assert_eq!(endpoint.to_string(), "opc.tcp://localhost:4840");

        let other = EndpointId::from("opc.tcp://localhost:4840");
        assert_eq!(endpoint, other);
    }

    #[test]
    fn test_action_kind_round_trip() {
        for kind in [
            ActionKind::Read,
            ActionKind::Write,
            ActionKind::ReadMultiple,
            ActionKind::WriteMultiple,
        ] {
            let parsed: ActionKind = kind.name().parse().unwrap();
            assert_eq!(parsed, kind);
        }

        assert!("browse".parse::<ActionKind>().is_err());
        assert!(ActionKind::WriteMultiple.is_batch());
        assert!(ActionKind::WriteMultiple.is_write());
        assert!(!ActionKind::Read.is_write());
    }

    #[test]
    fn test_action_kind_serde() {
        let json = serde_json::to_string(&ActionKind::ReadMultiple).unwrap();
        assert_eq!(json, "\"read-multiple\"");

        let parsed: ActionKind = serde_json::from_str("\"write\"").unwrap();
        assert_eq!(parsed, ActionKind::Write);
    }

    #[test]
    fn test_security_mode_parse() {
        assert_eq!("None".parse::<SecurityMode>().unwrap(), SecurityMode::None);
        assert_eq!("sign".parse::<SecurityMode>().unwrap(), SecurityMode::Sign);
        assert_eq!(
            "SignAndEncrypt".parse::<SecurityMode>().unwrap(),
            SecurityMode::SignAndEncrypt
        );
        assert!("garbage".parse::<SecurityMode>().is_err());
    }

    #[test]
    fn test_security_policy_parse() {
        assert_eq!(
            "Basic256Sha256".parse::<SecurityPolicy>().unwrap(),
            SecurityPolicy::Basic256Sha256
        );
        assert_eq!(
            "http://opcfoundation.org/UA/SecurityPolicy#None"
                .parse::<SecurityPolicy>()
                .unwrap(),
            SecurityPolicy::None
        );
        assert!(SecurityPolicy::Basic256Sha256.requires_certificates());
        assert!(!SecurityPolicy::None.requires_certificates());
    }

    #[test]
    fn test_data_type_tag_serde() {
        let json = serde_json::to_string(&DataTypeTag::Double).unwrap();
        assert_eq!(json, "\"Double\"");

        let parsed: DataTypeTag = serde_json::from_str("\"UInt32\"").unwrap();
        assert_eq!(parsed, DataTypeTag::UInt32);
        assert!(parsed.is_numeric());
        assert!(!DataTypeTag::String.is_numeric());
    }
}
