// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed protocol values and JSON conversion.
//!
//! Flow messages carry JSON payloads with a declared [`DataTypeTag`]; the
//! wire carries typed [`Variant`]s. The [`DataConverter`] bridges the two:
//! JSON → variant using the declared tag (for writes), variant → JSON plus
//! the actual tag (for read results).

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value as Json;

use nodelink_core::error::ValidationError;
use nodelink_core::types::DataTypeTag;

// =============================================================================
// Variant
// =============================================================================

/// A typed OPC UA scalar value as exchanged with the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// Boolean value.
    Boolean(bool),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Date and time.
    DateTime(DateTime<Utc>),
    /// Raw byte string.
    ByteString(Vec<u8>),
}

impl Variant {
    /// Returns the data type tag of this value.
    pub const fn data_type(&self) -> DataTypeTag {
        match self {
            Self::Boolean(_) => DataTypeTag::Boolean,
            Self::SByte(_) => DataTypeTag::SByte,
            Self::Byte(_) => DataTypeTag::Byte,
            Self::Int16(_) => DataTypeTag::Int16,
            Self::UInt16(_) => DataTypeTag::UInt16,
            Self::Int32(_) => DataTypeTag::Int32,
            Self::UInt32(_) => DataTypeTag::UInt32,
            Self::Int64(_) => DataTypeTag::Int64,
            Self::UInt64(_) => DataTypeTag::UInt64,
            Self::Float(_) => DataTypeTag::Float,
            Self::Double(_) => DataTypeTag::Double,
            Self::String(_) => DataTypeTag::String,
            Self::DateTime(_) => DataTypeTag::DateTime,
            Self::ByteString(_) => DataTypeTag::ByteString,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

// =============================================================================
// DataConverter
// =============================================================================

/// Converts between JSON payloads and typed variants.
#[derive(Debug, Clone, Default)]
pub struct DataConverter;

impl DataConverter {
    /// Creates a new converter.
    pub fn new() -> Self {
        Self
    }

    /// Converts a JSON payload into a variant of the declared type.
    ///
    /// Fails when the payload is not representable as the declared type
    /// (wrong JSON kind, out-of-range number, unparsable timestamp). The
    /// failure is a validation error: it is detected before any network
    /// activity.
    pub fn json_to_variant(
        &self,
        node: &str,
        payload: &Json,
        data_type: DataTypeTag,
    ) -> Result<Variant, ValidationError> {
        let incompatible = |reason: &str| {
            ValidationError::incompatible_payload(node, data_type.name(), reason)
        };

        let variant = match data_type {
            DataTypeTag::Boolean => Variant::Boolean(
                payload
                    .as_bool()
                    .ok_or_else(|| incompatible("expected a boolean"))?,
            ),
            DataTypeTag::SByte => Variant::SByte(Self::int_in_range(payload, node, data_type)?),
            DataTypeTag::Byte => Variant::Byte(Self::int_in_range(payload, node, data_type)?),
            DataTypeTag::Int16 => Variant::Int16(Self::int_in_range(payload, node, data_type)?),
            DataTypeTag::UInt16 => Variant::UInt16(Self::int_in_range(payload, node, data_type)?),
            DataTypeTag::Int32 => Variant::Int32(Self::int_in_range(payload, node, data_type)?),
            DataTypeTag::UInt32 => Variant::UInt32(Self::int_in_range(payload, node, data_type)?),
            DataTypeTag::Int64 => Variant::Int64(
                payload
                    .as_i64()
                    .ok_or_else(|| incompatible("expected an integer"))?,
            ),
            DataTypeTag::UInt64 => Variant::UInt64(
                payload
                    .as_u64()
                    .ok_or_else(|| incompatible("expected a non-negative integer"))?,
            ),
            DataTypeTag::Float => Variant::Float(
                payload
                    .as_f64()
                    .ok_or_else(|| incompatible("expected a number"))? as f32,
            ),
            DataTypeTag::Double => Variant::Double(
                payload
                    .as_f64()
                    .ok_or_else(|| incompatible("expected a number"))?,
            ),
            DataTypeTag::String => match payload {
                Json::String(s) => Variant::String(s.clone()),
                // Scalars are stringified; objects and arrays are not.
                Json::Number(n) => Variant::String(n.to_string()),
                Json::Bool(b) => Variant::String(b.to_string()),
                _ => return Err(incompatible("expected a string or scalar")),
            },
            DataTypeTag::DateTime => {
                let text = payload
                    .as_str()
                    .ok_or_else(|| incompatible("expected an RFC 3339 timestamp string"))?;
                let parsed = DateTime::parse_from_rfc3339(text)
                    .map_err(|e| incompatible(&format!("invalid timestamp: {}", e)))?;
                Variant::DateTime(parsed.with_timezone(&Utc))
            }
            DataTypeTag::ByteString => {
                let array = payload
                    .as_array()
                    .ok_or_else(|| incompatible("expected an array of byte values"))?;
                let mut bytes = Vec::with_capacity(array.len());
                for (i, item) in array.iter().enumerate() {
                    let byte = item
                        .as_u64()
                        .filter(|v| *v <= u8::MAX as u64)
                        .ok_or_else(|| incompatible(&format!("element {} is not a byte", i)))?;
                    bytes.push(byte as u8);
                }
                Variant::ByteString(bytes)
            }
        };

        Ok(variant)
    }

    /// Converts a variant into its JSON payload plus the actual data type.
    pub fn variant_to_json(&self, variant: &Variant) -> (Json, DataTypeTag) {
        let tag = variant.data_type();
        let json = match variant {
            Variant::Boolean(v) => Json::from(*v),
            Variant::SByte(v) => Json::from(*v),
            Variant::Byte(v) => Json::from(*v),
            Variant::Int16(v) => Json::from(*v),
            Variant::UInt16(v) => Json::from(*v),
            Variant::Int32(v) => Json::from(*v),
            Variant::UInt32(v) => Json::from(*v),
            Variant::Int64(v) => Json::from(*v),
            Variant::UInt64(v) => Json::from(*v),
            Variant::Float(v) => Json::from(*v),
            Variant::Double(v) => Json::from(*v),
            Variant::String(v) => Json::from(v.clone()),
            Variant::DateTime(v) => Json::from(v.to_rfc3339()),
            Variant::ByteString(v) => Json::from(v.clone()),
        };
        (json, tag)
    }

    fn int_in_range<T>(
        payload: &Json,
        node: &str,
        data_type: DataTypeTag,
    ) -> Result<T, ValidationError>
    where
        T: TryFrom<i64>,
    {
        let value = payload.as_i64().ok_or_else(|| {
            ValidationError::incompatible_payload(node, data_type.name(), "expected an integer")
        })?;
        T::try_from(value).map_err(|_| {
            ValidationError::incompatible_payload(
                node,
                data_type.name(),
                format!("{} out of range", value),
            )
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
