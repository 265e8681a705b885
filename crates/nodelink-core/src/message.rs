// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Output record types for the two flow-facing channels.
//!
//! The bridge speaks to its host runtime through two structurally separate
//! channels: the *data* channel carries successful read/write results, the
//! *status* channel carries lifecycle and error records. A caller can tell
//! "here is data" from "here is a lifecycle event" by which channel the
//! record arrived on, never by inspecting payload shape.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::types::{DataTypeTag, EndpointId};

// =============================================================================
// ClientStatus
// =============================================================================

/// Connection/session status visible to the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientStatus {
    /// Transport connected and usable.
    #[serde(rename = "connected")]
    Connected,

    /// Transport lost or torn down.
    #[serde(rename = "disconnected")]
    Disconnected,

    /// Initial connect in progress.
    #[serde(rename = "connecting")]
    Connecting,

    /// Background reconnection in progress.
    #[serde(rename = "reconnecting")]
    Reconnecting,

    /// Periodic session liveness signal.
    #[serde(rename = "keep-alive")]
    KeepAlive,

    /// An operation or lifecycle step failed.
    #[serde(rename = "error")]
    Error,
}

impl ClientStatus {
    /// Returns the wire name of the status.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Reconnecting => "reconnecting",
            Self::KeepAlive => "keep-alive",
            Self::Error => "error",
        }
    }

    /// Returns `true` if the status indicates a usable connection.
    #[inline]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::KeepAlive)
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// StatusIndicator
// =============================================================================

/// Fill color of the visual status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorFill {
    /// Healthy / connected.
    Green,
    /// Transitional (reconnecting).
    Yellow,
    /// Failed / lost.
    Red,
    /// Inactive / shut down.
    Grey,
}

/// Shape of the visual status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorShape {
    /// Solid dot: settled state.
    Dot,
    /// Ring: transitional or degraded state.
    Ring,
}

/// A visual indicator for live inspection: category color, shape, and a
/// short human-readable label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusIndicator {
    /// Indicator color.
    pub fill: IndicatorFill,
    /// Indicator shape.
    pub shape: IndicatorShape,
    /// Short label, e.g. `"Reconnecting in 5s (attempt 3)"`.
    pub text: String,
}

impl StatusIndicator {
    /// Creates a new indicator.
    pub fn new(fill: IndicatorFill, shape: IndicatorShape, text: impl Into<String>) -> Self {
        Self {
            fill,
            shape,
            text: text.into(),
        }
    }

    /// Green dot: connected.
    pub fn connected(text: impl Into<String>) -> Self {
        Self::new(IndicatorFill::Green, IndicatorShape::Dot, text)
    }

    /// Yellow ring: reconnecting.
    pub fn reconnecting(text: impl Into<String>) -> Self {
        Self::new(IndicatorFill::Yellow, IndicatorShape::Ring, text)
    }

    /// Red ring: connection lost.
    pub fn lost(text: impl Into<String>) -> Self {
        Self::new(IndicatorFill::Red, IndicatorShape::Ring, text)
    }

    /// Grey ring: disconnected / shut down.
    pub fn inactive(text: impl Into<String>) -> Self {
        Self::new(IndicatorFill::Grey, IndicatorShape::Ring, text)
    }
}

// =============================================================================
// StatusRecord
// =============================================================================

/// A structured lifecycle record emitted on the status channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// The endpoint this record concerns.
    pub endpoint: EndpointId,

    /// The status value.
    pub status: ClientStatus,

    /// Human-readable error message, present for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the record was produced.
    pub timestamp: DateTime<Utc>,
}

impl StatusRecord {
    /// Creates a status record without an error message.
    pub fn new(endpoint: EndpointId, status: ClientStatus) -> Self {
        Self {
            endpoint,
            status,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a status record carrying an error message.
    pub fn with_error(
        endpoint: EndpointId,
        status: ClientStatus,
        error: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            status,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// DataRecord
// =============================================================================

/// One successful action result: node identifier, value, and its data type.
///
/// Batch actions produce one record per requested node, preserving request
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    /// The node identifier the value belongs to.
    pub topic: String,

    /// The value, JSON-encoded for the host runtime.
    pub payload: Json,

    /// The data type of the value.
    #[serde(rename = "dataType")]
    pub data_type: DataTypeTag,
}

impl DataRecord {
    /// Creates a new data record.
    pub fn new(topic: impl Into<String>, payload: Json, data_type: DataTypeTag) -> Self {
        Self {
            topic: topic.into(),
            payload,
            data_type,
        }
    }
}

// =============================================================================
// Envelopes
// =============================================================================

/// Body of a data-channel emission: one record for single-node actions, an
/// ordered list for batch actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataBody {
    /// Result of a single-node action.
    Single(DataRecord),
    /// Ordered results of a batch action.
    Batch(Vec<DataRecord>),
}

impl DataBody {
    /// Returns the number of records in the body.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(records) => records.len(),
        }
    }

    /// Returns `true` if the body carries no records.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Batch(records) if records.is_empty())
    }

    /// Returns the records as a slice-like iterator.
    pub fn records(&self) -> Vec<&DataRecord> {
        match self {
            Self::Single(record) => vec![record],
            Self::Batch(records) => records.iter().collect(),
        }
    }
}

/// A data-channel emission: the endpoint it came from plus the result body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope {
    /// The endpoint the action ran against.
    pub endpoint: EndpointId,
    /// The action results.
    pub body: DataBody,
}

impl DataEnvelope {
    /// Creates an envelope for a single-node result.
    pub fn single(endpoint: EndpointId, record: DataRecord) -> Self {
        Self {
            endpoint,
            body: DataBody::Single(record),
        }
    }

    /// Creates an envelope for a batch result.
    pub fn batch(endpoint: EndpointId, records: Vec<DataRecord>) -> Self {
        Self {
            endpoint,
            body: DataBody::Batch(records),
        }
    }
}

/// A status-channel emission: the structured record plus an optional visual
/// indicator update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    /// The structured status record.
    pub record: StatusRecord,
    /// The paired indicator, absent for record-only emissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicator: Option<StatusIndicator>,
}

impl StatusEnvelope {
    /// Creates an envelope with both record and indicator.
    pub fn with_indicator(record: StatusRecord, indicator: StatusIndicator) -> Self {
        Self {
            record,
            indicator: Some(indicator),
        }
    }

    /// Creates a record-only envelope.
    pub fn record_only(record: StatusRecord) -> Self {
        Self {
            record,
            indicator: None,
        }
    }
}

/// Formats a delay for indicator labels, e.g. `"5s"` or `"1m 30s"`.
pub fn format_delay(delay: Duration) -> String {
    // Sub-second precision is noise in a status label.
    let rounded = Duration::from_secs(delay.as_secs().max(1));
    humantime::format_duration(rounded).to_string()
}

// =============================================================================
// Tests
// =============================================================================
