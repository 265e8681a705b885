// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Action validation and dispatch.
//!
//! Every action is validated into a [`PendingAction`] before any network
//! activity: a request that fails validation never touches the transport.
//! Execution runs against a live session and maps transport outcomes into
//! ordered [`DataRecord`]s; protocol failures are returned as errors for the
//! status channel and never unwind further.
//!
//! Batch policy: an accepted batch is submitted as one transport call. Any
//! per-node bad status fails the batch as a whole, naming the offending
//! node(s); no partial data emission occurs.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use serde_json::Value as Json;

use nodelink_core::error::{FlowResult, ProtocolError, ValidationError};
use nodelink_core::message::{DataBody, DataRecord};
use nodelink_core::types::{ActionKind, DataTypeTag};

use crate::conversion::{DataConverter, Variant};
use crate::transport::{ReadOutcome, UaTransport};
use crate::types::NodeId;

// =============================================================================
// Raw batch entry shapes
// =============================================================================

/// Wire shape of one `read-multiple` entry.
#[derive(Debug, Clone, Deserialize)]
struct RawReadEntry {
    #[serde(rename = "nodeId")]
    node_id: Option<String>,
    #[serde(rename = "dataType")]
    data_type: Option<DataTypeTag>,
}

/// Wire shape of one `write-multiple` entry.
#[derive(Debug, Clone, Deserialize)]
struct RawWriteEntry {
    #[serde(rename = "nodeId")]
    node_id: Option<String>,
    value: Option<Json>,
    #[serde(rename = "dataType")]
    data_type: Option<DataTypeTag>,
}

// =============================================================================
// PendingAction
// =============================================================================

/// A validated action, ready for dispatch. Lives only for one dispatch.
#[derive(Debug, Clone)]
pub enum PendingAction {
    /// Read one node.
    Read {
        /// The target node.
        node: NodeId,
    },

    /// Write one typed value.
    Write {
        /// The target node.
        node: NodeId,
        /// The typed value to write.
        value: Variant,
        /// The original JSON payload, echoed on success.
        echo: Json,
    },

    /// Read a batch of nodes.
    ReadMultiple {
        /// Targets with their declared (or defaulted) data types, in
        /// request order.
        entries: Vec<(NodeId, DataTypeTag)>,
    },

    /// Write a batch of typed values.
    WriteMultiple {
        /// Targets and typed values, in request order.
        writes: Vec<(NodeId, Variant)>,
        /// Echo records for the data channel, in request order.
        echo: Vec<DataRecord>,
    },
}

impl PendingAction {
    /// Returns the action kind.
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Read { .. } => ActionKind::Read,
            Self::Write { .. } => ActionKind::Write,
            Self::ReadMultiple { .. } => ActionKind::ReadMultiple,
            Self::WriteMultiple { .. } => ActionKind::WriteMultiple,
        }
    }
}

// =============================================================================
// DispatchStats
// =============================================================================

/// Counters for dispatcher activity.
#[derive(Debug, Default)]
pub struct DispatchStats {
    reads: AtomicU64,
    writes: AtomicU64,
    validation_failures: AtomicU64,
    protocol_failures: AtomicU64,
}

impl DispatchStats {
    /// Records a completed read action.
    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed write action.
    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected request.
    fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a protocol failure.
    fn record_protocol_failure(&self) {
        self.protocol_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns completed read actions.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns completed write actions.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns rejected requests.
    pub fn validation_failures(&self) -> u64 {
        self.validation_failures.load(Ordering::Relaxed)
    }

    /// Returns protocol failures.
    pub fn protocol_failures(&self) -> u64 {
        self.protocol_failures.load(Ordering::Relaxed)
    }
}

// =============================================================================
// ActionDispatcher
// =============================================================================

/// Validates and executes actions against a transport.
#[derive(Debug, Default)]
pub struct ActionDispatcher {
    converter: DataConverter,
    stats: DispatchStats,
}

impl ActionDispatcher {
    /// Creates a dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dispatcher counters.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validates raw request parts into a [`PendingAction`].
    ///
    /// No network activity happens here or before this: a request that
    /// fails validation is rejected outright.
    pub fn prepare(
        &self,
        action: ActionKind,
        topic: Option<&str>,
        payload: Option<&Json>,
        data_type: Option<DataTypeTag>,
    ) -> FlowResult<PendingAction> {
        let result = match action {
            ActionKind::Read => self.prepare_read(topic),
            ActionKind::Write => self.prepare_write(topic, payload, data_type),
            ActionKind::ReadMultiple => self.prepare_read_multiple(payload),
            ActionKind::WriteMultiple => self.prepare_write_multiple(payload),
        };

        if result.is_err() {
            self.stats.record_validation_failure();
        }
        result
    }

    fn prepare_read(&self, topic: Option<&str>) -> FlowResult<PendingAction> {
        let topic = non_empty(topic)
            .ok_or_else(|| ValidationError::missing_topic(ActionKind::Read.name()))?;
        let node = NodeId::parse_topic(topic)?;
        Ok(PendingAction::Read { node })
    }

    fn prepare_write(
        &self,
        topic: Option<&str>,
        payload: Option<&Json>,
        data_type: Option<DataTypeTag>,
    ) -> FlowResult<PendingAction> {
        let action = ActionKind::Write.name();

        let topic = non_empty(topic).ok_or_else(|| ValidationError::missing_topic(action))?;

        let payload = payload
            .filter(|p| !p.is_null())
            .ok_or_else(|| ValidationError::missing_payload(action))?;

        // Strict: a single write has no implicit data type default.
        let data_type = data_type.ok_or_else(|| ValidationError::missing_data_type(action))?;

        let node = NodeId::parse_topic(topic)?;
        let value = self
            .converter
            .json_to_variant(&node.to_string(), payload, data_type)?;

        Ok(PendingAction::Write {
            node,
            value,
            echo: payload.clone(),
        })
    }

    fn prepare_read_multiple(&self, payload: Option<&Json>) -> FlowResult<PendingAction> {
        let action = ActionKind::ReadMultiple.name();
        let raw = batch_array(payload, action)?;

        let mut entries = Vec::with_capacity(raw.len());
        for (index, item) in raw.iter().enumerate() {
            let entry: RawReadEntry = serde_json::from_value((*item).clone())
                .map_err(|e| ValidationError::malformed_entry(action, index, e.to_string()))?;

            let node_text = entry.node_id.as_deref().filter(|s| !s.trim().is_empty());
            let Some(node_text) = node_text else {
                return Err(
                    ValidationError::malformed_entry(action, index, "missing nodeId").into(),
                );
            };

            let node = NodeId::parse_topic(node_text)?;
            // Per-entry default only: an entry without a declared type reads
            // as a string.
            let data_type = entry.data_type.unwrap_or(DataTypeTag::String);
            entries.push((node, data_type));
        }

        Ok(PendingAction::ReadMultiple { entries })
    }

    fn prepare_write_multiple(&self, payload: Option<&Json>) -> FlowResult<PendingAction> {
        let action = ActionKind::WriteMultiple.name();
        let raw = batch_array(payload, action)?;

        let mut writes = Vec::with_capacity(raw.len());
        let mut echo = Vec::with_capacity(raw.len());

        // Any malformed entry rejects the whole batch before any network
        // call; nothing is partially submitted.
        for (index, item) in raw.iter().enumerate() {
            let entry: RawWriteEntry = serde_json::from_value((*item).clone())
                .map_err(|e| ValidationError::malformed_entry(action, index, e.to_string()))?;

            let node_text = entry.node_id.as_deref().filter(|s| !s.trim().is_empty());
            let Some(node_text) = node_text else {
                return Err(
                    ValidationError::malformed_entry(action, index, "missing nodeId").into(),
                );
            };

            let value = entry.value.filter(|v| !v.is_null()).ok_or_else(|| {
                ValidationError::malformed_entry(action, index, "missing value")
            })?;

            let data_type = entry.data_type.ok_or_else(|| {
                ValidationError::malformed_entry(action, index, "missing dataType")
            })?;

            let node = NodeId::parse_topic(node_text)?;
            let variant = self
                .converter
                .json_to_variant(&node.to_string(), &value, data_type)?;

            echo.push(DataRecord::new(node.to_string(), value, data_type));
            writes.push((node, variant));
        }

        Ok(PendingAction::WriteMultiple { writes, echo })
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Executes a validated action against a live session.
    ///
    /// The caller guarantees a session exists (dispatch is always preceded
    /// by `ensure_session`). Failures are returned for a single status
    /// emission; they never poison the connection or the session.
    pub async fn execute(
        &self,
        transport: &dyn UaTransport,
        action: &PendingAction,
    ) -> FlowResult<DataBody> {
        let result = match action {
            PendingAction::Read { node } => self.execute_read(transport, node).await,
            PendingAction::Write { node, value, echo } => {
                self.execute_write(transport, node, value, echo).await
            }
            PendingAction::ReadMultiple { entries } => {
                self.execute_read_multiple(transport, entries).await
            }
            PendingAction::WriteMultiple { writes, echo } => {
                self.execute_write_multiple(transport, writes, echo).await
            }
        };

        if result.is_err() {
            self.stats.record_protocol_failure();
        }
        result
    }

    async fn execute_read(
        &self,
        transport: &dyn UaTransport,
        node: &NodeId,
    ) -> FlowResult<DataBody> {
        let outcomes = transport
            .read_values(std::slice::from_ref(node))
            .await
            .map_err(|e| ProtocolError::read_failed(node.to_string(), e.user_message()))?;

        let outcome = outcomes.into_iter().next().ok_or_else(|| {
            ProtocolError::read_failed(node.to_string(), "server returned no result")
        })?;

        let record = self.read_outcome_to_record(outcome)?;
        self.stats.record_read();

        tracing::trace!(node = %node, "Read successful");

        Ok(DataBody::Single(record))
    }

    async fn execute_write(
        &self,
        transport: &dyn UaTransport,
        node: &NodeId,
        value: &Variant,
        echo: &Json,
    ) -> FlowResult<DataBody> {
        let outcomes = transport
            .write_values(&[(node.clone(), value.clone())])
            .await
            .map_err(|e| ProtocolError::write_failed(node.to_string(), e.user_message()))?;

        let outcome = outcomes.into_iter().next().ok_or_else(|| {
            ProtocolError::write_failed(node.to_string(), "server returned no result")
        })?;

        if !outcome.is_good() {
            return Err(ProtocolError::write_failed(
                node.to_string(),
                format!("status code 0x{:08X}", outcome.status_code),
            )
            .into());
        }

        self.stats.record_write();

        tracing::trace!(node = %node, "Write successful");

        // A successful write echoes the written value and its declared type.
        Ok(DataBody::Single(DataRecord::new(
            node.to_string(),
            echo.clone(),
            value.data_type(),
        )))
    }

    async fn execute_read_multiple(
        &self,
        transport: &dyn UaTransport,
        entries: &[(NodeId, DataTypeTag)],
    ) -> FlowResult<DataBody> {
        let nodes: Vec<NodeId> = entries.iter().map(|(node, _)| node.clone()).collect();

        let outcomes = transport
            .read_values(&nodes)
            .await
            .map_err(|e| ProtocolError::batch_read_failed(e.user_message()))?;

        // Re-align by node id so request order is preserved regardless of
        // the order the server answered in.
        let aligned = align_outcomes(&nodes, outcomes)
            .map_err(ProtocolError::batch_read_failed)?;

        let bad: Vec<String> = aligned
            .iter()
            .filter(|o| !o.is_good())
            .map(|o| format!("{} (0x{:08X})", o.node_id, o.status_code))
            .collect();
        if !bad.is_empty() {
            return Err(ProtocolError::batch_read_failed(format!(
                "bad status for node(s) {}",
                bad.join(", ")
            ))
            .into());
        }

        let mut records = Vec::with_capacity(aligned.len());
        for outcome in aligned {
            records.push(self.read_outcome_to_record(outcome)?);
        }

        self.stats.record_read();

        tracing::trace!(count = records.len(), "Batch read successful");

        Ok(DataBody::Batch(records))
    }

    async fn execute_write_multiple(
        &self,
        transport: &dyn UaTransport,
        writes: &[(NodeId, Variant)],
        echo: &[DataRecord],
    ) -> FlowResult<DataBody> {
        let outcomes = transport
            .write_values(writes)
            .await
            .map_err(|e| ProtocolError::batch_write_failed(e.user_message()))?;

        let bad: Vec<String> = outcomes
            .iter()
            .filter(|o| !o.is_good())
            .map(|o| format!("{} (0x{:08X})", o.node_id, o.status_code))
            .collect();
        if !bad.is_empty() {
            return Err(ProtocolError::batch_write_failed(format!(
                "bad status for node(s) {}",
                bad.join(", ")
            ))
            .into());
        }

        self.stats.record_write();

        tracing::trace!(count = writes.len(), "Batch write successful");

        Ok(DataBody::Batch(echo.to_vec()))
    }

    fn read_outcome_to_record(&self, outcome: ReadOutcome) -> FlowResult<DataRecord> {
        if !outcome.is_good() {
            return Err(ProtocolError::read_failed(
                outcome.node_id.to_string(),
                format!("status code 0x{:08X}", outcome.status_code),
            )
            .into());
        }

        let variant = outcome.value.ok_or_else(|| {
            ProtocolError::read_failed(outcome.node_id.to_string(), "good status without a value")
        })?;

        let (payload, data_type) = self.converter.variant_to_json(&variant);
        Ok(DataRecord::new(outcome.node_id.to_string(), payload, data_type))
    }
}

/// Reorders outcomes to match the request order, matching each requested
/// node to the first unconsumed outcome with the same id.
fn align_outcomes(
    requested: &[NodeId],
    outcomes: Vec<ReadOutcome>,
) -> Result<Vec<ReadOutcome>, String> {
    if outcomes.len() != requested.len() {
        return Err(format!(
            "server returned {} results for {} nodes",
            outcomes.len(),
            requested.len()
        ));
    }

    let mut remaining: Vec<Option<ReadOutcome>> = outcomes.into_iter().map(Some).collect();
    let mut aligned = Vec::with_capacity(requested.len());

    for node in requested {
        let position = remaining
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|o| &o.node_id == node))
            .ok_or_else(|| format!("server result missing for node {}", node))?;
        aligned.push(remaining[position].take().unwrap_or_else(|| unreachable!()));
    }

    Ok(aligned)
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|s| !s.is_empty())
}

fn batch_array<'a>(payload: Option<&'a Json>, action: &str) -> FlowResult<&'a Vec<Json>> {
    let array = payload
        .and_then(|p| p.as_array())
        .ok_or_else(|| ValidationError::empty_batch(action))?;
    if array.is_empty() {
        return Err(ValidationError::empty_batch(action).into());
    }
    Ok(array)
}

// =============================================================================
// Tests
// =============================================================================
