// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `nodelink read` / `nodelink write`: one-shot actions against a server.
//!
//! The commands drive the same [`ClientNode`] pipeline the flow runtime
//! uses: one inbound message in, one data- or status-channel emission out.
//! They are wired against the production transport and therefore require
//! the `real-transport` feature.

use crate::error::{CliError, CliResult};

/// Runs a one-shot read action.
pub async fn read(config_path: &str, node: &str) -> CliResult<()> {
    run_action(config_path, build_read_message(node)?).await
}

/// Runs a one-shot write action.
pub async fn write(config_path: &str, node: &str, value: &str, data_type: &str) -> CliResult<()> {
    run_action(config_path, build_write_message(node, value, data_type)?).await
}

fn build_read_message(node: &str) -> CliResult<nodelink_opcua::InboundMessage> {
    use nodelink_core::types::ActionKind;

    Ok(nodelink_opcua::InboundMessage::new()
        .with_action(ActionKind::Read)
        .with_topic(node))
}

fn build_write_message(
    node: &str,
    value: &str,
    data_type: &str,
) -> CliResult<nodelink_opcua::InboundMessage> {
    use nodelink_core::types::{ActionKind, DataTypeTag};

    let data_type: DataTypeTag =
        serde_json::from_value(serde_json::Value::String(data_type.to_string()))
            .map_err(|_| CliError::invalid_argument(format!("unknown data type '{data_type}'")))?;

    // The value argument is JSON; bare words become strings.
    let payload = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

    Ok(nodelink_opcua::InboundMessage::new()
        .with_action(ActionKind::Write)
        .with_topic(node)
        .with_payload(payload)
        .with_data_type(data_type))
}

#[cfg(feature = "real-transport")]
async fn run_action(config_path: &str, msg: nodelink_opcua::InboundMessage) -> CliResult<()> {
    use std::sync::Arc;

    use nodelink_core::bus::FlowBus;
    use nodelink_opcua::{ClientNode, RealUaTransport, UaTransport};

    let config = nodelink_config::load_endpoint_config(config_path)?;

    let bus = FlowBus::with_default_capacity();
    let factory = Arc::new(|options: &nodelink_opcua::ConnectOptions| {
        Arc::new(RealUaTransport::new(options.clone())) as Arc<dyn UaTransport>
    });

    let node = ClientNode::new("nodelink-cli", factory, bus).with_default_config(config);

    let mut data_rx = node.subscribe_data();
    let mut status_rx = node.subscribe_status();

    node.handle(msg).await;

    // The request resolves with either one data emission or one error
    // status; other lifecycle statuses (keepalive, reconnecting) are
    // informational and skipped.
    let result = loop {
        tokio::select! {
            data = data_rx.recv() => match data {
                Ok(envelope) => {
                    println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
                    break Ok(());
                }
                Err(_) => break Err(CliError::operation_failed("data channel closed")),
            },
            status = status_rx.recv() => match status {
                Ok(envelope) if envelope.record.status == nodelink_core::message::ClientStatus::Error => {
                    break Err(CliError::operation_failed(
                        envelope
                            .record
                            .error
                            .unwrap_or_else(|| envelope.record.status.to_string()),
                    ));
                }
                Ok(envelope) => {
                    tracing::info!(status = %envelope.record.status, "Status update");
                }
                Err(_) => break Err(CliError::operation_failed("status channel closed")),
            },
        }
    };

    node.close().await;
    result
}

#[cfg(not(feature = "real-transport"))]
async fn run_action(_config_path: &str, msg: nodelink_opcua::InboundMessage) -> CliResult<()> {
    let command = msg
        .action
        .map(|a| a.name().to_string())
        .unwrap_or_else(|| "action".to_string());
    Err(CliError::transport_unavailable(command))
}

// =============================================================================
// Tests
// =============================================================================
