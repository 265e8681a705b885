// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! End-to-end tests for the client node: dispatch, session lifecycle,
//! channel separation, and the reconnection scenario.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::timeout;

use nodelink_core::message::{ClientStatus, DataBody, DataEnvelope, StatusEnvelope};
use nodelink_core::types::{ActionKind, DataTypeTag};
use nodelink_opcua::transport::TransportEvent;
use nodelink_opcua::types::NodeId;
use nodelink_opcua::{InboundMessage, Variant};

use nodelink_tests::common::builders::TestNodeBuilder;
use nodelink_tests::common::fixtures;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn recv_data(
    rx: &mut tokio::sync::broadcast::Receiver<DataEnvelope>,
) -> DataEnvelope {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for data emission")
        .expect("data channel closed")
}

async fn recv_status(
    rx: &mut tokio::sync::broadcast::Receiver<StatusEnvelope>,
) -> StatusEnvelope {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for status emission")
        .expect("status channel closed")
}

fn read_message(topic: &str) -> InboundMessage {
    InboundMessage::new()
        .with_action(ActionKind::Read)
        .with_topic(topic)
}

// =============================================================================
// Scenario: successful read
// =============================================================================

#[tokio::test]
async fn test_read_emits_one_data_record_and_no_status() {
    let mut harness = TestNodeBuilder::new().build();

    harness.node.handle(read_message("ns=2;s=Temperature")).await;

    // Seeding happens after the pool entry exists on first use, so pre-seed
    // by handling once, then reading the seeded value.
    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .expect("transport created");

    // The unseeded node reads as BadNodeIdUnknown → one status error.
    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Error);

    let (node, value) = fixtures::temperature_node();
    transport.set_value(node, value).await;

    harness.node.handle(read_message("ns=2;s=Temperature")).await;

    let envelope = recv_data(&mut harness.data_rx).await;
    assert_eq!(envelope.endpoint, fixtures::endpoint());
    match envelope.body {
        DataBody::Single(record) => {
            assert_eq!(record.topic, "ns=2;s=Temperature");
            assert_eq!(record.payload, json!(25.5));
            assert_eq!(record.data_type, DataTypeTag::Double);
        }
        other => panic!("expected a single record, got {:?}", other),
    }

    // No further status emission accompanies the success (P6).
    assert!(matches!(
        harness.status_rx.try_recv(),
        Err(TryRecvError::Empty)
    ));
}

// =============================================================================
// Scenario: write without a data type
// =============================================================================

#[tokio::test]
async fn test_write_without_data_type_rejected_before_network() {
    let mut harness = TestNodeBuilder::new().build();

    harness
        .node
        .handle(
            InboundMessage::new()
                .with_action(ActionKind::Write)
                .with_topic("ns=2;s=Setpoint")
                .with_payload(json!(42.5)),
        )
        .await;

    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Error);
    assert!(envelope
        .record
        .error
        .as_deref()
        .unwrap()
        .contains("No data type specified"));

    // Validation failed before any network activity: no transport was even
    // created, so neither connect nor read/write ever ran (P4).
    assert_eq!(harness.factory.created_count(), 0);
    assert!(matches!(harness.data_rx.try_recv(), Err(TryRecvError::Empty)));
}

// =============================================================================
// P4: validation precedes I/O
// =============================================================================

#[tokio::test]
async fn test_validation_failures_never_touch_the_network() {
    let mut harness = TestNodeBuilder::new().build();

    let rejected = [
        // write with empty topic
        InboundMessage::new()
            .with_action(ActionKind::Write)
            .with_topic("")
            .with_payload(json!(1))
            .with_data_type(DataTypeTag::Int32),
        // write with null payload
        InboundMessage::new()
            .with_action(ActionKind::Write)
            .with_topic("ns=2;s=S")
            .with_payload(json!(null))
            .with_data_type(DataTypeTag::Int32),
        // write with no data type
        InboundMessage::new()
            .with_action(ActionKind::Write)
            .with_topic("ns=2;s=S")
            .with_payload(json!(1)),
        // read with no topic
        InboundMessage::new().with_action(ActionKind::Read),
        // empty batch
        InboundMessage::new()
            .with_action(ActionKind::WriteMultiple)
            .with_payload(json!([])),
        // no action at all
        InboundMessage::new().with_topic("ns=2;s=S"),
    ];

    let expected = rejected.len();
    for msg in rejected {
        harness.node.handle(msg).await;
    }

    for _ in 0..expected {
        let envelope = recv_status(&mut harness.status_rx).await;
        assert_eq!(envelope.record.status, ClientStatus::Error);
    }

    assert_eq!(harness.factory.created_count(), 0);
}

// =============================================================================
// Write path
// =============================================================================

#[tokio::test]
async fn test_write_echoes_value_on_data_channel() {
    let mut harness = TestNodeBuilder::new().build();

    harness
        .node
        .handle(
            InboundMessage::new()
                .with_action(ActionKind::Write)
                .with_topic("ns=2;s=Setpoint")
                .with_payload(json!(42.5))
                .with_data_type(DataTypeTag::Double),
        )
        .await;

    let envelope = recv_data(&mut harness.data_rx).await;
    match envelope.body {
        DataBody::Single(record) => {
            assert_eq!(record.topic, "ns=2;s=Setpoint");
            assert_eq!(record.payload, json!(42.5));
            assert_eq!(record.data_type, DataTypeTag::Double);
        }
        other => panic!("expected a single record, got {:?}", other),
    }

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();
    let history = transport.write_history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].0, fixtures::setpoint_node());
    assert_eq!(history[0].1, Variant::Double(42.5));
}

#[tokio::test]
async fn test_protocol_failure_reports_node_in_error() {
    let mut harness = TestNodeBuilder::new().build();

    // Create the connection, then make reads fail at the transport.
    harness.node.handle(read_message("ns=2;s=T")).await;
    recv_status(&mut harness.status_rx).await;

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();
    transport.fail_reads.store(true, Ordering::SeqCst);

    harness.node.handle(read_message("ns=2;s=T")).await;

    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Error);
    let message = envelope.record.error.unwrap();
    assert!(message.contains("ns=2;s=T"), "message: {message}");

    // The failure poisoned nothing: session still installed, next read works.
    transport.fail_reads.store(false, Ordering::SeqCst);
    let (node, value) = fixtures::temperature_node();
    transport.set_value(node, value).await;

    harness.node.handle(read_message("ns=2;s=Temperature")).await;
    recv_data(&mut harness.data_rx).await;
    assert_eq!(transport.session_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// P5: batch order
// =============================================================================

#[tokio::test]
async fn test_read_multiple_preserves_request_order() {
    let mut harness = TestNodeBuilder::new().build();

    // First contact creates the transport; seed afterwards.
    harness.node.handle(read_message("ns=2;s=A")).await;
    recv_status(&mut harness.status_rx).await;

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();
    for (node, value) in fixtures::batch_nodes() {
        transport.set_value(node, value).await;
    }
    // The server answers in reverse order; the results must not.
    transport.shuffle_reads.store(true, Ordering::SeqCst);

    harness
        .node
        .handle(
            InboundMessage::new()
                .with_action(ActionKind::ReadMultiple)
                .with_payload(json!([
                    {"nodeId": "ns=2;s=A", "dataType": "Int32"},
                    {"nodeId": "ns=2;s=B", "dataType": "Int32"},
                    {"nodeId": "ns=2;s=C", "dataType": "Int32"}
                ])),
        )
        .await;

    let envelope = recv_data(&mut harness.data_rx).await;
    match envelope.body {
        DataBody::Batch(records) => {
            let topics: Vec<&str> = records.iter().map(|r| r.topic.as_str()).collect();
            assert_eq!(topics, vec!["ns=2;s=A", "ns=2;s=B", "ns=2;s=C"]);
            let payloads: Vec<i64> =
                records.iter().map(|r| r.payload.as_i64().unwrap()).collect();
            assert_eq!(payloads, vec![1, 2, 3]);
        }
        other => panic!("expected a batch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_write_multiple_is_all_or_nothing() {
    let mut harness = TestNodeBuilder::new().build();

    harness.node.handle(read_message("ns=2;s=A")).await;
    recv_status(&mut harness.status_rx).await;

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();
    // One node in the batch reports a bad status.
    transport
        .set_bad_status(NodeId::string(2, "B"), 0x803B_0000)
        .await;

    harness
        .node
        .handle(
            InboundMessage::new()
                .with_action(ActionKind::WriteMultiple)
                .with_payload(json!([
                    {"nodeId": "ns=2;s=A", "value": 1, "dataType": "Int32"},
                    {"nodeId": "ns=2;s=B", "value": 2, "dataType": "Int32"}
                ])),
        )
        .await;

    // The whole batch surfaces as one protocol error naming the bad node.
    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Error);
    assert!(envelope.record.error.unwrap().contains("ns=2;s=B"));
    assert!(matches!(harness.data_rx.try_recv(), Err(TryRecvError::Empty)));
}

// =============================================================================
// P2: single session under concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_actions_share_one_session() {
    let harness = TestNodeBuilder::new().build();
    let node = Arc::new(harness.node);
    let mut data_rx = node.subscribe_data();

    // Pre-create the transport and seed a value so every action succeeds.
    node.handle(read_message("ns=2;s=Temperature")).await;
    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();
    let (temp_node, value) = fixtures::temperature_node();
    transport.set_value(temp_node, value).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let node = node.clone();
        tasks.push(tokio::spawn(async move {
            node.handle(read_message("ns=2;s=Temperature")).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for _ in 0..8 {
        recv_data(&mut data_rx).await;
    }

    // Exactly one connect and one authentication handshake ever happened.
    assert_eq!(transport.connect_calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.session_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// P3: session recreation after loss
// =============================================================================

#[tokio::test]
async fn test_session_recreated_after_connection_loss() {
    let mut harness = TestNodeBuilder::new().build();

    harness.node.handle(read_message("ns=2;s=Temperature")).await;
    recv_status(&mut harness.status_rx).await;

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();
    let (node_id, value) = fixtures::temperature_node();
    transport.set_value(node_id, value).await;
    assert_eq!(transport.session_calls.load(Ordering::SeqCst), 1);

    // Transport loses the connection, then recovers.
    transport.emit(TransportEvent::ConnectionLost);
    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Disconnected);

    transport.emit(TransportEvent::ConnectionReestablished);
    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Connected);

    // Same connection, fresh authentication on the next action.
    let created_before = harness.factory.created_count();
    harness.node.handle(read_message("ns=2;s=Temperature")).await;
    recv_data(&mut harness.data_rx).await;

    assert_eq!(harness.factory.created_count(), created_before);
    assert_eq!(transport.session_calls.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Scenario: loss → backoff ×N → reestablished
// =============================================================================

#[tokio::test]
async fn test_reconnection_status_sequence() {
    let mut harness = TestNodeBuilder::new().build();

    harness.node.handle(read_message("ns=2;s=Temperature")).await;
    recv_status(&mut harness.status_rx).await;

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();

    transport.emit(TransportEvent::ConnectionLost);
    for attempt in 1..=3u32 {
        transport.emit(TransportEvent::Backoff {
            attempt,
            delay: Duration::from_secs(5 * attempt as u64),
        });
    }
    transport.emit(TransportEvent::ConnectionReestablished);

    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Disconnected);

    for attempt in 1..=3u32 {
        let envelope = recv_status(&mut harness.status_rx).await;
        assert_eq!(envelope.record.status, ClientStatus::Reconnecting);
        let label = envelope.indicator.unwrap().text;
        assert!(
            label.contains(&format!("attempt {attempt}")),
            "label: {label}"
        );
    }

    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Connected);

    // No data-channel emission anywhere in the sequence (P6).
    assert!(matches!(harness.data_rx.try_recv(), Err(TryRecvError::Empty)));
}

// =============================================================================
// Keepalive and session-closed signals
// =============================================================================

#[tokio::test]
async fn test_keepalive_refreshes_status() {
    let mut harness = TestNodeBuilder::new().build();

    harness.node.handle(read_message("ns=2;s=T")).await;
    recv_status(&mut harness.status_rx).await;

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();
    transport.emit(TransportEvent::KeepAlive);

    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::KeepAlive);
    assert_eq!(envelope.indicator.unwrap().text, "Session keep-alive");
}

#[tokio::test]
async fn test_session_closed_destroys_session_and_reports() {
    let mut harness = TestNodeBuilder::new().build();

    harness.node.handle(read_message("ns=2;s=T")).await;
    recv_status(&mut harness.status_rx).await;

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();
    assert!(transport.has_session());

    transport.emit(TransportEvent::SessionClosed);

    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Disconnected);
    assert!(envelope
        .record
        .error
        .unwrap()
        .contains("Session closed for endpoint"));

    // The close was propagated to the server.
    assert_eq!(transport.close_session_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Session errors do not poison the connection
// =============================================================================

#[tokio::test]
async fn test_session_failure_retries_on_next_action() {
    let mut harness = TestNodeBuilder::new().build();

    // First contact installs a session; the unseeded read itself fails.
    harness.node.handle(read_message("ns=2;s=Temperature")).await;
    recv_status(&mut harness.status_rx).await;

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();

    // The server closes the session, then rejects the re-authentication.
    transport.emit(nodelink_opcua::transport::TransportEvent::SessionClosed);
    recv_status(&mut harness.status_rx).await;

    transport.fail_create_session.store(true, Ordering::SeqCst);
    harness.node.handle(read_message("ns=2;s=Temperature")).await;

    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Error);
    assert!(envelope
        .record
        .error
        .as_deref()
        .unwrap()
        .contains("Failed to create session"));

    // Recovery: same connection, later action succeeds.
    transport.fail_create_session.store(false, Ordering::SeqCst);
    let (node_id, value) = fixtures::temperature_node();
    transport.set_value(node_id, value).await;

    harness.node.handle(read_message("ns=2;s=Temperature")).await;
    recv_data(&mut harness.data_rx).await;
    assert_eq!(harness.factory.created_count(), 1);
    assert_eq!(transport.session_calls.load(Ordering::SeqCst), 3);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_close_reports_and_tears_down() {
    let mut harness = TestNodeBuilder::new().build();

    harness.node.handle(read_message("ns=2;s=T")).await;
    recv_status(&mut harness.status_rx).await;

    let transport = harness
        .factory
        .transport_for(&fixtures::endpoint())
        .unwrap();
    assert!(transport.has_session());

    harness.node.close().await;

    let envelope = recv_status(&mut harness.status_rx).await;
    assert_eq!(envelope.record.status, ClientStatus::Disconnected);
    assert_eq!(envelope.indicator.unwrap().text, "Disconnected");

    assert!(harness.node.pool().is_empty());
    assert!(!transport.has_session());
    assert_eq!(transport.disconnect_calls.load(Ordering::SeqCst), 1);
}
