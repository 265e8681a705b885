// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pool identity and teardown tests.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use nodelink_core::bus::FlowBus;
use nodelink_opcua::types::{ConnectOptions, UserIdentity};
use nodelink_opcua::{ConnectionPool, ConnectionState};

use nodelink_tests::common::fixtures;
use nodelink_tests::common::mocks::MockFactory;

fn options(endpoint: &str) -> ConnectOptions {
    ConnectOptions::builder().endpoint(endpoint).build().unwrap()
}

fn pool_with_factory() -> (Arc<ConnectionPool>, Arc<MockFactory>) {
    let factory = MockFactory::new();
    let bus = FlowBus::with_default_capacity();
    (
        Arc::new(ConnectionPool::new(factory.clone(), bus)),
        factory,
    )
}

// =============================================================================
// P1: pool identity
// =============================================================================

#[tokio::test]
async fn test_same_endpoint_always_returns_same_connection() {
    let (pool, factory) = pool_with_factory();
    let opts = options(fixtures::TEST_ENDPOINT);

    let connections: Vec<_> = (0..10).map(|_| pool.get_or_create(&opts)).collect();

    assert!(connections.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(factory.created_count(), 1);
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn test_concurrent_first_requests_build_one_connection() {
    let (pool, factory) = pool_with_factory();

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            pool.get_or_create(&options(fixtures::TEST_ENDPOINT))
        }));
    }

    let mut connections = Vec::new();
    for task in tasks {
        connections.push(task.await.unwrap());
    }

    assert_eq!(factory.created_count(), 1);
    assert!(connections.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[tokio::test]
async fn test_endpoints_are_independent() {
    let (pool, factory) = pool_with_factory();

    let a = pool.get_or_create(&options(fixtures::TEST_ENDPOINT));
    let b = pool.get_or_create(&options(fixtures::OTHER_ENDPOINT));

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(factory.created_count(), 2);

    // Connecting one endpoint does not touch the other.
    a.connect().await.unwrap();
    assert_eq!(a.state().await, ConnectionState::Connected);
    assert_eq!(b.state().await, ConnectionState::Disconnected);
}

// =============================================================================
// Connect-failure policy
// =============================================================================

#[tokio::test]
async fn test_connect_failure_keeps_pool_entry() {
    let (pool, factory) = pool_with_factory();

    let connection = pool.get_or_create(&options(fixtures::TEST_ENDPOINT));
    let transport = factory
        .transport_for(&fixtures::endpoint())
        .expect("transport created");

    transport.fail_connect.store(true, Ordering::SeqCst);
    assert!(connection.connect().await.is_err());

    // The entry survives; the same connection recovers later.
    assert!(pool.contains(&fixtures::endpoint()));
    let again = pool.get_or_create(&options(fixtures::TEST_ENDPOINT));
    assert!(Arc::ptr_eq(&connection, &again));

    transport.fail_connect.store(false, Ordering::SeqCst);
    again.connect().await.unwrap();
    assert_eq!(again.state().await, ConnectionState::Connected);
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test]
async fn test_teardown_closes_sessions_and_disconnects_everything() {
    let (pool, factory) = pool_with_factory();

    for endpoint in [fixtures::TEST_ENDPOINT, fixtures::OTHER_ENDPOINT] {
        let connection = pool.get_or_create(&options(endpoint));
        connection.connect().await.unwrap();
        connection
            .ensure_session(&UserIdentity::Anonymous)
            .await
            .unwrap();
    }
    assert_eq!(pool.len(), 2);

    pool.teardown_all().await;

    assert!(pool.is_empty());
    for endpoint in [fixtures::TEST_ENDPOINT, fixtures::OTHER_ENDPOINT] {
        let transport = factory
            .transport_for(&nodelink_core::types::EndpointId::new(endpoint))
            .unwrap();
        assert!(!transport.has_session());
        assert_eq!(transport.close_session_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.disconnect_calls.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_teardown_swallows_close_failures() {
    let (pool, factory) = pool_with_factory();

    let connection = pool.get_or_create(&options(fixtures::TEST_ENDPOINT));
    connection.connect().await.unwrap();
    connection
        .ensure_session(&UserIdentity::Anonymous)
        .await
        .unwrap();

    let transport = factory.transport_for(&fixtures::endpoint()).unwrap();
    transport.fail_close_session.store(true, Ordering::SeqCst);

    // Teardown still completes and clears everything.
    pool.teardown_all().await;
    assert!(pool.is_empty());
    assert!(!transport.has_session());
}

#[tokio::test]
async fn test_fresh_connection_after_teardown() {
    let (pool, factory) = pool_with_factory();

    let before = pool.get_or_create(&options(fixtures::TEST_ENDPOINT));
    pool.teardown_all().await;

    let after = pool.get_or_create(&options(fixtures::TEST_ENDPOINT));
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(factory.created_count(), 2);
}
