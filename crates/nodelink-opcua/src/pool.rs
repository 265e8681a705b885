// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint-keyed connection registry.
//!
//! The pool is the only shared mutable resource of the orchestrator. It
//! guarantees at most one [`Connection`] per endpoint: creation and
//! registration happen atomically inside the map's entry API (connection
//! construction is synchronous and performs no I/O), so two concurrent
//! first requests for an unseen endpoint still yield a single connection.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use nodelink_core::bus::FlowBus;
use nodelink_core::types::EndpointId;

use crate::connection::Connection;
use crate::report::Reporter;
use crate::transport::UaTransport;
use crate::types::ConnectOptions;

// =============================================================================
// TransportFactory
// =============================================================================

/// Creates transports for new pool entries.
///
/// Construction must be synchronous and free of I/O: the transport connects
/// lazily when the connection first needs it.
pub trait TransportFactory: Send + Sync {
    /// Creates a transport for the given options.
    fn create(&self, options: &ConnectOptions) -> Arc<dyn UaTransport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ConnectOptions) -> Arc<dyn UaTransport> + Send + Sync,
{
    fn create(&self, options: &ConnectOptions) -> Arc<dyn UaTransport> {
        self(options)
    }
}

// =============================================================================
// ConnectionPool
// =============================================================================

/// Registry mapping endpoint identity to its connection.
pub struct ConnectionPool {
    connections: DashMap<EndpointId, Arc<Connection>>,
    factory: Arc<dyn TransportFactory>,
    bus: Arc<FlowBus>,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub fn new(factory: Arc<dyn TransportFactory>, bus: Arc<FlowBus>) -> Self {
        Self {
            connections: DashMap::new(),
            factory,
            bus,
        }
    }

    /// Returns the connection for `options.endpoint`, creating and
    /// registering it if absent.
    ///
    /// Creation is serialized per key: the entry closure runs under the
    /// map's shard lock, so no caller ever observes a partially initialized
    /// entry and no endpoint ever gets a second connection.
    pub fn get_or_create(&self, options: &ConnectOptions) -> Arc<Connection> {
        let endpoint = options.endpoint.clone();

        self.connections
            .entry(endpoint.clone())
            .or_insert_with(|| {
                let transport = self.factory.create(options);
                let reporter = Reporter::new(self.bus.clone(), endpoint.clone());

                tracing::info!(endpoint = %endpoint, "Registered connection");

                Connection::new(options.clone(), transport, reporter)
            })
            .clone()
    }

    /// Returns the connection for an endpoint, if registered.
    pub fn get(&self, endpoint: &EndpointId) -> Option<Arc<Connection>> {
        self.connections.get(endpoint).map(|r| r.value().clone())
    }

    /// Returns `true` if a connection exists for the endpoint.
    pub fn contains(&self, endpoint: &EndpointId) -> bool {
        self.connections.contains_key(endpoint)
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns all registered endpoints.
    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.connections.iter().map(|r| r.key().clone()).collect()
    }

    /// Applies `f` to every registered connection.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        for entry in self.connections.iter() {
            f(entry.value());
        }
    }

    /// Tears down every connection and clears the registry.
    ///
    /// Used only at shutdown. For each entry: the session is closed
    /// best-effort, the transport disconnected best-effort, and the event
    /// pump stopped, so no timers or tasks survive. Errors are logged, never
    /// returned; teardown always completes.
    pub async fn teardown_all(&self) {
        let connections: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .map(|r| r.value().clone())
            .collect();

        for connection in connections {
            connection.shutdown().await;
        }

        self.connections.clear();

        tracing::info!("Connection pool cleared");
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connections", &self.connections.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio::sync::broadcast;

    use nodelink_core::error::FlowResult;

    use crate::conversion::Variant;
    use crate::transport::{
        ReadOutcome, SessionHandle, TransportEvent, TransportState, WriteOutcome,
    };
    use crate::types::{NodeId, UserIdentity};

    struct StubTransport {
        endpoint: EndpointId,
        connected: AtomicBool,
        events: broadcast::Sender<TransportEvent>,
    }

    #[async_trait]
    impl UaTransport for StubTransport {
        async fn connect(&self) -> FlowResult<()> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> FlowResult<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn state(&self) -> TransportState {
            TransportState::Disconnected
        }

        async fn create_session(&self, identity: &UserIdentity) -> FlowResult<SessionHandle> {
            Ok(SessionHandle::new("s", identity))
        }

        async fn close_session(&self) -> FlowResult<()> {
            Ok(())
        }

        async fn read_values(&self, _nodes: &[NodeId]) -> FlowResult<Vec<ReadOutcome>> {
            Ok(vec![])
        }

        async fn write_values(
            &self,
            _writes: &[(NodeId, Variant)],
        ) -> FlowResult<Vec<WriteOutcome>> {
            Ok(vec![])
        }

        fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent> {
            self.events.subscribe()
        }

        fn endpoint(&self) -> &EndpointId {
            &self.endpoint
        }
    }

    struct CountingFactory {
        created: AtomicU32,
    }

    impl TransportFactory for CountingFactory {
        fn create(&self, options: &ConnectOptions) -> Arc<dyn UaTransport> {
            self.created.fetch_add(1, Ordering::SeqCst);
            let (events, _) = broadcast::channel(8);
            Arc::new(StubTransport {
                endpoint: options.endpoint.clone(),
                connected: AtomicBool::new(false),
                events,
            })
        }
    }

    fn pool() -> (Arc<ConnectionPool>, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory {
            created: AtomicU32::new(0),
        });
        let bus = FlowBus::with_default_capacity();
        (
            Arc::new(ConnectionPool::new(factory.clone(), bus)),
            factory,
        )
    }

    fn options(endpoint: &str) -> ConnectOptions {
        ConnectOptions::builder().endpoint(endpoint).build().unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let (pool, factory) = pool();
        let opts = options("opc.tcp://a:4840");

        let first = pool.get_or_create(&opts);
        let second = pool.get_or_create(&opts);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_endpoints_get_distinct_connections() {
        let (pool, factory) = pool();

        let a = pool.get_or_create(&options("opc.tcp://a:4840"));
        let b = pool.get_or_create(&options("opc.tcp://b:4840"));

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_create_one_connection() {
        let (pool, factory) = pool();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move {
                pool.get_or_create(&options("opc.tcp://race:4840"))
            }));
        }

        let mut connections = Vec::new();
        for task in tasks {
            connections.push(task.await.unwrap());
        }

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert!(connections
            .windows(2)
            .all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_teardown_all_clears_pool() {
        let (pool, _factory) = pool();

        let connection = pool.get_or_create(&options("opc.tcp://a:4840"));
        connection.connect().await.unwrap();
        connection
            .ensure_session(&UserIdentity::Anonymous)
            .await
            .unwrap();
        pool.get_or_create(&options("opc.tcp://b:4840"));

        pool.teardown_all().await;

        assert!(pool.is_empty());
        assert_eq!(
            connection.state().await,
            crate::connection::ConnectionState::Disconnected
        );

        // A fresh request after teardown builds a fresh connection.
        let recreated = pool.get_or_create(&options("opc.tcp://a:4840"));
        assert!(!Arc::ptr_eq(&connection, &recreated));
    }

    #[tokio::test]
    async fn test_for_each_visits_all() {
        let (pool, _factory) = pool();
        pool.get_or_create(&options("opc.tcp://a:4840"));
        pool.get_or_create(&options("opc.tcp://b:4840"));

        let mut seen = Vec::new();
        pool.for_each(|c| seen.push(c.endpoint().clone()));
        seen.sort();

        assert_eq!(
            seen,
            vec![
                EndpointId::new("opc.tcp://a:4840"),
                EndpointId::new("opc.tcp://b:4840")
            ]
        );
    }
}
