//! Tests for the typed clients over an in-process manager-backed transport.

use async_trait::async_trait;
use plexus::client::{list_services, CounterClient, Transport};
use plexus::core::context::{Context, OperationKind};
use plexus::core::error::PlexusResult;
use plexus::primitives::counter::{CounterService, COUNTER_TYPE};
use plexus::service::manager::ServiceManager;
use plexus::service::registry::ServiceTypeRegistry;
use plexus::wire::proto::ServiceId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Transport that applies envelopes directly to an in-process manager,
/// standing in for the consensus layer's single-threaded apply loop.
struct ManagerTransport {
    manager: Mutex<ServiceManager>,
    context: Arc<Context>,
    next_index: AtomicU64,
}

impl ManagerTransport {
    fn new() -> Arc<Self> {
        let mut registry = ServiceTypeRegistry::new();
        registry.register(COUNTER_TYPE, CounterService::factory);

        let mut manager = ServiceManager::new(Arc::new(registry));
        let context = Context::shared();
        manager.init(context.clone());

        Arc::new(Self {
            manager: Mutex::new(manager),
            context,
            next_index: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl Transport for ManagerTransport {
    async fn execute_command(&self, request: Vec<u8>) -> PlexusResult<Vec<u8>> {
        let mut manager = self.manager.lock().await;
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        self.context.prepare(index, OperationKind::Command);
        manager.apply_command(&request).await
    }

    async fn execute_query(&self, request: Vec<u8>) -> PlexusResult<Vec<u8>> {
        let manager = self.manager.lock().await;
        let index = self.next_index.load(Ordering::SeqCst) - 1;
        self.context.prepare(index, OperationKind::Query);
        manager.apply_query(&request).await
    }
}

#[tokio::test]
async fn counter_client_end_to_end() {
    let transport = ManagerTransport::new();
    let counter = CounterClient::new(transport.clone(), "c1");

    counter.create().await.unwrap();

    assert_eq!(counter.set(5).await.unwrap(), 0);
    assert_eq!(counter.increment(0).await.unwrap(), (5, 6));
    assert_eq!(counter.increment(4).await.unwrap(), (6, 10));
    assert_eq!(counter.decrement(3).await.unwrap(), (10, 7));
    assert!(counter.check_and_set(7, 70).await.unwrap());
    assert!(!counter.check_and_set(7, 99).await.unwrap());
    assert_eq!(counter.get().await.unwrap(), 70);
}

#[tokio::test]
async fn delete_resets_to_initial_state() {
    let transport = ManagerTransport::new();
    let counter = CounterClient::new(transport.clone(), "c1");

    counter.create().await.unwrap();
    counter.set(41).await.unwrap();
    counter.delete().await.unwrap();

    // The id is gone; the default transient path answers with a fresh value.
    assert_eq!(counter.get().await.unwrap(), 0);
}

#[tokio::test]
async fn listing_reflects_created_counters() {
    let transport = ManagerTransport::new();
    let b = CounterClient::new(transport.clone(), "b");
    let a = CounterClient::new(transport.clone(), "a");

    b.create().await.unwrap();
    a.create().await.unwrap();

    let services = list_services(&transport, COUNTER_TYPE).await.unwrap();
    assert_eq!(
        services,
        vec![
            ServiceId::new("a", COUNTER_TYPE),
            ServiceId::new("b", COUNTER_TYPE),
        ]
    );

    let none = list_services(&transport, "lock").await.unwrap();
    assert!(none.is_empty());
}
