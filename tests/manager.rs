//! Tests for the service manager (the multiplexer).

use async_trait::async_trait;
use plexus::core::config::ManagerConfig;
use plexus::core::context::{Context, InstanceContext, OperationKind};
use plexus::core::error::{PlexusError, PlexusResult};
use plexus::primitives::counter::{
    CounterRequest, CounterResponse, CounterResult, CounterService, COUNTER_TYPE,
};
use plexus::service::manager::ServiceManager;
use plexus::service::primitive::{PrimitiveService, StreamHandler};
use plexus::service::registry::ServiceTypeRegistry;
use plexus::wire::codec;
use plexus::wire::proto::{ResponseKind, ServiceId, ServiceRequest, ServiceResponse};
use std::io::{BufRead, Cursor, Write};
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

fn counter_registry() -> Arc<ServiceTypeRegistry> {
    let mut registry = ServiceTypeRegistry::new();
    registry.register(COUNTER_TYPE, CounterService::factory);
    Arc::new(registry)
}

/// A manager plus the shared context the consensus layer would own.
struct Fixture {
    manager: ServiceManager,
    context: Arc<Context>,
    next_index: u64,
}

impl Fixture {
    fn new() -> Self {
        Self::with_registry(counter_registry())
    }

    fn with_registry(registry: Arc<ServiceTypeRegistry>) -> Self {
        Self::with_manager(ServiceManager::new(registry))
    }

    fn with_manager(mut manager: ServiceManager) -> Self {
        let context = Context::shared();
        manager.init(context.clone());
        Self {
            manager,
            context,
            next_index: 1,
        }
    }

    async fn command(&mut self, request: &ServiceRequest) -> PlexusResult<ServiceResponse> {
        self.context.prepare(self.next_index, OperationKind::Command);
        self.next_index += 1;
        let bytes = self.manager.apply_command(&codec::encode(request)).await?;
        codec::decode(&bytes)
    }

    async fn query(&mut self, request: &ServiceRequest) -> PlexusResult<ServiceResponse> {
        self.context
            .prepare(self.next_index - 1, OperationKind::Query);
        let bytes = self.manager.apply_query(&codec::encode(request)).await?;
        codec::decode(&bytes)
    }

    async fn query_stream(
        &mut self,
        request: &ServiceRequest,
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        self.context
            .prepare(self.next_index - 1, OperationKind::Query);
        self.manager
            .apply_query_stream(&codec::encode(request), handler)
            .await
    }

    fn snapshot(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.manager.snapshot(&mut buf).unwrap();
        buf
    }
}

fn counter_id(name: &str) -> ServiceId {
    ServiceId::new(name, COUNTER_TYPE)
}

fn counter_command(name: &str, op: CounterRequest) -> ServiceRequest {
    ServiceRequest::command(counter_id(name), codec::encode(&op))
}

fn counter_query(name: &str) -> ServiceRequest {
    ServiceRequest::query(counter_id(name), codec::encode(&CounterRequest::get()))
}

/// Unwrap a counter result from a command or query response envelope.
fn counter_result(response: ServiceResponse) -> CounterResult {
    let payload = match response.kind.expect("response envelope missing kind") {
        ResponseKind::Command(bytes) | ResponseKind::Query(bytes) => bytes,
        other => panic!("expected command or query response, got {other:?}"),
    };
    let decoded: CounterResponse = codec::decode(&payload).unwrap();
    decoded.op.expect("counter response missing op")
}

fn metadata_services(response: ServiceResponse) -> Vec<ServiceId> {
    match response.kind.expect("response envelope missing kind") {
        ResponseKind::Metadata(metadata) => metadata.services,
        other => panic!("expected metadata response, got {other:?}"),
    }
}

/// Records chunks and the single terminal, asserting terminal discipline.
#[derive(Default)]
struct CollectingHandler {
    chunks: Vec<Vec<u8>>,
    completed: bool,
    error: Option<PlexusError>,
}

impl CollectingHandler {
    fn assert_open(&self) {
        assert!(!self.completed, "chunk or terminal after complete");
        assert!(self.error.is_none(), "chunk or terminal after error");
    }
}

impl StreamHandler for CollectingHandler {
    fn next(&mut self, chunk: Vec<u8>) {
        self.assert_open();
        self.chunks.push(chunk);
    }

    fn complete(&mut self) {
        self.assert_open();
        self.completed = true;
    }

    fn error(&mut self, error: PlexusError) {
        self.assert_open();
        self.error = Some(error);
    }
}

/// Test primitive emitting a fixed chunk sequence on the streaming query path.
struct EmitterService {
    chunks: Vec<Vec<u8>>,
    fail_after_first: bool,
}

#[async_trait]
impl PrimitiveService for EmitterService {
    async fn apply_command(
        &mut self,
        _ctx: &InstanceContext,
        _payload: &[u8],
    ) -> PlexusResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn apply_query(&self, _ctx: &InstanceContext, _payload: &[u8]) -> PlexusResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn apply_query_stream(
        &self,
        _ctx: &InstanceContext,
        _payload: &[u8],
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        if self.fail_after_first {
            handler.next(self.chunks[0].clone());
            handler.error(PlexusError::service("emitter failed"));
        } else {
            for chunk in &self.chunks {
                handler.next(chunk.clone());
            }
            handler.complete();
        }
        Ok(())
    }

    fn snapshot(&self, _output: &mut dyn Write) -> PlexusResult<()> {
        Ok(())
    }

    fn restore(&mut self, _input: &mut dyn BufRead) -> PlexusResult<()> {
        Ok(())
    }
}

/// Test primitive withholding log-truncation consent below a fixed index.
struct RetentiveService {
    floor: u64,
}

#[async_trait]
impl PrimitiveService for RetentiveService {
    async fn apply_command(
        &mut self,
        _ctx: &InstanceContext,
        _payload: &[u8],
    ) -> PlexusResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn apply_query(&self, _ctx: &InstanceContext, _payload: &[u8]) -> PlexusResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn snapshot(&self, _output: &mut dyn Write) -> PlexusResult<()> {
        Ok(())
    }

    fn restore(&mut self, _input: &mut dyn BufRead) -> PlexusResult<()> {
        Ok(())
    }

    fn can_delete(&self, index: u64) -> bool {
        index >= self.floor
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn counter_basic() {
    let mut fx = Fixture::new();

    let response = fx
        .command(&ServiceRequest::create(counter_id("c1")))
        .await
        .unwrap();
    assert!(matches!(response.kind, Some(ResponseKind::Create(_))));

    let result = counter_result(
        fx.command(&counter_command("c1", CounterRequest::increment(0)))
            .await
            .unwrap(),
    );
    let CounterResult::Increment(inc) = result else {
        panic!("expected increment response, got {result:?}");
    };
    assert_eq!((inc.previous_value, inc.next_value), (0, 1));

    let result = counter_result(
        fx.command(&counter_command("c1", CounterRequest::increment(5)))
            .await
            .unwrap(),
    );
    let CounterResult::Increment(inc) = result else {
        panic!("expected increment response, got {result:?}");
    };
    assert_eq!((inc.previous_value, inc.next_value), (1, 6));

    let result = counter_result(fx.query(&counter_query("c1")).await.unwrap());
    let CounterResult::Get(get) = result else {
        panic!("expected get response, got {result:?}");
    };
    assert_eq!(get.value, 6);
}

#[tokio::test]
async fn check_and_set() {
    let mut fx = Fixture::new();
    fx.command(&counter_command("c1", CounterRequest::set(6)))
        .await
        .unwrap();

    let result = counter_result(
        fx.command(&counter_command("c1", CounterRequest::check_and_set(6, 10)))
            .await
            .unwrap(),
    );
    assert!(matches!(
        result,
        CounterResult::CheckAndSet(cas) if cas.succeeded
    ));

    let result = counter_result(
        fx.command(&counter_command("c1", CounterRequest::check_and_set(6, 99)))
            .await
            .unwrap(),
    );
    assert!(matches!(
        result,
        CounterResult::CheckAndSet(cas) if !cas.succeeded
    ));

    let result = counter_result(fx.query(&counter_query("c1")).await.unwrap());
    assert!(matches!(result, CounterResult::Get(get) if get.value == 10));
}

#[tokio::test]
async fn delete_isolates_streaming_but_not_transient_queries() {
    let mut fx = Fixture::new();
    fx.command(&ServiceRequest::create(counter_id("c1")))
        .await
        .unwrap();

    let response = fx
        .command(&ServiceRequest::delete(counter_id("c1")))
        .await
        .unwrap();
    assert!(matches!(response.kind, Some(ResponseKind::Delete(_))));

    // Streaming query on the deleted id fails through the sink.
    let mut handler = CollectingHandler::default();
    let result = fx.query_stream(&counter_query("c1"), &mut handler).await;
    assert!(matches!(result, Err(PlexusError::UnknownService { .. })));
    assert!(handler.chunks.is_empty());
    assert!(matches!(
        handler.error,
        Some(PlexusError::UnknownService { .. })
    ));

    // Non-streaming query on a never-created id answers from a transient.
    let result = counter_result(fx.query(&counter_query("c2")).await.unwrap());
    assert!(matches!(result, CounterResult::Get(get) if get.value == 0));

    // The transient never entered the committed set.
    assert!(!fx.manager.contains(&counter_id("c2")));
    let services = metadata_services(fx.query(&ServiceRequest::metadata("")).await.unwrap());
    assert!(services.is_empty());
}

#[tokio::test]
async fn snapshot_round_trip() {
    let mut fx = Fixture::new();
    fx.command(&ServiceRequest::create(counter_id("c1")))
        .await
        .unwrap();
    fx.command(&ServiceRequest::create(counter_id("c2")))
        .await
        .unwrap();
    fx.command(&counter_command("c1", CounterRequest::set(42)))
        .await
        .unwrap();
    fx.command(&counter_command("c2", CounterRequest::set(-7)))
        .await
        .unwrap();

    let snapshot = fx.snapshot();

    let mut restored = Fixture::new();
    restored
        .manager
        .install(&mut Cursor::new(snapshot.clone()))
        .unwrap();

    let result = counter_result(restored.query(&counter_query("c1")).await.unwrap());
    assert!(matches!(result, CounterResult::Get(get) if get.value == 42));
    let result = counter_result(restored.query(&counter_query("c2")).await.unwrap());
    assert!(matches!(result, CounterResult::Get(get) if get.value == -7));

    assert_eq!(restored.snapshot(), snapshot);
}

#[tokio::test]
async fn metadata_filter_and_order() {
    let mut registry = ServiceTypeRegistry::new();
    registry.register(COUNTER_TYPE, CounterService::factory);
    registry.register("map", CounterService::factory);
    let mut fx = Fixture::with_registry(Arc::new(registry));

    // Scrambled insertion order; listings must still come out sorted.
    fx.command(&ServiceRequest::create(counter_id("b")))
        .await
        .unwrap();
    fx.command(&ServiceRequest::create(ServiceId::new("m1", "map")))
        .await
        .unwrap();
    fx.command(&ServiceRequest::create(counter_id("a")))
        .await
        .unwrap();

    let services = metadata_services(
        fx.query(&ServiceRequest::metadata(COUNTER_TYPE))
            .await
            .unwrap(),
    );
    assert_eq!(services, vec![counter_id("a"), counter_id("b")]);

    let services = metadata_services(fx.query(&ServiceRequest::metadata("")).await.unwrap());
    assert_eq!(
        services,
        vec![
            counter_id("a"),
            counter_id("b"),
            ServiceId::new("m1", "map")
        ]
    );
}

#[tokio::test]
async fn streaming_chunks_arrive_in_order() {
    let mut registry = ServiceTypeRegistry::new();
    registry.register("emitter", || {
        Box::new(EmitterService {
            chunks: vec![b"x1".to_vec(), b"x2".to_vec(), b"x3".to_vec()],
            fail_after_first: false,
        }) as Box<dyn PrimitiveService>
    });
    let mut fx = Fixture::with_registry(Arc::new(registry));

    let id = ServiceId::new("e1", "emitter");
    fx.command(&ServiceRequest::create(id.clone()))
        .await
        .unwrap();

    let mut handler = CollectingHandler::default();
    fx.query_stream(&ServiceRequest::query(id, Vec::new()), &mut handler)
        .await
        .unwrap();

    // Each chunk is re-framed as a query response envelope, in order.
    let chunks: Vec<Vec<u8>> = handler
        .chunks
        .iter()
        .map(|bytes| {
            let response: ServiceResponse = codec::decode(bytes).unwrap();
            match response.kind {
                Some(ResponseKind::Query(inner)) => inner,
                other => panic!("expected query response wrapper, got {other:?}"),
            }
        })
        .collect();
    assert_eq!(chunks, vec![b"x1".to_vec(), b"x2".to_vec(), b"x3".to_vec()]);
    assert!(handler.completed);
    assert!(handler.error.is_none());
}

#[tokio::test]
async fn streaming_error_terminal_follows_chunks() {
    let mut registry = ServiceTypeRegistry::new();
    registry.register("emitter", || {
        Box::new(EmitterService {
            chunks: vec![b"x1".to_vec()],
            fail_after_first: true,
        }) as Box<dyn PrimitiveService>
    });
    let mut fx = Fixture::with_registry(Arc::new(registry));

    let id = ServiceId::new("e1", "emitter");
    fx.command(&ServiceRequest::create(id.clone()))
        .await
        .unwrap();

    let mut handler = CollectingHandler::default();
    fx.query_stream(&ServiceRequest::query(id, Vec::new()), &mut handler)
        .await
        .unwrap();

    assert_eq!(handler.chunks.len(), 1);
    assert!(!handler.completed);
    assert!(matches!(handler.error, Some(PlexusError::Service { .. })));
}

// ============================================================================
// Invariants
// ============================================================================

#[tokio::test]
async fn identical_sequences_produce_identical_bytes() {
    let sequence = vec![
        ServiceRequest::create(counter_id("c1")),
        counter_command("c1", CounterRequest::increment(3)),
        counter_command("c2", CounterRequest::set(9)),
        counter_command("c1", CounterRequest::check_and_set(3, 7)),
        ServiceRequest::delete(counter_id("c2")),
        counter_command("c1", CounterRequest::decrement(0)),
    ];

    let mut left = Fixture::new();
    let mut right = Fixture::new();
    for request in &sequence {
        let encoded = codec::encode(request);
        left.context.prepare(left.next_index, OperationKind::Command);
        right
            .context
            .prepare(right.next_index, OperationKind::Command);
        left.next_index += 1;
        right.next_index += 1;

        let a = left.manager.apply_command(&encoded).await.unwrap();
        let b = right.manager.apply_command(&encoded).await.unwrap();
        assert_eq!(a, b);
    }

    assert_eq!(left.snapshot(), right.snapshot());
}

#[tokio::test]
async fn command_to_fresh_id_implicitly_creates() {
    let mut fx = Fixture::new();
    let result = counter_result(
        fx.command(&counter_command("c9", CounterRequest::increment(2)))
            .await
            .unwrap(),
    );
    assert!(matches!(result, CounterResult::Increment(inc) if inc.next_value == 2));
    assert!(fx.manager.contains(&counter_id("c9")));
}

#[tokio::test]
async fn delete_of_absent_id_is_acknowledged() {
    let mut fx = Fixture::new();
    let response = fx
        .command(&ServiceRequest::delete(counter_id("ghost")))
        .await
        .unwrap();
    assert!(matches!(response.kind, Some(ResponseKind::Delete(_))));
    assert_eq!(fx.manager.service_count(), 0);
}

#[tokio::test]
async fn can_delete_is_a_conjunction() {
    let mut registry = ServiceTypeRegistry::new();
    registry.register(COUNTER_TYPE, CounterService::factory);
    registry.register("retentive", || {
        Box::new(RetentiveService { floor: 5 }) as Box<dyn PrimitiveService>
    });
    let mut fx = Fixture::with_registry(Arc::new(registry));

    fx.command(&ServiceRequest::create(counter_id("c1")))
        .await
        .unwrap();
    assert!(fx.manager.can_delete(1));

    fx.command(&ServiceRequest::create(ServiceId::new("r1", "retentive")))
        .await
        .unwrap();
    assert!(!fx.manager.can_delete(4));
    assert!(fx.manager.can_delete(5));
    assert!(fx.manager.can_delete(6));
}

#[tokio::test]
async fn install_with_unregistered_type_is_fatal() {
    let mut registry = ServiceTypeRegistry::new();
    registry.register(COUNTER_TYPE, CounterService::factory);
    registry.register("map", CounterService::factory);
    let mut fx = Fixture::with_registry(Arc::new(registry));
    fx.command(&ServiceRequest::create(ServiceId::new("m1", "map")))
        .await
        .unwrap();
    let snapshot = fx.snapshot();

    let mut restored = Fixture::new();
    let result = restored.manager.install(&mut Cursor::new(snapshot));
    let error = result.unwrap_err();
    assert!(matches!(error, PlexusError::UnknownType { .. }));
    assert!(error.is_fatal());
}

#[tokio::test]
async fn install_replaces_previous_services() {
    let mut source = Fixture::new();
    source
        .command(&counter_command("c1", CounterRequest::set(1)))
        .await
        .unwrap();
    let snapshot = source.snapshot();

    let mut target = Fixture::new();
    target
        .command(&counter_command("d1", CounterRequest::set(2)))
        .await
        .unwrap();

    target
        .manager
        .install(&mut Cursor::new(snapshot))
        .unwrap();
    assert!(target.manager.contains(&counter_id("c1")));
    assert!(!target.manager.contains(&counter_id("d1")));
}

#[tokio::test]
async fn wrong_path_sub_kinds_are_decode_errors() {
    let mut fx = Fixture::new();

    let result = fx.command(&ServiceRequest::metadata("")).await;
    assert!(matches!(result, Err(PlexusError::Decode { .. })));

    let result = fx.query(&ServiceRequest::create(counter_id("c1"))).await;
    assert!(matches!(result, Err(PlexusError::Decode { .. })));

    let result = fx
        .query(&counter_command("c1", CounterRequest::increment(1)))
        .await;
    assert!(matches!(result, Err(PlexusError::Decode { .. })));

    // Nothing was created along the way.
    assert_eq!(fx.manager.service_count(), 0);
}

#[tokio::test]
async fn strict_config_aligns_query_paths() {
    let manager = ServiceManager::with_config(
        counter_registry(),
        ManagerConfig {
            transient_queries: false,
            ..ManagerConfig::default()
        },
    );
    let mut fx = Fixture::with_manager(manager);

    let result = fx.query(&counter_query("absent")).await;
    assert!(matches!(result, Err(PlexusError::UnknownService { .. })));
}

#[tokio::test]
async fn malformed_envelope_leaves_state_unchanged() {
    let mut fx = Fixture::new();
    fx.context.prepare(1, OperationKind::Command);
    let result = fx.manager.apply_command(&[0xff, 0xff, 0xff]).await;
    assert!(matches!(result, Err(PlexusError::Decode { .. })));
    assert_eq!(fx.manager.service_count(), 0);
}

#[tokio::test]
async fn oversized_envelope_is_rejected() {
    let manager = ServiceManager::with_config(
        counter_registry(),
        ManagerConfig {
            max_envelope_bytes: 8,
            ..ManagerConfig::default()
        },
    );
    let mut fx = Fixture::with_manager(manager);

    let request = counter_command("a-rather-long-name", CounterRequest::set(1));
    let result = fx.command(&request).await;
    assert!(matches!(result, Err(PlexusError::Decode { .. })));
}

#[tokio::test]
async fn transient_query_does_not_change_snapshot() {
    let mut fx = Fixture::new();
    fx.command(&counter_command("c1", CounterRequest::set(5)))
        .await
        .unwrap();
    let before = fx.snapshot();

    fx.query(&counter_query("phantom")).await.unwrap();

    assert_eq!(fx.snapshot(), before);
}
