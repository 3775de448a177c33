//! The multiplexer: routes envelopes across hosted service instances.
//!
//! The manager is driven by the consensus layer's single-threaded apply
//! loop: operations arrive one at a time in log order, and the caller awaits
//! each returned future before delivering the next operation. That
//! discipline, not anything in this file, is the source of determinism; the
//! manager's own code never suspends and never blocks.
//!
//! Cancellation is inherited from the futures model: dropping an in-flight
//! apply future abandons the service call at its next suspension point.
//! State already mutated is never rolled back; the log is the source of
//! truth and a replacement leader will re-replay.

use crate::core::config::ManagerConfig;
use crate::core::context::Context;
use crate::core::error::{PlexusError, PlexusResult};
use crate::service::instance::ServiceInstance;
use crate::service::primitive::StreamHandler;
use crate::service::registry::ServiceTypeRegistry;
use crate::wire::codec;
use crate::wire::proto::{RequestKind, ServiceId, ServiceRequest, ServiceResponse};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

/// The replicated state-machine multiplexer.
///
/// Owns the live set of service instances, routes every inbound envelope,
/// handles create/delete/metadata inline, and aggregates snapshot/restore
/// and log truncation consent across all instances.
pub struct ServiceManager {
    config: ManagerConfig,
    registry: Arc<ServiceTypeRegistry>,
    services: BTreeMap<ServiceId, ServiceInstance>,
    context: Arc<Context>,
}

impl ServiceManager {
    /// Create a manager with the default configuration.
    pub fn new(registry: Arc<ServiceTypeRegistry>) -> Self {
        Self::with_config(registry, ManagerConfig::default())
    }

    /// Create a manager with an explicit configuration.
    pub fn with_config(registry: Arc<ServiceTypeRegistry>, config: ManagerConfig) -> Self {
        Self {
            config,
            registry,
            services: BTreeMap::new(),
            context: Context::shared(),
        }
    }

    /// Install the consensus layer's shared execution context.
    ///
    /// Called once before any apply. Instances capture the context handle at
    /// creation, so installing it later would leave earlier instances
    /// reading a stale handle.
    pub fn init(&mut self, context: Arc<Context>) {
        self.context = context;
    }

    /// The manager's configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Whether a service with the given identity is currently hosted.
    pub fn contains(&self, id: &ServiceId) -> bool {
        self.services.contains_key(id)
    }

    /// Number of hosted service instances.
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Apply a mutating envelope and return the response envelope bytes.
    ///
    /// A command addressed to an absent id implicitly creates the instance,
    /// mirroring the explicit create envelope. Delete never creates.
    pub async fn apply_command(&mut self, bytes: &[u8]) -> PlexusResult<Vec<u8>> {
        let request = self.decode_envelope(bytes)?;
        let kind = request
            .kind
            .ok_or_else(|| PlexusError::decode("request envelope missing kind"))?;

        match kind {
            RequestKind::Create(_) => {
                let id = require_id(request.id)?;
                self.ensure_instance(&id)?;
                Ok(codec::encode(&ServiceResponse::create()))
            }
            RequestKind::Delete(_) => {
                let id = require_id(request.id)?;
                if self.services.remove(&id).is_some() {
                    tracing::debug!(service = %id, "service instance deleted");
                }
                Ok(codec::encode(&ServiceResponse::delete()))
            }
            RequestKind::Command(payload) => {
                let id = require_id(request.id)?;
                let instance = self.ensure_instance(&id)?;
                let response = instance.apply_command(&payload).await?;
                Ok(codec::encode(&ServiceResponse::command(response)))
            }
            RequestKind::Query(_) | RequestKind::Metadata(_) => {
                Err(PlexusError::decode("query sub-kind on the command path"))
            }
        }
    }

    /// Apply a mutating envelope, streaming response chunks to `handler`.
    ///
    /// Every chunk the service emits is re-framed as a command response
    /// envelope in emission order; terminals pass through unchanged. Failures
    /// before the service takes over the handler are reported through both
    /// the handler's `error` terminal and the returned future.
    pub async fn apply_command_stream(
        &mut self,
        bytes: &[u8],
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        match self.route_command_stream(bytes, &mut *handler).await {
            Ok(()) => Ok(()),
            Err(error) => {
                handler.error(error.clone());
                Err(error)
            }
        }
    }

    async fn route_command_stream(
        &mut self,
        bytes: &[u8],
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        let request = self.decode_envelope(bytes)?;
        let kind = request
            .kind
            .ok_or_else(|| PlexusError::decode("request envelope missing kind"))?;
        let RequestKind::Command(payload) = kind else {
            return Err(PlexusError::decode(
                "streaming command path accepts only the command sub-kind",
            ));
        };
        let id = require_id(request.id)?;
        let instance = self.ensure_instance(&id)?;
        let mut stream = ResponseStream {
            inner: handler,
            kind: StreamKind::Command,
        };
        instance.apply_command_stream(&payload, &mut stream).await
    }

    /// Apply a non-mutating envelope and return the response envelope bytes.
    ///
    /// Metadata requests are answered inline with the sorted service
    /// listing. A query addressed to an absent id is answered from a
    /// discarded transient instance in its initial state when
    /// [`ManagerConfig::transient_queries`] allows it.
    pub async fn apply_query(&self, bytes: &[u8]) -> PlexusResult<Vec<u8>> {
        let request = self.decode_envelope(bytes)?;
        let kind = request
            .kind
            .ok_or_else(|| PlexusError::decode("request envelope missing kind"))?;

        match kind {
            RequestKind::Metadata(filter) => {
                let services = self.list_services(&filter.service_type);
                Ok(codec::encode(&ServiceResponse::metadata(services)))
            }
            RequestKind::Query(payload) => {
                let id = require_id(request.id)?;
                match self.services.get(&id) {
                    Some(instance) => {
                        let response = instance.apply_query(&payload).await?;
                        Ok(codec::encode(&ServiceResponse::query(response)))
                    }
                    None if self.config.transient_queries => {
                        // The transient never enters the committed set.
                        let transient =
                            Self::build_instance(&self.registry, &self.context, &id)?;
                        let response = transient.apply_query(&payload).await?;
                        Ok(codec::encode(&ServiceResponse::query(response)))
                    }
                    None => Err(PlexusError::unknown_service(id.name, id.service_type)),
                }
            }
            RequestKind::Create(_) | RequestKind::Delete(_) | RequestKind::Command(_) => {
                Err(PlexusError::decode("command sub-kind on the query path"))
            }
        }
    }

    /// Apply a non-mutating envelope, streaming response chunks to `handler`.
    ///
    /// Unlike the non-streaming query path, an absent id always fails with
    /// `UnknownService`: implicit creation during a streaming call could
    /// leak a partially initialized instance into the committed set.
    pub async fn apply_query_stream(
        &self,
        bytes: &[u8],
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        match self.route_query_stream(bytes, &mut *handler).await {
            Ok(()) => Ok(()),
            Err(error) => {
                handler.error(error.clone());
                Err(error)
            }
        }
    }

    async fn route_query_stream(
        &self,
        bytes: &[u8],
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        let request = self.decode_envelope(bytes)?;
        let kind = request
            .kind
            .ok_or_else(|| PlexusError::decode("request envelope missing kind"))?;
        let RequestKind::Query(payload) = kind else {
            return Err(PlexusError::decode(
                "streaming query path accepts only the query sub-kind",
            ));
        };
        let id = require_id(request.id)?;
        let instance = self
            .services
            .get(&id)
            .ok_or_else(|| PlexusError::unknown_service(id.name.clone(), id.service_type.clone()))?;
        let mut stream = ResponseStream {
            inner: handler,
            kind: StreamKind::Query,
        };
        instance.apply_query_stream(&payload, &mut stream).await
    }

    /// Serialize every hosted service into one ordered byte stream.
    ///
    /// Layout: for each service in `(type, name)` order, one length-delimited
    /// `ServiceId` record followed by the service's own snapshot payload.
    pub fn snapshot(&self, output: &mut dyn Write) -> PlexusResult<()> {
        for (id, instance) in &self.services {
            codec::write_delimited(id, output)?;
            instance.snapshot(output)?;
        }
        Ok(())
    }

    /// Replace the entire service set from a snapshot stream.
    ///
    /// After install, the manager's next snapshot is byte-equal to the
    /// stream it was restored from.
    pub fn install(&mut self, input: &mut dyn BufRead) -> PlexusResult<()> {
        self.services.clear();
        while codec::has_remaining(input)? {
            let id: ServiceId = codec::read_delimited(input)?;
            let mut instance = Self::build_instance(&self.registry, &self.context, &id)?;
            instance.restore(input)?;
            self.services.insert(id, instance);
        }
        tracing::info!(services = self.services.len(), "installed snapshot");
        Ok(())
    }

    /// Whether every hosted service consents to truncating the log at `index`.
    ///
    /// A single instance withholding consent blocks truncation.
    pub fn can_delete(&self, index: u64) -> bool {
        self.services
            .values()
            .all(|instance| instance.can_delete(index))
    }

    fn decode_envelope(&self, bytes: &[u8]) -> PlexusResult<ServiceRequest> {
        if bytes.len() > self.config.max_envelope_bytes {
            return Err(PlexusError::decode(format!(
                "envelope of {} bytes exceeds limit of {}",
                bytes.len(),
                self.config.max_envelope_bytes
            )));
        }
        codec::decode(bytes)
    }

    fn list_services(&self, type_filter: &str) -> Vec<ServiceId> {
        self.services
            .keys()
            .filter(|id| type_filter.is_empty() || id.service_type == type_filter)
            .cloned()
            .collect()
    }

    fn ensure_instance(&mut self, id: &ServiceId) -> PlexusResult<&mut ServiceInstance> {
        let Self {
            registry,
            services,
            context,
            ..
        } = self;
        match services.entry(id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let instance = Self::build_instance(registry, context, id)?;
                Ok(entry.insert(instance))
            }
        }
    }

    fn build_instance(
        registry: &ServiceTypeRegistry,
        context: &Arc<Context>,
        id: &ServiceId,
    ) -> PlexusResult<ServiceInstance> {
        let factory = registry
            .get(&id.service_type)
            .ok_or_else(|| PlexusError::unknown_type(id.service_type.clone()))?;
        Ok(ServiceInstance::new(id.clone(), factory(), context.clone()))
    }
}

impl std::fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceManager")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn require_id(id: Option<ServiceId>) -> PlexusResult<ServiceId> {
    id.ok_or_else(|| PlexusError::decode("request envelope missing service id"))
}

/// Which response envelope variant wraps streamed chunks.
#[derive(Clone, Copy)]
enum StreamKind {
    Command,
    Query,
}

/// Re-frames each emitted chunk as a response envelope before forwarding.
struct ResponseStream<'a> {
    inner: &'a mut dyn StreamHandler,
    kind: StreamKind,
}

impl StreamHandler for ResponseStream<'_> {
    fn next(&mut self, chunk: Vec<u8>) {
        let response = match self.kind {
            StreamKind::Command => ServiceResponse::command(chunk),
            StreamKind::Query => ServiceResponse::query(chunk),
        };
        self.inner.next(codec::encode(&response));
    }

    fn complete(&mut self) {
        self.inner.complete();
    }

    fn error(&mut self, error: PlexusError) {
        self.inner.error(error);
    }
}
