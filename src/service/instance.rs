//! Service instance wrapper.

use crate::core::context::{Context, InstanceContext};
use crate::core::error::PlexusResult;
use crate::service::primitive::{PrimitiveService, StreamHandler};
use crate::wire::proto::ServiceId;
use std::io::{BufRead, Write};
use std::sync::Arc;

/// One live primitive bound to its identity and execution context.
///
/// The manager exclusively owns every instance; delete drops the owning slot
/// and the primitive is finalized with it. Under the single-threaded apply
/// loop no future can still reference a dropped instance.
pub struct ServiceInstance {
    context: InstanceContext,
    service: Box<dyn PrimitiveService>,
}

impl ServiceInstance {
    /// Bind a primitive to its identity and initialize it.
    ///
    /// This is the single construction path for both apply-time and
    /// restore-time creation, so `init` runs in both cases.
    pub fn new(id: ServiceId, mut service: Box<dyn PrimitiveService>, shared: Arc<Context>) -> Self {
        let context = InstanceContext::new(id, shared);
        service.init(&context);
        tracing::debug!(service = %context.id(), "service instance created");
        Self { context, service }
    }

    /// The identity of this instance.
    pub fn id(&self) -> &ServiceId {
        self.context.id()
    }

    /// Forward a mutating operation to the primitive.
    pub async fn apply_command(&mut self, payload: &[u8]) -> PlexusResult<Vec<u8>> {
        self.service.apply_command(&self.context, payload).await
    }

    /// Forward a mutating streaming operation to the primitive.
    pub async fn apply_command_stream(
        &mut self,
        payload: &[u8],
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        self.service
            .apply_command_stream(&self.context, payload, handler)
            .await
    }

    /// Forward a non-mutating operation to the primitive.
    pub async fn apply_query(&self, payload: &[u8]) -> PlexusResult<Vec<u8>> {
        self.service.apply_query(&self.context, payload).await
    }

    /// Forward a non-mutating streaming operation to the primitive.
    pub async fn apply_query_stream(
        &self,
        payload: &[u8],
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        self.service
            .apply_query_stream(&self.context, payload, handler)
            .await
    }

    /// Write the primitive's snapshot payload.
    pub fn snapshot(&self, output: &mut dyn Write) -> PlexusResult<()> {
        self.service.snapshot(output)
    }

    /// Replace the primitive's state from a snapshot stream.
    pub fn restore(&mut self, input: &mut dyn BufRead) -> PlexusResult<()> {
        self.service.restore(input)
    }

    /// Whether the primitive consents to truncating the log at `index`.
    pub fn can_delete(&self, index: u64) -> bool {
        self.service.can_delete(index)
    }
}

impl std::fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("id", self.context.id())
            .finish()
    }
}
