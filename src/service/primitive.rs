//! The contract every hosted primitive implements.

use crate::core::context::InstanceContext;
use crate::core::error::{PlexusError, PlexusResult};
use async_trait::async_trait;
use std::io::{BufRead, Write};

/// Sink for streaming responses.
///
/// Chunks are delivered in the exact order `next` is called, followed by
/// exactly one terminal: `complete` or `error`. The manager wraps the outer
/// handler so every chunk is re-framed as a response envelope before
/// forwarding; terminals pass through unchanged.
pub trait StreamHandler: Send {
    /// Deliver one response chunk.
    fn next(&mut self, chunk: Vec<u8>);

    /// Signal successful end of stream.
    fn complete(&mut self);

    /// Signal failed end of stream.
    fn error(&mut self, error: PlexusError);
}

/// An independent replicated primitive (counter, map, lock, ...).
///
/// Implementations MUST be deterministic: for identical operation sequences
/// starting from identical snapshots, every replica must produce
/// byte-identical responses and byte-identical snapshots. No wall-clock
/// reads, no randomness, no iteration over unordered collections.
///
/// # Streaming terminal discipline
///
/// A streaming method either drives the handler to exactly one terminal and
/// returns `Ok`, or returns `Err` without touching the handler; in the
/// latter case the manager emits the `error` terminal on the service's
/// behalf. Never both.
#[async_trait]
pub trait PrimitiveService: Send + Sync {
    /// Called once when the instance is bound to its identity, before any
    /// apply. The same context handle is passed to every subsequent call.
    fn init(&mut self, ctx: &InstanceContext) {
        let _ = ctx;
    }

    /// Apply a mutating operation and return the response bytes.
    async fn apply_command(
        &mut self,
        ctx: &InstanceContext,
        payload: &[u8],
    ) -> PlexusResult<Vec<u8>>;

    /// Apply a mutating operation, emitting zero or more response chunks.
    async fn apply_command_stream(
        &mut self,
        ctx: &InstanceContext,
        payload: &[u8],
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        let _ = (ctx, payload, handler);
        Err(PlexusError::service("streaming commands not supported"))
    }

    /// Apply a non-mutating operation and return the response bytes.
    ///
    /// Must not alter any state visible to a subsequent snapshot.
    async fn apply_query(&self, ctx: &InstanceContext, payload: &[u8]) -> PlexusResult<Vec<u8>>;

    /// Apply a non-mutating operation, emitting zero or more response chunks.
    async fn apply_query_stream(
        &self,
        ctx: &InstanceContext,
        payload: &[u8],
        handler: &mut dyn StreamHandler,
    ) -> PlexusResult<()> {
        let _ = (ctx, payload, handler);
        Err(PlexusError::service("streaming queries not supported"))
    }

    /// Write a serialized representation of the current state.
    ///
    /// The payload must be self-delimiting (or length-framed at the
    /// service's own layer) so that [`PrimitiveService::restore`] consumes
    /// exactly the bytes this call produced.
    fn snapshot(&self, output: &mut dyn Write) -> PlexusResult<()>;

    /// Replace all state from a previously written snapshot, leaving the
    /// stream positioned at the first byte after this service's payload.
    fn restore(&mut self, input: &mut dyn BufRead) -> PlexusResult<()>;

    /// Whether all state up to and including `index` is no longer needed.
    ///
    /// Once true for `i`, must remain true for all `j >= i` unless new state
    /// at `j` is produced.
    fn can_delete(&self, index: u64) -> bool {
        let _ = index;
        true
    }
}
