//! Deterministic execution context.
//!
//! Every apply observes three values supplied by the consensus layer: the
//! current log index, the current deterministic tick, and whether the
//! operation is a command or a query. No other time source is permitted
//! inside hosted services; wall-clock reads would break replica determinism.

use crate::wire::proto::ServiceId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// A deterministic tick representing log-committed time.
///
/// Ticks are the sole source of time visible to hosted services. They are
/// assigned by the consensus layer when entries commit, never sampled from
/// the local clock during apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tick {
    /// Milliseconds since an epoch (implementation-defined).
    pub ms: u64,
}

impl Tick {
    /// Create a new tick with the given millisecond value.
    pub const fn new(ms: u64) -> Self {
        Self { ms }
    }

    /// Create a tick representing zero (epoch start).
    pub const fn zero() -> Self {
        Self { ms: 0 }
    }

    /// Add milliseconds to this tick.
    pub const fn add_ms(self, ms: u64) -> Self {
        Self { ms: self.ms + ms }
    }

    /// Check if this tick is at or after the given deadline.
    pub const fn is_at_or_after(self, deadline: Tick) -> bool {
        self.ms >= deadline.ms
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tick({}ms)", self.ms)
    }
}

/// Classification of the operation currently being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// A mutating log entry.
    Command,
    /// A non-mutating read.
    Query,
}

impl OperationKind {
    fn as_u8(self) -> u8 {
        match self {
            Self::Command => 0,
            Self::Query => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Command,
            _ => Self::Query,
        }
    }
}

/// Shared execution context supplied by the consensus layer.
///
/// The consensus layer owns one `Arc<Context>` per state machine and calls
/// [`Context::prepare`] before delivering each operation. The manager and
/// every hosted service only read. Under the single-threaded apply loop there
/// is never a concurrent writer, so plain atomic loads are sufficient for the
/// read side.
#[derive(Debug)]
pub struct Context {
    /// Current log index.
    index: AtomicU64,

    /// Current deterministic tick in milliseconds.
    tick_ms: AtomicU64,

    /// Current operation kind (see [`OperationKind`]).
    kind: AtomicU8,
}

impl Context {
    /// Create a fresh context at index 0, tick 0, command kind.
    pub fn new() -> Self {
        Self {
            index: AtomicU64::new(0),
            tick_ms: AtomicU64::new(0),
            kind: AtomicU8::new(OperationKind::Command.as_u8()),
        }
    }

    /// Create a fresh shared context handle.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Position the context for the next operation.
    ///
    /// Called by the consensus layer before each apply. The index MUST be
    /// monotonically nondecreasing across apply calls.
    pub fn prepare(&self, index: u64, kind: OperationKind) {
        debug_assert!(
            index >= self.index.load(Ordering::Acquire),
            "APPLY-ORDER violation: index {} < {}",
            index,
            self.index.load(Ordering::Acquire)
        );
        self.index.store(index, Ordering::Release);
        self.kind.store(kind.as_u8(), Ordering::Release);
    }

    /// Advance the deterministic tick.
    pub fn set_tick(&self, tick: Tick) {
        self.tick_ms.store(tick.ms, Ordering::Release);
    }

    /// Get the current log index.
    pub fn current_index(&self) -> u64 {
        self.index.load(Ordering::Acquire)
    }

    /// Get the current deterministic tick.
    pub fn current_tick(&self) -> Tick {
        Tick::new(self.tick_ms.load(Ordering::Acquire))
    }

    /// Get the kind of the operation currently being applied.
    pub fn operation_kind(&self) -> OperationKind {
        OperationKind::from_u8(self.kind.load(Ordering::Acquire))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-instance view of the execution context.
///
/// Binds one service identity to the shared context. This is the read-only
/// handle every primitive receives in `init` and each apply call.
#[derive(Debug, Clone)]
pub struct InstanceContext {
    id: ServiceId,
    shared: Arc<Context>,
}

impl InstanceContext {
    /// Create a context view for the given identity.
    pub fn new(id: ServiceId, shared: Arc<Context>) -> Self {
        Self { id, shared }
    }

    /// The service identity.
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// The service name.
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// The service type tag.
    pub fn service_type(&self) -> &str {
        &self.id.service_type
    }

    /// The current log index.
    pub fn current_index(&self) -> u64 {
        self.shared.current_index()
    }

    /// The current deterministic tick.
    pub fn current_tick(&self) -> Tick {
        self.shared.current_tick()
    }

    /// The kind of the operation currently being applied.
    pub fn operation_kind(&self) -> OperationKind {
        self.shared.operation_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prepare_and_read() {
        let ctx = Context::new();
        assert_eq!(ctx.current_index(), 0);
        assert_eq!(ctx.operation_kind(), OperationKind::Command);

        ctx.prepare(7, OperationKind::Query);
        assert_eq!(ctx.current_index(), 7);
        assert_eq!(ctx.operation_kind(), OperationKind::Query);
    }

    #[test]
    fn context_tick_advances() {
        let ctx = Context::new();
        assert_eq!(ctx.current_tick(), Tick::zero());

        ctx.set_tick(Tick::new(1500));
        assert_eq!(ctx.current_tick(), Tick::new(1500));
        assert!(ctx.current_tick().is_at_or_after(Tick::new(1000)));
    }

    #[test]
    fn instance_context_exposes_identity() {
        let id = ServiceId::new("c1", "counter");
        let ctx = InstanceContext::new(id.clone(), Context::shared());
        assert_eq!(ctx.name(), "c1");
        assert_eq!(ctx.service_type(), "counter");
        assert_eq!(ctx.id(), &id);
    }
}
