//! Plexus - Deterministic multiplexer for replicated primitive state machines.
//!
//! Plexus hosts many independent primitive state machines (counters, maps,
//! locks, ...) behind a single replicated log. A consensus layer feeds it an
//! ordered stream of commands and queries carrying opaque bytes; Plexus routes
//! them to per-primitive service instances, returns opaque bytes back, and
//! supports full snapshot/restore so a follower or recovering replica can
//! reconstruct identical state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Consensus Layer                          │
//! │        ordered log │ commit indices │ snapshot transfer         │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Service Manager                          │
//! │    envelope decode │ routing │ lifecycle │ snapshot/install     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Service Instances                         │
//! │        counter │ map (pluggable) │ lock (pluggable) │ ...       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Manager configuration and validation
//! - [`core::context`] - Deterministic log index, tick, and operation kind
//! - [`core::error`] - Error taxonomy and result alias
//!
//! ## Wire
//! - [`wire::proto`] - Envelope message types (hand-rolled prost)
//! - [`wire::codec`] - Length-delimited encode/decode helpers
//!
//! ## Service
//! - [`service::primitive`] - Primitive service contract and stream handler
//! - [`service::registry`] - Service type registry
//! - [`service::instance`] - Service instance wrapper
//! - [`service::manager`] - The multiplexer itself
//!
//! ## Primitives
//! - [`primitives::counter`] - Reference atomic counter primitive
//!
//! ## Client
//! - [`client`] - Thin typed clients over a transport trait
//!
//! # Key Invariants
//!
//! - **DETERMINISM**: identical command sequences from identical snapshots
//!   produce byte-identical responses and snapshots on every replica
//! - **APPLY-ORDER**: commands are applied one at a time in log order; the
//!   manager never has two commands in flight
//! - **SNAP-ORDER**: snapshot iteration is sorted by `(type, name)` so
//!   snapshot bytes are stable across replicas
//! - **LOG-TRUNCATE**: log entries up to an index may be discarded only when
//!   every hosted service consents via `can_delete`

// Core infrastructure
pub mod core;

// Envelope wire format
pub mod wire;

// Service contract, registry, and the multiplexer
pub mod service;

// Reference primitives
pub mod primitives;

// Thin typed clients
pub mod client;

// Re-exports for convenience
pub use self::core::{config, context, error};
pub use service::{instance, manager, primitive, registry};
pub use wire::{codec, proto};
