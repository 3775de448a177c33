//! Envelope wire format.
//!
//! Requests and responses cross the consensus boundary as length-delimited,
//! schema-encoded records. This module contains:
//! - [`proto`] - Envelope message types (hand-rolled prost)
//! - [`codec`] - Stateless encode/decode and delimited framing helpers

pub mod codec;
pub mod proto;
