//! Reference primitives.
//!
//! The concrete primitive library lives with its users; this module carries
//! the reference implementation demonstrating the contract every hosted
//! service must satisfy:
//! - [`counter`] - Replicated atomic counter

pub mod counter;
