//! Command surface used by front ends.
//!
//! Versioned modules (currently `v1`) keep the interface stable while the
//! internals move.

pub mod v1;
