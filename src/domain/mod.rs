//! Domain layer types and invariants.

pub mod designs;
pub mod error;
pub mod ids;
