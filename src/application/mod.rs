//! Application services layer.

pub mod designs;
pub mod error;
pub mod layers;
pub mod repos;
