//! Shieldforge: same-origin backend for the layered shield editor.
//!
//! Designs and their layer records live in a remote table store, layer PNGs
//! in a remote blob store. This crate proxies both for the browser and keeps
//! a process-local layer cache coherent with every save and delete.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
