//! Periscope collector library.
//!
//! Receives published probe reports over HTTP, merges them into an
//! in-memory store, and renders per-node detail views for querying clients.

pub mod config;
pub mod http;
pub mod render;
pub mod store;
