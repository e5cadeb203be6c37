//! Composition-root crate: configuration, command routing and the
//! monitoring endpoint. The binary in `main.rs` wires these against the
//! real transports.

pub mod commands;
pub mod config;
pub mod coordinator;
pub mod http;
