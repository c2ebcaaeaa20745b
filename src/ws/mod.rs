//! WebSocket layer: upgrade handler, connection pump, wire envelope.
//!
//! The endpoint at `/ws` carries JSON envelopes in text frames in both
//! directions. Each connection becomes one participant in the registry.

pub mod connection;
pub mod handler;
pub mod messages;
