//! Core Server Framework Module
//!
//! - config.rs: startup configuration (flags and environment)
//! - credential.rs: credential gate run before every tool call
//! - error.rs: tool and server error types
//! - server.rs: JSON-RPC types, tool registry and request dispatcher
//! - transport.rs: stdio and REST transports

pub mod config;
pub mod credential;
pub mod error;
pub mod server;
pub mod transport;
