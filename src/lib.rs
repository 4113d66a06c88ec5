//! lspjump - jump-to-definition client for LSP language servers
//!
//! This crate provides:
//! - A framed JSON-RPC 2.0 endpoint over a spawned language server's stdio
//! - Callback-correlated request dispatch with a bounded pending table
//! - Per-language server configuration and a session cache

pub mod config;
pub mod locations;
pub mod rpc;
pub mod session;

pub use config::{Config, ConfigError, ServerConfig};
pub use locations::{format_location, locations_from_response, path_to_uri};
pub use rpc::{
    IdPolicy, InitializeRequest, ResponseCallback, RpcEndpoint, RpcError, RpcHandle,
};
pub use session::{Session, SessionError};
