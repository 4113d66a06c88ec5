//! Framed JSON-RPC 2.0 endpoint for external language servers
//!
//! Spawns a server process, frames messages with the LSP base protocol,
//! and correlates asynchronous responses with registered callbacks
//! through a bounded pending-request table.

pub mod framing;
pub mod pending;

mod capabilities;
mod endpoint;

pub use capabilities::default_capabilities;
pub use endpoint::{IdPolicy, InitializeRequest, RpcEndpoint, RpcError, RpcHandle};
pub use pending::{ResponseCallback, MAX_IN_FLIGHT};
