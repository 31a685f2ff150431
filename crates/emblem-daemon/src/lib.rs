//! Emblem status daemon
//!
//! Hosts a [`StatusMonitor`] behind a newline-delimited JSON-RPC socket so
//! file-manager extensions can query working-copy statuses and receive
//! change events.

pub mod lifecycle;
pub mod monitor;
pub mod protocol;
pub mod rpc_helpers;
pub mod server;

#[cfg(test)]
mod test_support;

pub use lifecycle::{pid_path, socket_path, DaemonPaths};
pub use monitor::{CheckResult, MonitorEvent, MonitorStats, StatusMonitor};
pub use protocol::{EventMessage, Request, RequestId, Response, RpcError};
pub use server::Server;
