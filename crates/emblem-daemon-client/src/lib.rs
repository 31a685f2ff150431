//! Client library for connecting to the Emblem daemon
//!
//! Requests are newline-delimited JSON-RPC over the daemon's Unix socket.
//! Events pushed by the daemon (`WatchAdded`, `StatusChanged`,
//! `StatusChecked`) are delivered through an unbounded channel when the
//! client is created with [`DaemonClient::connect_to_with_events`].

mod client;

pub use client::{CheckStatusReply, DaemonClient, DaemonEvent};

// Re-exports from emblem-daemon for convenience
pub use emblem_daemon::{socket_path, DaemonPaths};
