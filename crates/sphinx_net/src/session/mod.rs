//! # Sessions
//!
//! A session couples a [`NetworkInterface`](crate::NetworkInterface) with a
//! [`World`](sphinx_core::World) and runs the replication protocol between
//! them, one `update` per tick:
//!
//! 1. poll the transport and react to joins and leaves
//! 2. apply received packets
//! 3. release component slots of destroyed entities
//! 4. flush queued spawns, field diffs and despawns
//!
//! The server is the writer of record. It mirrors every networked entity to
//! every client and accepts client diffs only for the player entity bound
//! to that client's netId.

mod client;
mod server;

pub use client::ClientSession;
pub use server::ServerSession;
