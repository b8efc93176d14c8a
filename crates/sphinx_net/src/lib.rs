//! # Sphinx Networking
//!
//! Network identity and component replication for the Sphinx ECS.
//!
//! ## Architecture
//!
//! - **Identity**: transport connection handles map to small, recycled [`NetId`]s
//! - **Transport**: a polled, message-oriented seam ([`Transport`]); the
//!   in-memory [`LoopbackHub`] implements it for tests and headless runs
//! - **Protocol**: tagged little-endian packets, at most 1200 bytes each
//! - **Replication**: dirty component fields travel as [`EcsReplicate`] diffs
//!   addressed by stable entity reference
//! - **Authority**: the server is the writer of record; client writes are
//!   provisional and accepted only for the client's own player entity
//!
//! ## Tick Flow
//!
//! ```text
//! CLIENT                                  SERVER
//!   | mutate(player, set_position)          |
//!   |--- EcsReplicate(player, position) --->| owner check, apply
//!   |                                       |--- EcsReplicate ---> other clients
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use sphinx_core::{CoordinateTransform, World};
//! use sphinx_net::{ClientSession, LoopbackHub, NetConfig, ServerSession};
//!
//! let hub = LoopbackHub::new(0);
//! let mut server = ServerSession::new(hub.listen(), &NetConfig::default(), World::new());
//!
//! let mut world = World::new();
//! world.register::<CoordinateTransform>();
//! let mut client = ClientSession::new(hub.connect()?, &NetConfig::client(), world);
//!
//! for _ in 0..3 {
//!     server.update(Duration::from_millis(16))?;
//!     client.update(Duration::from_millis(16))?;
//! }
//! assert!(client.local_player().is_some());
//! # Ok::<(), sphinx_net::NetError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod interface;
pub mod protocol;
pub mod replication;
pub mod session;
pub mod transport;

pub use config::{NetConfig, NetRole};
pub use error::{NetError, NetResult};
pub use events::{EventChannel, NetworkEvent};
pub use identity::{ConnectionHandle, ConnectionState, NetId, NetIdTable, PeerStatus};
pub use interface::NetworkInterface;
pub use protocol::{EcsReplicate, FieldUpdate, Packet, PacketType};
pub use replication::{apply_replicate, full_state, ApplyReport, ReplicationQueue};
pub use session::{ClientSession, ServerSession};
pub use transport::{LinkConditions, LoopbackHub, LoopbackTransport, Transport, TransportEvent};
