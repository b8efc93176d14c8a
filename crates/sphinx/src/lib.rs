//! # Sphinx
//!
//! Networked entity-component core of a multiplayer voxel engine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         SPHINX                               │
//! ├──────────────────────────────────────────────────────────────┤
//! │  sphinx_net     NetId table · transport · EcsReplicate       │
//! │       │                                                      │
//! │  sphinx_core    ObjectPool · EntityManager · registry        │
//! │       │                                                      │
//! │  sphinx_shared  Vec3 · Quaternion · voxel Coordinate         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `game_loop`: fixed-rate tick driver for sessions

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod game_loop;

pub use sphinx_core as core;
pub use sphinx_net as net;
pub use sphinx_shared as shared;

pub use game_loop::{TickContext, TickLoop, TickStats};
