//! # Sphinx Shared
//!
//! Common types used by both client and server.
//!
//! Everything in here is plain data. Replicated component fields are built out of
//! these types, so they must stay `Pod` and keep their layout stable across builds.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{
    CHUNK_SIZE, DEFAULT_PORT, MAX_CONNECTIONS, MAX_ENTITY_COUNT, MAX_PACKET_SIZE, TICK_RATE,
};
pub use math::{Coordinate, Quaternion, Vec3, Vec3Int};
