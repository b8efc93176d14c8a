//! # Engine Constants
//!
//! Values baked into both the client and the server binary.
//! Changing any of these requires both sides to be rebuilt.

// =============================================================================
// NETWORK CONFIGURATION
// =============================================================================

/// Default port the dedicated server listens on.
pub const DEFAULT_PORT: u16 = 7777;

/// Simulation ticks per second.
pub const TICK_RATE: u32 = 60;

/// Maximum simultaneously established connections on a server.
pub const MAX_CONNECTIONS: usize = 64;

/// Maximum size of one encoded packet (MTU-safe).
pub const MAX_PACKET_SIZE: usize = 1200;

// =============================================================================
// ECS CONFIGURATION
// =============================================================================

/// Capacity of the entity pool. Identifiers are always below this value.
pub const MAX_ENTITY_COUNT: usize = 1024;

// =============================================================================
// WORLD CONFIGURATION
// =============================================================================

/// Edge length of a voxel chunk, in blocks.
pub const CHUNK_SIZE: i32 = 16;
