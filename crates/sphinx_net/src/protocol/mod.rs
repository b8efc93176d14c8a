//! # Network Protocol
//!
//! Binary packet definitions.
//!
//! ## Packet Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Type tag (1 byte)                                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Body (variable, little-endian, whole packet <= 1200 bytes)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Philosophy
//!
//! - One packet per datagram; the decoder rejects trailing bytes
//! - Field payloads are raw component bytes with an explicit length
//! - No reliability layer: every packet is at-most-once

mod codec;
mod packets;

pub use codec::{PacketReader, PacketWriter};
pub use packets::{EcsReplicate, FieldUpdate, Packet, PacketType, FIELD_HEADER_LEN, REPLICATE_HEADER_LEN};
