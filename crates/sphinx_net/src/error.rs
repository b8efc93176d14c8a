//! # Network Error Types

use thiserror::Error;

use sphinx_core::{EcsError, StableEntityRef};

use crate::identity::{ConnectionHandle, NetId};

/// Errors that can occur in the network layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// No live entity carries this network reference.
    #[error("unknown entity reference: {0}")]
    UnknownEntity(StableEntityRef),

    /// No live connection maps to this netId.
    #[error("invalid net id: {0}")]
    InvalidNetId(NetId),

    /// The connection handle is unknown or not established.
    #[error("invalid connection: {0}")]
    InvalidConnection(ConnectionHandle),

    /// Every assignable netId is taken.
    #[error("net ids exhausted")]
    NetIdsExhausted,

    /// Packet bytes do not follow the wire layout.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// Unrecognised packet type tag.
    #[error("unknown packet type: {0:#04x}")]
    UnknownPacketType(u8),

    /// Encoded packet exceeds the transport's datagram size.
    #[error("packet too large: {size} bytes, max {max}")]
    PacketTooLarge {
        /// Encoded size.
        size: usize,
        /// Maximum size.
        max: usize,
    },

    /// The transport refused an operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Entity/component error.
    #[error(transparent)]
    Ecs(#[from] EcsError),
}

/// Result type for network operations.
pub type NetResult<T> = Result<T, NetError>;
