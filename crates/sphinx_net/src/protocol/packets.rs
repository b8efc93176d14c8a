//! # Packet Definitions
//!
//! Every packet is a one-byte [`PacketType`] tag followed by its body.
//! Entities are always named by [`StableEntityRef`], never by a local id.

use sphinx_core::{ComponentTypeId, FieldId, StableEntityRef};

use super::codec::{PacketReader, PacketWriter};
use crate::error::{NetError, NetResult};
use crate::identity::{NetId, PeerStatus};

/// Packet type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Server -> Client: your netId.
    NetIdAssigned = 1,
    /// Server -> Client: a peer's status changed.
    PeerStatus = 2,
    /// Server -> Client: create a mirrored entity.
    EntitySpawn = 3,
    /// Server -> Client: destroy a mirrored entity.
    EntityDespawn = 4,
    /// Bidirectional: component field diff.
    EcsReplicate = 5,
}

impl TryFrom<u8> for PacketType {
    type Error = NetError;

    fn try_from(tag: u8) -> NetResult<Self> {
        match tag {
            1 => Ok(Self::NetIdAssigned),
            2 => Ok(Self::PeerStatus),
            3 => Ok(Self::EntitySpawn),
            4 => Ok(Self::EntityDespawn),
            5 => Ok(Self::EcsReplicate),
            other => Err(NetError::UnknownPacketType(other)),
        }
    }
}

/// New bytes for one component field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldUpdate {
    /// Field id within the component type.
    pub field: FieldId,
    /// Raw field bytes.
    pub bytes: Vec<u8>,
}

impl FieldUpdate {
    /// Bytes this update occupies on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        FIELD_HEADER_LEN + self.bytes.len()
    }
}

/// Field diff of one component on one entity.
///
/// Wire layout after the tag:
///
/// ```text
/// owner u32 | sequence u32 | component type u32 | field count u16
/// repeated: field id u16 | length u16 | bytes
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcsReplicate {
    /// Target entity.
    pub entity: StableEntityRef,
    /// Target component type.
    pub type_id: ComponentTypeId,
    /// Updates, applied in order.
    pub fields: Vec<FieldUpdate>,
}

/// Encoded size of the tag plus the fixed part of an [`EcsReplicate`].
pub const REPLICATE_HEADER_LEN: usize = 1 + 8 + 4 + 2;

/// Encoded size of a field's id and length prefix.
pub const FIELD_HEADER_LEN: usize = 2 + 2;

impl EcsReplicate {
    /// Empty diff for a component.
    #[must_use]
    pub fn new(entity: StableEntityRef, type_id: ComponentTypeId) -> Self {
        Self {
            entity,
            type_id,
            fields: Vec::new(),
        }
    }

    /// Appends a field update.
    pub fn push_field(&mut self, field: FieldId, bytes: &[u8]) {
        self.fields.push(FieldUpdate {
            field,
            bytes: bytes.to_vec(),
        });
    }

    /// Encoded size including the tag.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        REPLICATE_HEADER_LEN + self.fields.iter().map(FieldUpdate::wire_len).sum::<usize>()
    }

    /// Splits into packets of at most `max_len` encoded bytes, keeping field order.
    ///
    /// A single field too large to fit on its own still gets its own packet;
    /// encoding it will then fail with [`NetError::PacketTooLarge`].
    #[must_use]
    pub fn split_to_fit(self, max_len: usize) -> Vec<Self> {
        if self.wire_len() <= max_len {
            return vec![self];
        }
        let mut parts = Vec::new();
        let mut current = Self::new(self.entity, self.type_id);
        for update in self.fields {
            if !current.fields.is_empty() && current.wire_len() + update.wire_len() > max_len {
                let full = std::mem::replace(&mut current, Self::new(self.entity, self.type_id));
                parts.push(full);
            }
            current.fields.push(update);
        }
        if !current.fields.is_empty() {
            parts.push(current);
        }
        parts
    }

    fn encode_body(&self, writer: &mut PacketWriter) -> NetResult<()> {
        write_entity_ref(writer, self.entity);
        writer.write_u32(self.type_id.raw());
        let count = u16::try_from(self.fields.len()).map_err(|_| NetError::PacketTooLarge {
            size: self.fields.len(),
            max: usize::from(u16::MAX),
        })?;
        writer.write_u16(count);
        for update in &self.fields {
            writer.write_u16(update.field.0);
            writer.write_prefixed(&update.bytes)?;
        }
        Ok(())
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> NetResult<Self> {
        let entity = read_entity_ref(reader)?;
        let type_id = reader
            .read_u32()
            .map(ComponentTypeId::new)
            .ok_or(NetError::MalformedPacket("missing component type"))?;
        let count = reader
            .read_u16()
            .ok_or(NetError::MalformedPacket("missing field count"))?;

        let mut fields = Vec::with_capacity(usize::from(count).min(reader.remaining() / FIELD_HEADER_LEN));
        for _ in 0..count {
            let field = reader
                .read_u16()
                .map(FieldId)
                .ok_or(NetError::MalformedPacket("truncated field header"))?;
            let bytes = reader
                .read_prefixed()
                .ok_or(NetError::MalformedPacket("truncated field bytes"))?;
            fields.push(FieldUpdate {
                field,
                bytes: bytes.to_vec(),
            });
        }
        Ok(Self {
            entity,
            type_id,
            fields,
        })
    }
}

/// Everything that crosses the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    /// The receiving client's netId.
    NetIdAssigned {
        /// Assigned id.
        net_id: NetId,
    },
    /// A peer's status.
    PeerStatus {
        /// The peer.
        net_id: NetId,
        /// Its status.
        status: PeerStatus,
    },
    /// Create a mirror of a server entity.
    EntitySpawn {
        /// The entity.
        entity: StableEntityRef,
        /// Peer that controls it; [`NetId::SERVER`] for world entities.
        owner: NetId,
        /// Component types to attach, default-initialised.
        components: Vec<ComponentTypeId>,
    },
    /// Destroy a mirrored entity.
    EntityDespawn {
        /// The entity.
        entity: StableEntityRef,
    },
    /// Component field diff.
    EcsReplicate(EcsReplicate),
}

impl Packet {
    /// Type tag of this packet.
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Self::NetIdAssigned { .. } => PacketType::NetIdAssigned,
            Self::PeerStatus { .. } => PacketType::PeerStatus,
            Self::EntitySpawn { .. } => PacketType::EntitySpawn,
            Self::EntityDespawn { .. } => PacketType::EntityDespawn,
            Self::EcsReplicate(_) => PacketType::EcsReplicate,
        }
    }

    /// Encodes to wire bytes.
    ///
    /// # Errors
    ///
    /// [`NetError::PacketTooLarge`] if the result exceeds the datagram size.
    pub fn encode(&self) -> NetResult<Vec<u8>> {
        let mut writer = PacketWriter::new();
        writer.write_u8(self.packet_type() as u8);
        match self {
            Self::NetIdAssigned { net_id } => writer.write_u32(net_id.raw()),
            Self::PeerStatus { net_id, status } => {
                writer.write_u32(net_id.raw());
                writer.write_u8(*status as u8);
            }
            Self::EntitySpawn {
                entity,
                owner,
                components,
            } => {
                write_entity_ref(&mut writer, *entity);
                writer.write_u32(owner.raw());
                let count = u16::try_from(components.len()).map_err(|_| NetError::PacketTooLarge {
                    size: components.len(),
                    max: usize::from(u16::MAX),
                })?;
                writer.write_u16(count);
                for type_id in components {
                    writer.write_u32(type_id.raw());
                }
            }
            Self::EntityDespawn { entity } => write_entity_ref(&mut writer, *entity),
            Self::EcsReplicate(replicate) => replicate.encode_body(&mut writer)?,
        }
        writer.finish()
    }

    /// Decodes wire bytes. The whole buffer must be one packet.
    ///
    /// # Errors
    ///
    /// [`NetError::UnknownPacketType`] or [`NetError::MalformedPacket`].
    pub fn decode(bytes: &[u8]) -> NetResult<Self> {
        let mut reader = PacketReader::new(bytes);
        let tag = reader.read_u8().ok_or(NetError::MalformedPacket("empty packet"))?;

        let packet = match PacketType::try_from(tag)? {
            PacketType::NetIdAssigned => Self::NetIdAssigned {
                net_id: read_net_id(&mut reader)?,
            },
            PacketType::PeerStatus => {
                let net_id = read_net_id(&mut reader)?;
                let status = reader
                    .read_u8()
                    .ok_or(NetError::MalformedPacket("missing peer status"))?;
                Self::PeerStatus {
                    net_id,
                    status: PeerStatus::try_from(status)?,
                }
            }
            PacketType::EntitySpawn => {
                let entity = read_entity_ref(&mut reader)?;
                let owner = read_net_id(&mut reader)?;
                let count = reader
                    .read_u16()
                    .ok_or(NetError::MalformedPacket("missing component count"))?;
                let components = (0..count)
                    .map(|_| {
                        reader
                            .read_u32()
                            .map(ComponentTypeId::new)
                            .ok_or(NetError::MalformedPacket("truncated component list"))
                    })
                    .collect::<NetResult<Vec<_>>>()?;
                Self::EntitySpawn {
                    entity,
                    owner,
                    components,
                }
            }
            PacketType::EntityDespawn => Self::EntityDespawn {
                entity: read_entity_ref(&mut reader)?,
            },
            PacketType::EcsReplicate => Self::EcsReplicate(EcsReplicate::decode_body(&mut reader)?),
        };

        reader.finish()?;
        Ok(packet)
    }
}

fn write_entity_ref(writer: &mut PacketWriter, entity: StableEntityRef) {
    writer.write_u32(entity.owner);
    writer.write_u32(entity.sequence);
}

fn read_entity_ref(reader: &mut PacketReader<'_>) -> NetResult<StableEntityRef> {
    let owner = reader.read_u32();
    let sequence = reader.read_u32();
    owner
        .zip(sequence)
        .map(|(owner, sequence)| StableEntityRef::new(owner, sequence))
        .ok_or(NetError::MalformedPacket("truncated entity reference"))
}

fn read_net_id(reader: &mut PacketReader<'_>) -> NetResult<NetId> {
    reader
        .read_u32()
        .map(NetId::new)
        .ok_or(NetError::MalformedPacket("truncated net id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphinx_shared::MAX_PACKET_SIZE;

    fn sample_replicate() -> EcsReplicate {
        let mut replicate = EcsReplicate::new(StableEntityRef::new(NetId::SERVER.raw(), 7), ComponentTypeId::new(2));
        replicate.push_field(FieldId(0), &[1, 2, 3, 4]);
        replicate.push_field(FieldId(1), &[9; 16]);
        replicate
    }

    #[test]
    fn test_replicate_wire_layout() {
        let packet = Packet::EcsReplicate(sample_replicate());
        let bytes = packet.encode().unwrap();

        assert_eq!(bytes[0], PacketType::EcsReplicate as u8);
        assert_eq!(&bytes[1..5], &u32::MAX.to_le_bytes());
        assert_eq!(&bytes[5..9], &7u32.to_le_bytes());
        assert_eq!(&bytes[9..13], &2u32.to_le_bytes());
        assert_eq!(&bytes[13..15], &2u16.to_le_bytes());
        // field 0: id, len, payload
        assert_eq!(&bytes[15..19], &[0, 0, 4, 0]);
        assert_eq!(&bytes[19..23], &[1, 2, 3, 4]);
        assert_eq!(bytes.len(), sample_replicate().wire_len());

        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_every_packet_type_decodes() {
        let entity = StableEntityRef::new(3, 1);
        let packets = [
            Packet::NetIdAssigned { net_id: NetId::new(4) },
            Packet::PeerStatus {
                net_id: NetId::new(4),
                status: PeerStatus::Authenticated,
            },
            Packet::EntitySpawn {
                entity,
                owner: NetId::new(4),
                components: vec![ComponentTypeId::new(1), ComponentTypeId::new(2)],
            },
            Packet::EntityDespawn { entity },
        ];
        for packet in packets {
            let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();
            assert_eq!(decoded.packet_type(), packet.packet_type());
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(Packet::decode(&[]), Err(NetError::MalformedPacket("empty packet")));
        assert_eq!(Packet::decode(&[0xEE]), Err(NetError::UnknownPacketType(0xEE)));

        let mut bytes = Packet::EcsReplicate(sample_replicate()).encode().unwrap();
        bytes.truncate(bytes.len() - 1);
        assert_eq!(Packet::decode(&bytes), Err(NetError::MalformedPacket("truncated field bytes")));

        let mut bytes = Packet::NetIdAssigned { net_id: NetId::new(1) }.encode().unwrap();
        bytes.push(0);
        assert_eq!(Packet::decode(&bytes), Err(NetError::MalformedPacket("trailing bytes")));
    }

    #[test]
    fn test_split_to_fit_keeps_order() {
        let mut replicate = EcsReplicate::new(StableEntityRef::new(0, 0), ComponentTypeId::new(1));
        for id in 0..10u16 {
            replicate.push_field(FieldId(id), &[0; 200]);
        }
        assert!(replicate.wire_len() > MAX_PACKET_SIZE);

        let parts = replicate.split_to_fit(MAX_PACKET_SIZE);
        assert!(parts.len() > 1);
        let ids: Vec<u16> = parts.iter().flat_map(|p| p.fields.iter().map(|f| f.field.0)).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        for part in &parts {
            assert!(part.wire_len() <= MAX_PACKET_SIZE);
            assert!(Packet::EcsReplicate(part.clone()).encode().is_ok());
        }
    }
}
