//! Incoming replication and full-state snapshots.

use sphinx_core::{ComponentTypeId, EntityId, FieldId, World};

use crate::error::{NetError, NetResult};
use crate::protocol::EcsReplicate;

/// Outcome of applying one [`EcsReplicate`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Local entity the packet resolved to.
    pub entity: Option<EntityId>,
    /// Fields written, in wire order. May repeat.
    pub accepted: Vec<FieldId>,
    /// Fields skipped as unknown or of the wrong length.
    pub rejected: usize,
}

/// Applies a field diff to the local mirror of its entity.
///
/// A malformed field is skipped and counted; the rest of the packet still
/// applies.
///
/// # Errors
///
/// [`NetError::UnknownEntity`] if no live entity carries the packet's
/// reference, or an ECS error if the entity lacks the component.
pub fn apply_replicate(world: &mut World, packet: &EcsReplicate) -> NetResult<ApplyReport> {
    let entity = world
        .entities()
        .resolve(packet.entity)
        .ok_or(NetError::UnknownEntity(packet.entity))?;

    let mut report = ApplyReport {
        entity: Some(entity),
        ..ApplyReport::default()
    };
    for update in &packet.fields {
        match world.apply_field(entity, packet.type_id, update.field, &update.bytes) {
            Ok(()) => report.accepted.push(update.field),
            Err(e) if e.is_malformed_field() => {
                tracing::debug!(
                    entity = %packet.entity,
                    type_id = %packet.type_id,
                    field = update.field.0,
                    error = %e,
                    "skipping malformed field"
                );
                report.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(report)
}

/// Current values of `fields` of one component, as a diff packet.
///
/// # Errors
///
/// Fails if the entity has no network reference or lacks the component or
/// a field.
pub fn collect_fields(
    world: &World,
    entity: EntityId,
    type_id: ComponentTypeId,
    fields: impl IntoIterator<Item = FieldId>,
) -> NetResult<EcsReplicate> {
    let stable_ref = world
        .entities()
        .stable_ref_of(entity)
        .ok_or(sphinx_core::EcsError::UnknownEntity(entity))?;
    let mut packet = EcsReplicate::new(stable_ref, type_id);
    for field in fields {
        let bytes = world.read_field(entity, type_id, field)?;
        packet.push_field(field, &bytes);
    }
    Ok(packet)
}

/// Every field of every component of `entity`, one packet per component.
///
/// Late joiners receive this after the spawn so their mirror starts from
/// the current state rather than defaults.
///
/// # Errors
///
/// Fails if the entity is not live or has no network reference.
pub fn full_state(world: &World, entity: EntityId) -> NetResult<Vec<EcsReplicate>> {
    let mut packets = Vec::new();
    for type_id in world.component_types(entity)? {
        let Some(fields) = world.components().fields(type_id) else {
            continue;
        };
        let packet = collect_fields(world, entity, type_id, fields.iter().map(|f| f.id))?;
        if !packet.fields.is_empty() {
            packets.push(packet);
        }
    }
    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphinx_core::{Component, CoordinateTransform, StableEntityRef, Velocity};
    use sphinx_shared::{Coordinate, Vec3, Vec3Int};

    fn world_with_entity() -> (World, EntityId) {
        let mut world = World::with_entity_capacity(8);
        world.register::<CoordinateTransform>();
        world.register::<Velocity>();
        let id = world.spawn_networked(StableEntityRef::SERVER_OWNER).unwrap().id();
        world.add_component::<CoordinateTransform>(id).unwrap();
        (world, id)
    }

    #[test]
    fn test_full_state_reproduces_component() {
        let (mut source, id) = world_with_entity();
        source
            .mutate_local::<CoordinateTransform, _, _>(id, |t, ctx| {
                t.set_position(Coordinate::new(Vec3Int::ZERO, Vec3Int::new(1, 2, 3), Vec3::ZERO), ctx);
                t.rotate(Vec3::UP, 0.5);
            })
            .unwrap();
        let stable_ref = source.entities().stable_ref_of(id).unwrap();

        let packets = full_state(&source, id).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].fields.len(), CoordinateTransform::FIELDS.len());

        let mut mirror = World::with_entity_capacity(8);
        mirror.register::<CoordinateTransform>();
        let local = mirror.spawn_mirror(stable_ref).unwrap().id();
        mirror.add_component::<CoordinateTransform>(local).unwrap();
        let report = apply_replicate(&mut mirror, &packets[0]).unwrap();
        assert_eq!(report.entity, Some(local));
        assert_eq!(report.rejected, 0);

        let expected = source.component::<CoordinateTransform>(id).unwrap();
        let actual = mirror.component::<CoordinateTransform>(local).unwrap();
        assert_eq!(bytemuck::bytes_of(&expected), bytemuck::bytes_of(&actual));
    }

    #[test]
    fn test_malformed_fields_are_skipped() {
        let (mut world, id) = world_with_entity();
        let stable_ref = world.entities().stable_ref_of(id).unwrap();
        let type_id = world.components().type_id_of::<CoordinateTransform>().unwrap();

        let size = Vec3::new(4.0, 5.0, 6.0);
        let mut packet = EcsReplicate::new(stable_ref, type_id);
        packet.push_field(FieldId(99), &[0; 4]);
        packet.push_field(CoordinateTransform::SIZE, &[0; 3]);
        packet.push_field(CoordinateTransform::SIZE, bytemuck::bytes_of(&size));

        let report = apply_replicate(&mut world, &packet).unwrap();
        assert_eq!(report.rejected, 2);
        assert_eq!(report.accepted, vec![CoordinateTransform::SIZE]);
        assert_eq!(world.component::<CoordinateTransform>(id).unwrap().size(), size);
    }

    #[test]
    fn test_unknown_entity_and_component() {
        let (mut world, id) = world_with_entity();
        let missing = EcsReplicate::new(StableEntityRef::new(5, 5), ComponentTypeId::new(1));
        assert_eq!(
            apply_replicate(&mut world, &missing),
            Err(NetError::UnknownEntity(StableEntityRef::new(5, 5)))
        );

        let stable_ref = world.entities().stable_ref_of(id).unwrap();
        let velocity = world.components().type_id_of::<Velocity>().unwrap();
        let mut packet = EcsReplicate::new(stable_ref, velocity);
        packet.push_field(Velocity::LINEAR, bytemuck::bytes_of(&Vec3::ONE));
        assert!(matches!(apply_replicate(&mut world, &packet), Err(NetError::Ecs(_))));
    }
}
