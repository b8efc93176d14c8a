//! # Component Registry
//!
//! Runtime table of component types. Registration assigns each type a
//! [`ComponentTypeId`] and creates its fixed-capacity pool. After that the
//! registry can construct, release and patch components knowing only the
//! type id, which is all a replication packet carries.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::component::{validate_fields, Component, ComponentTypeId, FieldDescriptor, FieldId};
use super::entity::EntityId;
use crate::error::{EcsError, EcsResult};
use crate::memory::{ObjectPool, PoolFull, PoolHandle};

/// A live component and the entity it belongs to.
struct Slot<C> {
    owner: EntityId,
    value: C,
}

/// Type-erased access to one component type's pool.
trait ErasedStorage: Send + Sync {
    fn construct(&mut self, owner: EntityId) -> Result<PoolHandle, PoolFull>;
    fn release(&mut self, slot: PoolHandle) -> Option<EntityId>;
    fn owner(&self, slot: PoolHandle) -> Option<EntityId>;
    fn bytes(&self, slot: PoolHandle) -> Option<&[u8]>;
    fn bytes_mut(&mut self, slot: PoolHandle) -> Option<&mut [u8]>;
    fn live_count(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct TypedStorage<C: Component> {
    pool: ObjectPool<Slot<C>>,
}

impl<C: Component> ErasedStorage for TypedStorage<C> {
    fn construct(&mut self, owner: EntityId) -> Result<PoolHandle, PoolFull> {
        self.pool.allocate(Slot {
            owner,
            value: C::default(),
        })
    }

    fn release(&mut self, slot: PoolHandle) -> Option<EntityId> {
        self.pool.release(slot).map(|s| s.owner)
    }

    fn owner(&self, slot: PoolHandle) -> Option<EntityId> {
        self.pool.get(slot).map(|s| s.owner)
    }

    fn bytes(&self, slot: PoolHandle) -> Option<&[u8]> {
        self.pool.get(slot).map(|s| bytemuck::bytes_of(&s.value))
    }

    fn bytes_mut(&mut self, slot: PoolHandle) -> Option<&mut [u8]> {
        self.pool.get_mut(slot).map(|s| bytemuck::bytes_of_mut(&mut s.value))
    }

    fn live_count(&self) -> usize {
        self.pool.live_count()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Metadata of a registered component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentKind {
    /// Runtime id.
    pub type_id: ComponentTypeId,
    /// Type name.
    pub name: &'static str,
    /// Pool capacity.
    pub capacity: usize,
    /// Size of one instance in bytes.
    pub size: usize,
    /// Replicated fields.
    pub fields: &'static [FieldDescriptor],
}

impl ComponentKind {
    /// Descriptor of field `id`.
    #[must_use]
    pub fn field(&self, id: FieldId) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }
}

struct Registration {
    kind: ComponentKind,
    storage: Box<dyn ErasedStorage>,
}

/// Registered component types and their pools.
pub struct ComponentRegistry {
    /// Indexed by `type_id - 1`.
    registrations: Vec<Registration>,
    by_rust_type: HashMap<TypeId, ComponentTypeId>,
}

impl ComponentRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            by_rust_type: HashMap::new(),
        }
    }

    /// Registers `C` and creates its pool. Ids start at 1 and follow call order.
    ///
    /// # Panics
    ///
    /// Panics if `C` is already registered or its field table is inconsistent.
    pub fn register<C: Component>(&mut self) -> ComponentTypeId {
        assert!(
            !self.by_rust_type.contains_key(&TypeId::of::<C>()),
            "component {} registered twice",
            C::NAME
        );
        validate_fields::<C>();

        let type_id = ComponentTypeId::new(self.registrations.len() as u32 + 1);
        let kind = ComponentKind {
            type_id,
            name: C::NAME,
            capacity: C::CAPACITY,
            size: std::mem::size_of::<C>(),
            fields: C::FIELDS,
        };
        self.registrations.push(Registration {
            kind,
            storage: Box::new(TypedStorage::<C> {
                pool: ObjectPool::new(C::CAPACITY),
            }),
        });
        self.by_rust_type.insert(TypeId::of::<C>(), type_id);

        tracing::debug!(
            component = C::NAME,
            %type_id,
            capacity = C::CAPACITY,
            fields = C::FIELDS.len(),
            "registered component type"
        );
        type_id
    }

    /// Id of a registered Rust type.
    #[must_use]
    pub fn type_id_of<C: Component>(&self) -> Option<ComponentTypeId> {
        self.by_rust_type.get(&TypeId::of::<C>()).copied()
    }

    /// Metadata of a registered type.
    #[must_use]
    pub fn kind(&self, type_id: ComponentTypeId) -> Option<&ComponentKind> {
        self.registration(type_id).map(|r| &r.kind)
    }

    /// All registered types in id order.
    pub fn kinds(&self) -> impl Iterator<Item = &ComponentKind> {
        self.registrations.iter().map(|r| &r.kind)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Field table of a registered type.
    #[must_use]
    pub fn fields(&self, type_id: ComponentTypeId) -> Option<&'static [FieldDescriptor]> {
        self.kind(type_id).map(|k| k.fields)
    }

    /// Live instance count of a registered type.
    #[must_use]
    pub fn live_count(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.registration(type_id).map(|r| r.storage.live_count())
    }

    /// Default-constructs a component of `type_id` owned by `owner`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponentType`] or [`EcsError::PoolExhausted`].
    pub fn construct(&mut self, type_id: ComponentTypeId, owner: EntityId) -> EcsResult<PoolHandle> {
        let registration = self.registration_mut(type_id)?;
        let name = registration.kind.name;
        registration.storage.construct(owner).map_err(|full| {
            tracing::warn!(component = name, capacity = full.capacity, "component pool exhausted");
            EcsError::PoolExhausted {
                kind: name,
                capacity: full.capacity,
            }
        })
    }

    /// Returns a slot to its pool, yielding its owner.
    pub fn release(&mut self, type_id: ComponentTypeId, slot: PoolHandle) -> Option<EntityId> {
        self.registration_mut(type_id).ok()?.storage.release(slot)
    }

    /// Entity owning a live slot.
    #[must_use]
    pub fn owner_of(&self, type_id: ComponentTypeId, slot: PoolHandle) -> Option<EntityId> {
        self.registration(type_id)?.storage.owner(slot)
    }

    /// Typed access to a live slot.
    #[must_use]
    pub fn get<C: Component>(&self, slot: PoolHandle) -> Option<&C> {
        let type_id = self.type_id_of::<C>()?;
        self.registration(type_id)?
            .storage
            .as_any()
            .downcast_ref::<TypedStorage<C>>()?
            .pool
            .get(slot)
            .map(|s| &s.value)
    }

    /// Typed mutable access to a live slot.
    pub fn get_mut<C: Component>(&mut self, slot: PoolHandle) -> Option<&mut C> {
        let type_id = self.type_id_of::<C>()?;
        self.registration_mut(type_id)
            .ok()?
            .storage
            .as_any_mut()
            .downcast_mut::<TypedStorage<C>>()?
            .pool
            .get_mut(slot)
            .map(|s| &mut s.value)
    }

    /// Whole-component bytes of a live slot.
    #[must_use]
    pub fn bytes(&self, type_id: ComponentTypeId, slot: PoolHandle) -> Option<&[u8]> {
        self.registration(type_id)?.storage.bytes(slot)
    }

    /// Current bytes of one field. `None` if the slot is not live.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponentType`] or [`EcsError::UnknownField`].
    pub fn read_field(
        &self,
        type_id: ComponentTypeId,
        slot: PoolHandle,
        field: FieldId,
    ) -> EcsResult<Option<&[u8]>> {
        let registration = self.registration(type_id).ok_or(EcsError::UnknownComponentType(type_id))?;
        let descriptor = registration
            .kind
            .field(field)
            .ok_or(EcsError::UnknownField { type_id, field })?;
        Ok(registration.storage.bytes(slot).map(|b| &b[descriptor.range()]))
    }

    /// Overwrites one field with `bytes`. Returns `false` if the slot is not live.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponentType`], [`EcsError::UnknownField`], or
    /// [`EcsError::FieldLengthMismatch`] when `bytes` is not exactly the
    /// field's size. The component is untouched on error.
    pub fn apply_field(
        &mut self,
        type_id: ComponentTypeId,
        slot: PoolHandle,
        field: FieldId,
        bytes: &[u8],
    ) -> EcsResult<bool> {
        let registration = self.registration_mut(type_id)?;
        let descriptor = registration
            .kind
            .field(field)
            .ok_or(EcsError::UnknownField { type_id, field })?;
        if bytes.len() != descriptor.size {
            return Err(EcsError::FieldLengthMismatch {
                type_id,
                field,
                expected: descriptor.size,
                actual: bytes.len(),
            });
        }
        let Some(target) = registration.storage.bytes_mut(slot) else {
            return Ok(false);
        };
        target[descriptor.range()].copy_from_slice(bytes);
        Ok(true)
    }

    fn registration(&self, type_id: ComponentTypeId) -> Option<&Registration> {
        let index = (type_id.raw() as usize).checked_sub(1)?;
        self.registrations.get(index)
    }

    fn registration_mut(&mut self, type_id: ComponentTypeId) -> EcsResult<&mut Registration> {
        (type_id.raw() as usize)
            .checked_sub(1)
            .and_then(|index| self.registrations.get_mut(index))
            .ok_or(EcsError::UnknownComponentType(type_id))
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Component for Health {
        const NAME: &'static str = "Health";
        const CAPACITY: usize = 2;
        const FIELDS: &'static [FieldDescriptor] = &[
            crate::component_field!(0, Health, current: f32),
            crate::component_field!(1, Health, max: f32),
        ];
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
    struct Tag {
        value: u32,
    }

    impl Component for Tag {
        const NAME: &'static str = "Tag";
        const CAPACITY: usize = 1;
        const FIELDS: &'static [FieldDescriptor] = &[];
    }

    #[test]
    fn test_ids_follow_registration_order() {
        let mut registry = ComponentRegistry::new();
        assert_eq!(registry.register::<Health>(), ComponentTypeId::new(1));
        assert_eq!(registry.register::<Tag>(), ComponentTypeId::new(2));
        assert_eq!(registry.type_id_of::<Tag>(), Some(ComponentTypeId::new(2)));
        assert_eq!(registry.kind(ComponentTypeId::new(1)).unwrap().name, "Health");
        assert!(registry.kind(ComponentTypeId::INVALID).is_none());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_double_registration_panics() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>();
        registry.register::<Health>();
    }

    #[test]
    fn test_construct_release_and_exhaustion() {
        let mut registry = ComponentRegistry::new();
        let tag = registry.register::<Tag>();

        let slot = registry.construct(tag, EntityId::new(4)).unwrap();
        assert_eq!(registry.owner_of(tag, slot), Some(EntityId::new(4)));
        assert_eq!(
            registry.construct(tag, EntityId::new(5)),
            Err(EcsError::PoolExhausted { kind: "Tag", capacity: 1 })
        );

        assert_eq!(registry.release(tag, slot), Some(EntityId::new(4)));
        assert_eq!(registry.live_count(tag), Some(0));
    }

    #[test]
    fn test_field_access_is_type_erased() {
        let mut registry = ComponentRegistry::new();
        let health = registry.register::<Health>();
        let slot = registry.construct(health, EntityId::new(0)).unwrap();

        let applied = registry
            .apply_field(health, slot, FieldId(1), &50.0f32.to_le_bytes())
            .unwrap();
        assert!(applied);
        assert_eq!(registry.get::<Health>(slot), Some(&Health { current: 0.0, max: 50.0 }));

        registry.get_mut::<Health>(slot).unwrap().current = 20.0;
        let bytes = registry.read_field(health, slot, FieldId(0)).unwrap().unwrap();
        assert_eq!(bytes, 20.0f32.to_le_bytes());
    }

    #[test]
    fn test_malformed_field_leaves_component_untouched() {
        let mut registry = ComponentRegistry::new();
        let health = registry.register::<Health>();
        let slot = registry.construct(health, EntityId::new(0)).unwrap();

        let short = registry.apply_field(health, slot, FieldId(0), &[1, 2]);
        assert!(matches!(short, Err(EcsError::FieldLengthMismatch { expected: 4, actual: 2, .. })));

        let unknown = registry.apply_field(health, slot, FieldId(9), &[0; 4]);
        assert!(matches!(unknown, Err(EcsError::UnknownField { .. })));
        assert!(unknown.unwrap_err().is_malformed_field());

        assert_eq!(registry.get::<Health>(slot), Some(&Health::default()));
    }
}
