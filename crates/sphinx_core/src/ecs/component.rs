//! # Component System
//!
//! Components are plain data. Each component type declares:
//! - a pool capacity (how many instances may be live at once)
//! - a field table, which is what replication reads and writes
//!
//! Components are `Pod`, so a field is just a byte range of the value. Field
//! descriptors record that range with `offset_of!`, which lets the registry
//! read and overwrite fields without knowing the concrete type.

use std::fmt;
use std::ops::Range;

use bytemuck::Pod;

/// Runtime identifier of a registered component type.
///
/// Ids are handed out by the registry in registration order, starting at 1.
/// Zero is [`ComponentTypeId::INVALID`] and never names a type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentTypeId(u32);

impl ComponentTypeId {
    /// Sentinel that never names a registered type.
    pub const INVALID: Self = Self(0);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True unless this is [`Self::INVALID`].
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a field within one component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FieldId(pub u16);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a replicated field lives inside its component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field id, unique within the component type.
    pub id: FieldId,
    /// Human-readable name, for logs.
    pub name: &'static str,
    /// Byte offset within the component.
    pub offset: usize,
    /// Byte size of the field.
    pub size: usize,
}

impl FieldDescriptor {
    /// Creates a descriptor. Usually built through [`component_field!`](crate::component_field).
    #[must_use]
    pub const fn new(id: u16, name: &'static str, offset: usize, size: usize) -> Self {
        Self {
            id: FieldId(id),
            name,
            offset,
            size,
        }
    }

    /// Byte range within the component.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }
}

/// Builds a [`FieldDescriptor`] for a named field of a component struct.
///
/// ```rust
/// use sphinx_core::{component_field, FieldDescriptor};
///
/// #[repr(C)]
/// struct Health { current: f32, max: f32 }
///
/// const MAX: FieldDescriptor = component_field!(1, Health, max: f32);
/// assert_eq!((MAX.offset, MAX.size), (4, 4));
/// ```
#[macro_export]
macro_rules! component_field {
    ($id:expr, $component:ty, $field:ident : $field_ty:ty) => {
        $crate::ecs::FieldDescriptor::new(
            $id,
            ::core::stringify!($field),
            ::core::mem::offset_of!($component, $field),
            ::core::mem::size_of::<$field_ty>(),
        )
    };
}

/// A component type.
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use sphinx_core::{component_field, Component, FieldDescriptor};
///
/// #[repr(C)]
/// #[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
/// struct Health { current: f32, max: f32 }
///
/// impl Component for Health {
///     const NAME: &'static str = "Health";
///     const CAPACITY: usize = 128;
///     const FIELDS: &'static [FieldDescriptor] = &[
///         component_field!(0, Health, current: f32),
///         component_field!(1, Health, max: f32),
///     ];
/// }
/// ```
pub trait Component: Pod + Default + Send + Sync + 'static {
    /// Type name, for logs and errors.
    const NAME: &'static str;

    /// Maximum number of live instances.
    const CAPACITY: usize;

    /// Replicated fields. Ids must be unique and ranges must lie within the value.
    const FIELDS: &'static [FieldDescriptor];

    /// Descriptor of field `id`.
    #[must_use]
    fn field(id: FieldId) -> Option<&'static FieldDescriptor> {
        Self::FIELDS.iter().find(|f| f.id == id)
    }
}

/// Checks a field table against the component's size.
///
/// # Panics
///
/// Panics on duplicate field ids or a range outside the component; both
/// are declaration bugs.
pub(crate) fn validate_fields<C: Component>() {
    let size = std::mem::size_of::<C>();
    for (i, field) in C::FIELDS.iter().enumerate() {
        assert!(
            field.range().end <= size,
            "{}: field {} ({}) ends at {} but the component is {size} bytes",
            C::NAME,
            field.id,
            field.name,
            field.range().end,
        );
        assert!(
            C::FIELDS[..i].iter().all(|other| other.id != field.id),
            "{}: duplicate field id {}",
            C::NAME,
            field.id,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
    struct Pair {
        a: u32,
        b: [f32; 2],
    }

    impl Component for Pair {
        const NAME: &'static str = "Pair";
        const CAPACITY: usize = 4;
        const FIELDS: &'static [FieldDescriptor] = &[
            crate::component_field!(0, Pair, a: u32),
            crate::component_field!(1, Pair, b: [f32; 2]),
        ];
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
    struct Broken {
        a: u32,
    }

    impl Component for Broken {
        const NAME: &'static str = "Broken";
        const CAPACITY: usize = 1;
        const FIELDS: &'static [FieldDescriptor] =
            &[FieldDescriptor::new(0, "a", 0, 4), FieldDescriptor::new(0, "again", 0, 4)];
    }

    #[test]
    fn test_field_table() {
        assert_eq!(Pair::FIELDS[1].range(), 4..12);
        assert_eq!(Pair::field(FieldId(1)).map(|f| f.name), Some("b"));
        assert!(Pair::field(FieldId(2)).is_none());
        validate_fields::<Pair>();
    }

    #[test]
    #[should_panic(expected = "duplicate field id")]
    fn test_duplicate_field_ids_rejected() {
        validate_fields::<Broken>();
    }

    #[test]
    fn test_invalid_type_id() {
        assert!(!ComponentTypeId::INVALID.is_valid());
        assert!(ComponentTypeId::new(1).is_valid());
        assert_eq!(ComponentTypeId::default(), ComponentTypeId::INVALID);
    }
}
