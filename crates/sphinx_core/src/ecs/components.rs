//! # Built-in Components
//!
//! Components every Sphinx process registers. Setters that take a
//! [`MutationContext`] replicate; the rest are local-only.

use bytemuck::{Pod, Zeroable};
use sphinx_shared::{Coordinate, Quaternion, Vec3};

use super::component::{Component, FieldDescriptor, FieldId};
use super::replication::MutationContext;
use crate::component_field;

/// Where an entity is, which way it faces, and how big it is.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CoordinateTransform {
    position: Coordinate,
    orientation: Quaternion,
    size: Vec3,
}

impl CoordinateTransform {
    /// Field id of the position.
    pub const POSITION: FieldId = FieldId(0);
    /// Field id of the orientation.
    pub const ORIENTATION: FieldId = FieldId(1);
    /// Field id of the size.
    pub const SIZE: FieldId = FieldId(2);

    /// Current position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> Coordinate {
        self.position
    }

    /// Position relative to the current chunk's origin.
    #[must_use]
    pub fn local_position(&self) -> Vec3 {
        self.position.local_position()
    }

    /// Moves the entity. A move to the current position is a no-op and
    /// replicates nothing.
    pub fn set_position(&mut self, position: Coordinate, ctx: &mut MutationContext<'_>) -> &mut Self {
        if position == self.position {
            return self;
        }
        self.position = position;
        ctx.mark_dirty(&*self, Self::POSITION);
        self
    }

    /// Current orientation.
    #[inline]
    #[must_use]
    pub const fn orientation(&self) -> Quaternion {
        self.orientation
    }

    /// Replaces the orientation.
    pub fn set_orientation(&mut self, orientation: Quaternion, ctx: &mut MutationContext<'_>) -> &mut Self {
        self.orientation = orientation;
        ctx.mark_dirty(&*self, Self::ORIENTATION);
        self
    }

    /// Replaces the orientation with a rotation of `radians` around `axis`.
    pub fn set_orientation_axis_angle(
        &mut self,
        axis: Vec3,
        radians: f32,
        ctx: &mut MutationContext<'_>,
    ) -> &mut Self {
        self.set_orientation(Quaternion::from_axis_angle(axis, radians), ctx)
    }

    /// Turns by `radians` around `axis`. Local only.
    pub fn rotate(&mut self, axis: Vec3, radians: f32) {
        self.orientation = self
            .orientation
            .concat(Quaternion::from_axis_angle(axis, radians));
    }

    /// Current size.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Vec3 {
        self.size
    }

    /// Replaces the size. Local only.
    pub fn set_size(&mut self, size: Vec3) -> &mut Self {
        self.size = size;
        self
    }

    /// Facing direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.orientation.rotate(Vec3::FORWARD)
    }

    /// Opposite of [`Self::forward`].
    #[must_use]
    pub fn backward(&self) -> Vec3 {
        -self.forward()
    }

    /// Right of the facing direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.orientation.rotate(Vec3::RIGHT)
    }

    /// Opposite of [`Self::right`].
    #[must_use]
    pub fn left(&self) -> Vec3 {
        -self.right()
    }

    /// Up relative to the orientation.
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.orientation.rotate(Vec3::UP)
    }

    /// Opposite of [`Self::up`].
    #[must_use]
    pub fn down(&self) -> Vec3 {
        -self.up()
    }
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self {
            position: Coordinate::ORIGIN,
            orientation: Quaternion::IDENTITY,
            size: Vec3::ONE,
        }
    }
}

impl Component for CoordinateTransform {
    const NAME: &'static str = "CoordinateTransform";
    const CAPACITY: usize = 256;
    const FIELDS: &'static [FieldDescriptor] = &[
        component_field!(0, CoordinateTransform, position: Coordinate),
        component_field!(1, CoordinateTransform, orientation: Quaternion),
        component_field!(2, CoordinateTransform, size: Vec3),
    ];
}

/// Linear velocity in blocks per second.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Velocity {
    linear: Vec3,
}

impl Velocity {
    /// Field id of the linear velocity.
    pub const LINEAR: FieldId = FieldId(0);

    /// Current velocity.
    #[inline]
    #[must_use]
    pub const fn linear(&self) -> Vec3 {
        self.linear
    }

    /// Replaces the velocity.
    pub fn set_linear(&mut self, linear: Vec3, ctx: &mut MutationContext<'_>) -> &mut Self {
        self.linear = linear;
        ctx.mark_dirty(&*self, Self::LINEAR);
        self
    }

    /// True if the entity is not moving.
    #[must_use]
    pub fn is_at_rest(&self) -> bool {
        self.linear.length_squared() <= f32::EPSILON
    }
}

impl Component for Velocity {
    const NAME: &'static str = "Velocity";
    const CAPACITY: usize = 256;
    const FIELDS: &'static [FieldDescriptor] = &[component_field!(0, Velocity, linear: Vec3)];
}
