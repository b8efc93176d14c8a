//! # Core Error Types
//!
//! All recoverable errors raised by pools, the entity manager and the
//! component registry. Programmer errors (double registration, releasing an
//! entity the manager does not own) are panics, not variants here.

use thiserror::Error;

use crate::ecs::{ComponentTypeId, EntityId, FieldId, StableEntityRef};

/// Errors that can occur in the entity/component core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Every slot of a fixed-capacity pool is live.
    #[error("{kind} pool exhausted: all {capacity} slots are live")]
    PoolExhausted {
        /// What the pool stores.
        kind: &'static str,
        /// The pool's fixed capacity.
        capacity: usize,
    },

    /// The identifier does not name a live entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// The entity is live but has no component of the requested type.
    #[error("{entity} has no component of type {type_id}")]
    UnknownComponent {
        /// The entity that was searched.
        entity: EntityId,
        /// The missing component type.
        type_id: ComponentTypeId,
    },

    /// The component type id was never registered.
    #[error("component type {0} is not registered")]
    UnknownComponentType(ComponentTypeId),

    /// The Rust component type was never registered.
    #[error("component {0} is not registered")]
    UnregisteredComponent(&'static str),

    /// The entity already carries a component of this type.
    #[error("{entity} already has a component of type {type_id}")]
    DuplicateComponent {
        /// The entity.
        entity: EntityId,
        /// The duplicated component type.
        type_id: ComponentTypeId,
    },

    /// The field id is not declared by the component type.
    #[error("component type {type_id} declares no field {field}")]
    UnknownField {
        /// The component type.
        type_id: ComponentTypeId,
        /// The undeclared field.
        field: FieldId,
    },

    /// Field bytes do not match the declared field size.
    #[error("field {field} of component type {type_id} is {expected} bytes, got {actual}")]
    FieldLengthMismatch {
        /// The component type.
        type_id: ComponentTypeId,
        /// The field.
        field: FieldId,
        /// Declared size.
        expected: usize,
        /// Received size.
        actual: usize,
    },

    /// A stable reference is already bound to another live entity.
    #[error("stable reference {0} is already bound")]
    DuplicateStableRef(StableEntityRef),
}

impl EcsError {
    /// True for errors caused by field data that does not fit its declaration.
    #[must_use]
    pub const fn is_malformed_field(&self) -> bool {
        matches!(self, Self::UnknownField { .. } | Self::FieldLengthMismatch { .. })
    }
}

/// Result type for core operations.
pub type EcsResult<T> = Result<T, EcsError>;
