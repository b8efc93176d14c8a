//! # Sphinx Core
//!
//! Entity/component core of the Sphinx voxel engine:
//! - Fixed-capacity object pools for entities and every component type
//! - An entity manager with owned and counted-handle lifetimes
//! - A runtime component registry with per-field reflection
//!
//! ## Architecture Rules
//!
//! 1. **Pools never grow** - exhaustion is an error, not a reallocation
//! 2. **The manager is the single truth for liveness** - never cache "is alive"
//! 3. **Mutate locally, then replicate** - a mutator never waits on the network
//!
//! ## Example
//!
//! ```rust
//! use sphinx_core::{CoordinateTransform, DirtyField, World};
//! use sphinx_shared::Quaternion;
//!
//! let mut world = World::new();
//! world.register::<CoordinateTransform>();
//!
//! let entity = world.spawn().unwrap();
//! world.add_component::<CoordinateTransform>(entity.id()).unwrap();
//!
//! let mut dirty: Vec<DirtyField> = Vec::new();
//! world
//!     .mutate::<CoordinateTransform, _, _>(entity.id(), &mut dirty, |t, ctx| {
//!         t.set_orientation(Quaternion::IDENTITY, ctx);
//!     })
//!     .unwrap();
//! assert_eq!(dirty.len(), 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod ecs;
pub mod error;
pub mod memory;

pub use ecs::{
    Component, ComponentKind, ComponentRegistry, ComponentTypeId, CoordinateTransform, DirtyField, Entity,
    EntityHandle, EntityId, EntityManager, FieldDescriptor, FieldId, MutationContext, ReplicationSink,
    StableEntityRef, Velocity, World,
};
pub use error::{EcsError, EcsResult};
pub use memory::{ObjectPool, PoolFull, PoolHandle};
