//! # Entity Component System
//!
//! Pooled entities with runtime-registered, field-reflected components.
//!
//! ## Design Philosophy
//!
//! - Entities and components live in fixed-capacity pools
//! - Components are `Pod`; a field is a byte range, so updates are byte copies
//! - Replication is opt-in per mutation through an explicit sink

mod component;
mod components;
mod entity;
mod manager;
mod registry;
mod replication;
mod world;

pub use component::{Component, ComponentTypeId, FieldDescriptor, FieldId};
pub use components::{CoordinateTransform, Velocity};
pub use entity::{Entity, EntityId, StableEntityRef};
pub use manager::{EntityHandle, EntityManager};
pub use registry::{ComponentKind, ComponentRegistry};
pub use replication::{DirtyField, MutationContext, ReplicationSink};
pub use world::World;
