//! # Component Replication
//!
//! Outgoing: component mutators push dirty fields into a
//! [`ReplicationQueue`], which batches them per (entity, component) in
//! mutation order and turns them into [`EcsReplicate`](crate::protocol::EcsReplicate)
//! packets at flush.
//!
//! Incoming: [`apply_replicate`] resolves the packet's entity and component
//! and applies each field in wire order.
//!
//! ## Conflicts
//!
//! Updates to the same field apply in wire order, so the last write wins.
//! Client writes are provisional: the server re-broadcasts what it accepted
//! and that broadcast is the value everyone converges on.

mod incoming;
mod outgoing;

pub use incoming::{apply_replicate, collect_fields, full_state, ApplyReport};
pub use outgoing::ReplicationQueue;
