//! # Memory Management
//!
//! Pre-sized pools. Capacity is fixed when the pool is created; running out
//! is a reportable error, never a reallocation.

mod pool;

pub use pool::{ObjectPool, PoolFull, PoolHandle};
