//! Common building blocks for GoS/MPLS simulation nodes.
//!
//! This crate provides the generic containers and generators every node
//! engine in the domain relies on:
//!
//! - [`SyncMap`]: map that never creates entries implicitly and supports
//!   removal while scanning
//! - [`IdGenerator`]: explicitly owned, per-node identifier generator that
//!   reports exhaustion as a typed error instead of wrapping silently
//!
//! # Example
//!
//! ```
//! use gosmpls_common::{IdGenerator, SyncMap};
//!
//! let mut sessions: IdGenerator<u32> = IdGenerator::new();
//! let mut table: SyncMap<u32, &str> = SyncMap::new();
//!
//! let id = sessions.next_id().unwrap();
//! table.insert(id, "pending");
//! table.retain(|_, state| *state != "pending");
//! assert!(table.is_empty());
//! ```

mod id;
mod sync_map;

pub use id::{IdError, IdGenerator, IdValue};
pub use sync_map::SyncMap;
