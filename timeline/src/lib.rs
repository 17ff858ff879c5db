//! # Timeline
//!
//! The versioned memory of the world. Every attribute of every simulated entity
//! lives here as an append-only history indexed by branch and tick, so the
//! world can be rewound, replayed, and forked without ever rewriting the past.
//!
//! ## Core Components
//!
//! - **branch**: branch ids, ticks, and the arena that ties branches into a tree
//! - **cache**: the temporal cache and its active-branches lookup
//! - **store**: the backing-store collaborator and an in-memory implementation

pub mod branch;
pub mod cache;
pub mod error;
pub mod store;

pub use branch::*;
pub use cache::*;
pub use error::*;
pub use store::*;
