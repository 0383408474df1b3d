//! Storage boundaries.
//!
//! Traits for every store the controller talks to, plus in-memory
//! implementations for development and testing.

pub mod memory;
pub mod traits;

pub use memory::{InMemoryObjectStore, InMemoryResourceStore, InMemoryStateStore};
pub use traits::{ManagedObjectStore, ResourceStore, StateStore};
