//! World adapters the workers drive.

mod memory;

pub use memory::{EntityRecord, InMemoryWorld, MAX_HEALTH};
