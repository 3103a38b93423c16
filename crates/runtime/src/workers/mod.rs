//! Worker tasks that back the runtime orchestration.
//!
//! The authority worker owns devices and the authoritative world; each
//! joined participant runs a follower worker that mirrors it.

mod authority;
mod follower;

pub(crate) use authority::{AuthorityContent, AuthorityWorker, Command, WorldEdit};
pub(crate) use follower::{FollowerCommand, FollowerWorker};
