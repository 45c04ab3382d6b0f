//! Core engine primitives: tiered memory management, a lock-free job
//! system, and an archetype-based ECS. `engine-resources` builds the
//! file system and resource manager on top of these.

pub mod alloc_bindings;
pub mod config;
pub mod ecs;
pub mod error;
pub mod handle;
pub mod jobs;
pub mod memory;
