mod archetype;
mod chunk;
mod component;
mod mask;
mod query;
mod world;

pub use archetype::{ArchetypeHandle, EntityHandle};
pub use component::{Component, ComponentId};
pub use mask::ComponentMask;
pub use query::{ComponentList, Query};
pub use world::World;
