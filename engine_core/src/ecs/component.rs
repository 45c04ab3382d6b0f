use std::any::TypeId;

use fxhash::FxHashMap;

/// Any `'static + Send + Sync` type can back a component; there is no
/// marker trait to implement, matching legion's own treatment of component
/// types in `lib.rs` (any type usable in a query is automatically a valid
/// component).
pub trait Component: 'static + Send + Sync {}
impl<T: 'static + Send + Sync> Component for T {}

pub type ComponentId = usize;

/// Per-`World` component id registry. Ids are dense, start at 1 (0 is
/// reserved for "the empty archetype"), and are assigned on first use of a
/// component type, exactly as `original_source/engine/ecs/ecs.cpp`'s
/// `ecs_component_type_info_get_id` does — but scoped to a `World` instance
/// rather than a process-wide static, per the "no mutable globals" redesign
/// flag in spec.md section 9.
#[derive(Default)]
pub struct ComponentRegistry {
    ids: FxHashMap<TypeId, ComponentId>,
    sizes: Vec<usize>,
    next_id: ComponentId,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        ComponentRegistry { ids: FxHashMap::default(), sizes: vec![0], next_id: 1 }
    }

    /// Looks up `T`'s id without registering it. Used by read-only query
    /// paths (`for_each`) which must not mutate shared registry state from
    /// multiple concurrent reader threads.
    pub fn try_id_of<T: Component>(&self) -> Option<ComponentId> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    pub fn id_of<T: Component>(&mut self, max_components: usize) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.ids.get(&type_id) {
            return id;
        }
        let id = self.next_id;
        assert!(
            id <= max_components,
            "component id {} exceeds ECS_MAX_COMPONENTS ({})",
            id,
            max_components
        );
        self.next_id += 1;
        self.ids.insert(type_id, id);
        self.sizes.push(std::mem::size_of::<T>());
        id
    }

    pub fn size_of(&self, id: ComponentId) -> usize {
        self.sizes.get(id).copied().unwrap_or(0)
    }
}
