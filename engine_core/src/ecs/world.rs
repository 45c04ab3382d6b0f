use crate::alloc_bindings::AllocatorBindings;
use crate::config::EngineConfig;
use crate::ecs::archetype::{Archetype, ArchetypeHandle, EntityHandle};
use crate::ecs::component::{Component, ComponentId, ComponentRegistry};
use crate::ecs::mask::ComponentMask;
use crate::error::EngineError;

/// `{ component_mask, archetype_handle, index_in_archetype }` for one
/// entity (spec.md section 3, "Entity record").
#[derive(Debug, Clone, Copy)]
struct EntityRecord {
    mask: ComponentMask,
    archetype: ArchetypeHandle,
    index: usize,
}

pub const EMPTY_ARCHETYPE: ArchetypeHandle = 0;

/// Archetype-grouped entity storage. Structural edits
/// (`add_components`/`remove_components`) are single-threaded; `for_each`
/// may run from worker threads provided no structural edit is concurrent
/// (spec.md section 4.D, "Concurrency").
pub struct World {
    config: EngineConfig,
    bindings: AllocatorBindings,
    pub(crate) registry: ComponentRegistry,
    entities: Vec<EntityRecord>,
    archetypes: Vec<Archetype>,
}

impl World {
    pub fn new(config: EngineConfig, bindings: AllocatorBindings) -> Self {
        World {
            config,
            bindings,
            registry: ComponentRegistry::new(),
            entities: Vec::new(),
            archetypes: vec![Archetype::empty()],
        }
    }

    pub(crate) fn register_component<T: Component>(&mut self) -> ComponentId {
        self.registry.id_of::<T>(self.config.ecs_max_components)
    }

    pub fn create_entity(&mut self) -> Result<EntityHandle, EngineError> {
        if self.entities.len() >= self.config.ecs_max_entities {
            return Err(EngineError::CapacityExceeded("ECS_MAX_ENTITIES exceeded"));
        }
        let handle = self.entities.len() as EntityHandle;
        self.entities.push(EntityRecord { mask: ComponentMask::EMPTY, archetype: EMPTY_ARCHETYPE, index: 0 });
        self.archetypes[EMPTY_ARCHETYPE].push_empty_entity_handle(handle);
        Ok(handle)
    }

    pub fn add_components<S: super::query::ComponentList>(&mut self, entity: EntityHandle) -> Result<(), EngineError> {
        let new_mask_bits = S::register_mask(self);
        let record = self.entities[entity as usize];
        let new_mask = record.mask.union(&new_mask_bits);
        if new_mask == record.mask {
            return Ok(());
        }
        self.migrate(entity, new_mask, true)
    }

    pub fn remove_components<S: super::query::ComponentList>(&mut self, entity: EntityHandle) -> Result<(), EngineError> {
        let remove_mask = S::register_mask(self);
        let record = self.entities[entity as usize];
        let new_mask = record.mask.difference(&remove_mask);
        if new_mask == record.mask {
            return Ok(());
        }
        self.migrate(entity, new_mask, false)
    }

    fn migrate(&mut self, entity: EntityHandle, new_mask: ComponentMask, superset: bool) -> Result<(), EngineError> {
        let old_archetype = self.entities[entity as usize].archetype;
        let old_index = self.entities[entity as usize].index;
        let new_archetype = self.match_or_create_archetype(new_mask)?;

        let old_mask = self.archetypes[old_archetype].mask;
        let new_index = self.archetypes[new_archetype].reserve_position(&self.bindings, self.config.ecs_chunk_bytes);

        // Superset path iterates the source mask (everything the entity
        // already has); subset path iterates the destination mask (only
        // what survives the removal) — spec.md section 4.D, "Migration".
        let copy_mask = if superset { old_mask } else { new_mask };
        for id in 1..=self.config.ecs_max_components {
            if !copy_mask.get(id) {
                continue;
            }
            let size = self.registry.size_of(id);
            if size == 0 {
                continue;
            }
            let from = self.archetypes[old_archetype].component_ptr(id, old_index, &self.registry);
            let to = self.archetypes[new_archetype].component_ptr(id, new_index, &self.registry);
            if let (Some(from), Some(to)) = (from, to) {
                unsafe { std::ptr::copy_nonoverlapping(from, to, size) };
            }
        }
        self.archetypes[new_archetype].set_entity_handle(new_index, entity);
        self.archetypes[old_archetype].free_position(old_index, &self.registry, self.config.ecs_max_components);
        self.fix_up_swapped_entity(old_archetype, old_index);

        self.entities[entity as usize] = EntityRecord { mask: new_mask, archetype: new_archetype, index: new_index };
        Ok(())
    }

    /// `free_position` swap-with-last may have relocated a different entity
    /// into the slot just vacated; that entity's record must follow.
    fn fix_up_swapped_entity(&mut self, archetype: ArchetypeHandle, index: usize) {
        if archetype == EMPTY_ARCHETYPE {
            return;
        }
        if index >= self.archetypes[archetype].size {
            return;
        }
        let moved_entity = self.archetypes[archetype].entity_handle(index);
        self.entities[moved_entity as usize].index = index;
    }

    fn match_or_create_archetype(&mut self, mask: ComponentMask) -> Result<ArchetypeHandle, EngineError> {
        if mask.is_empty() {
            return Ok(EMPTY_ARCHETYPE);
        }
        if let Some(handle) = self.archetypes.iter().position(|a| a.mask == mask) {
            return Ok(handle);
        }
        if self.archetypes.len() >= self.config.ecs_max_archetypes {
            return Err(EngineError::CapacityExceeded("ECS_MAX_ARCHETYPES exceeded"));
        }
        let handle = self.archetypes.len();
        self.archetypes.push(Archetype::new(
            handle,
            mask,
            &self.registry,
            self.config.ecs_max_components,
            self.config.ecs_chunk_bytes,
        ));
        tracing::trace!(handle, "archetype created");
        Ok(handle)
    }

    pub fn get_component<T: Component>(&self, entity: EntityHandle) -> Option<&T> {
        let id = self.registry.try_id_of::<T>()?;
        let record = self.entities.get(entity as usize)?;
        if !record.mask.get(id) {
            return None;
        }
        let ptr = self.archetypes[record.archetype].component_ptr(id, record.index, &self.registry)?;
        Some(unsafe { &*(ptr as *const T) })
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityHandle) -> Option<&mut T> {
        let id = self.registry.try_id_of::<T>()?;
        let record = *self.entities.get(entity as usize)?;
        if !record.mask.get(id) {
            return None;
        }
        let ptr = self.archetypes[record.archetype].component_ptr(id, record.index, &self.registry)?;
        Some(unsafe { &mut *(ptr as *mut T) })
    }

    /// Visits every archetype whose mask is a superset of `Q`'s component
    /// set, invoking `f` once per entity with pointers into chunk storage.
    /// Visitation order across archetypes is unspecified; within an
    /// archetype, order is the packed-array order (spec.md section 4.D).
    pub fn for_each<'w, Q: super::query::Query<'w>>(&'w self, mut f: impl FnMut(EntityHandle, Q::Item)) {
        let query_mask = match Q::try_mask(self) {
            Some(mask) => mask,
            None => return,
        };
        for archetype in &self.archetypes {
            if archetype.is_empty_archetype() && !query_mask.is_empty() {
                continue;
            }
            if !archetype.mask.is_superset_of(&query_mask) {
                continue;
            }
            for index in 0..archetype.size {
                let entity = archetype.entity_handle(index);
                let item = unsafe { Q::fetch(archetype, index, self) };
                f(entity, item);
            }
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub(crate) fn max_components(&self) -> usize {
        self.config.ecs_max_components
    }
}
