use crate::alloc_bindings::AllocatorBindings;
use crate::ecs::chunk::Chunk;
use crate::ecs::component::{ComponentId, ComponentRegistry};
use crate::ecs::mask::ComponentMask;

pub type ArchetypeHandle = usize;
pub type EntityHandle = u64;

/// One record per unique component mask observed. Holds the mask, a list of
/// fixed-size chunks, per-component byte offsets into each chunk, the
/// computed `single_chunk_capacity`, and the dense entity-handle array.
/// Grounded in `original_source/engine/ecs/ecs.h`'s `Archetype` /
/// `ecs.cpp`'s `ecs_create_archetype`.
pub struct Archetype {
    pub mask: ComponentMask,
    pub self_handle: ArchetypeHandle,
    offsets: Vec<Option<usize>>,
    chunks: Vec<Chunk>,
    single_chunk_capacity: usize,
    pub size: usize,
    pub capacity: usize,
    entity_handles: Vec<EntityHandle>,
}

impl Archetype {
    /// Builds the empty archetype at handle 0: zero capacity, no chunks,
    /// returns index 0 from `reserve_position` without allocating.
    pub fn empty() -> Self {
        Archetype {
            mask: ComponentMask::EMPTY,
            self_handle: 0,
            offsets: Vec::new(),
            chunks: Vec::new(),
            single_chunk_capacity: 0,
            size: 0,
            capacity: 0,
            entity_handles: Vec::new(),
        }
    }

    /// A freshly created non-empty archetype computes
    /// `single_chunk_capacity = chunk_bytes / sum(size(Ti))` and per-component
    /// offsets within a chunk, packed by ascending component id.
    pub fn new(
        self_handle: ArchetypeHandle,
        mask: ComponentMask,
        registry: &ComponentRegistry,
        max_components: usize,
        chunk_bytes: usize,
    ) -> Self {
        let mut offsets = vec![None; max_components + 1];
        let mut single_entry_size = 0usize;
        for id in 1..=max_components {
            if !mask.get(id) {
                continue;
            }
            single_entry_size += registry.size_of(id);
        }
        let single_chunk_capacity = if single_entry_size == 0 { 0 } else { chunk_bytes / single_entry_size };
        let mut current_offset = 0usize;
        for id in 1..=max_components {
            if !mask.get(id) {
                continue;
            }
            offsets[id] = Some(current_offset);
            current_offset += registry.size_of(id) * single_chunk_capacity;
        }
        Archetype {
            mask,
            self_handle,
            offsets,
            chunks: Vec::new(),
            single_chunk_capacity,
            size: 0,
            capacity: 0,
            entity_handles: Vec::new(),
        }
    }

    pub fn is_empty_archetype(&self) -> bool {
        self.mask.is_empty()
    }

    /// Reserves a slot: allocates a new chunk from the pool allocator when
    /// `size == capacity`, then returns the old `size` and increments it.
    /// The empty archetype always returns index 0 without allocating.
    pub fn reserve_position(&mut self, bindings: &AllocatorBindings, chunk_bytes: usize) -> usize {
        if self.is_empty_archetype() {
            return 0;
        }
        if self.size == self.capacity {
            self.chunks.push(Chunk::new(bindings.clone(), chunk_bytes));
            self.capacity += self.single_chunk_capacity;
        }
        let position = self.size;
        self.size += 1;
        self.entity_handles.push(0);
        position
    }

    /// Swap-with-last free: if `index` is the last slot, zero its component
    /// bytes and shrink; otherwise memcpy the last slot's data down into
    /// `index`, zero the last slot, and fix up the trailing entity handle.
    /// Preserves the packed-array invariant (spec.md section 4.D).
    pub fn free_position(&mut self, index: usize, registry: &ComponentRegistry, max_components: usize) {
        if self.is_empty_archetype() {
            return;
        }
        debug_assert!(self.size != 0, "free_position called on an empty archetype");
        let last_index = self.size - 1;
        if index == last_index {
            for id in 1..=max_components {
                if let Some(ptr) = self.component_ptr(id, index, registry) {
                    unsafe { std::ptr::write_bytes(ptr, 0, registry.size_of(id)) };
                }
            }
            self.entity_handles.pop();
            self.size -= 1;
            return;
        }
        for id in 1..=max_components {
            let size = registry.size_of(id);
            if size == 0 {
                continue;
            }
            if let (Some(from), Some(to)) =
                (self.component_ptr(id, last_index, registry), self.component_ptr(id, index, registry))
            {
                unsafe {
                    std::ptr::copy_nonoverlapping(from, to, size);
                    std::ptr::write_bytes(from, 0, size);
                }
            }
        }
        self.entity_handles[index] = self.entity_handles[last_index];
        self.entity_handles.pop();
        self.size -= 1;
    }

    pub fn set_entity_handle(&mut self, index: usize, handle: EntityHandle) {
        self.entity_handles[index] = handle;
    }

    /// The empty archetype has no chunk storage, so `create_entity` can't
    /// go through `reserve_position`; it grows the handle list directly.
    pub fn push_empty_entity_handle(&mut self, handle: EntityHandle) {
        self.size += 1;
        self.entity_handles.push(handle);
    }

    pub fn entity_handle(&self, index: usize) -> EntityHandle {
        self.entity_handles[index]
    }

    pub fn entity_handles(&self) -> &[EntityHandle] {
        &self.entity_handles
    }

    /// `chunk[i / cap][offset(c) + (i % cap) * size(c)]`, or `None` if the
    /// component isn't in this archetype's mask or `index` is out of range.
    pub fn component_ptr(&self, id: ComponentId, index: usize, registry: &ComponentRegistry) -> Option<*mut u8> {
        if index >= self.size {
            return None;
        }
        let offset = (*self.offsets.get(id)?)?;
        let chunk_index = index / self.single_chunk_capacity;
        let in_chunk_index = index % self.single_chunk_capacity;
        let chunk = self.chunks.get(chunk_index)?;
        let stride = registry.size_of(id);
        Some(unsafe { chunk.as_ptr().add(offset + in_chunk_index * stride) })
    }
}
