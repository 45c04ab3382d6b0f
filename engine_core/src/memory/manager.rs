use std::sync::Arc;

use super::arena::Arena;
use super::pool::PoolAllocator;
use super::stack::StackAllocator;
use crate::alloc_bindings::{get_bindings, Allocator, AllocatorBindings, SystemAllocator};
use crate::config::EngineConfig;

/// Owns the one large OS-allocated arena and exposes the stack allocator
/// (process-lifetime allocations) and the pool allocator (variable-size,
/// recyclable allocations) carved out of it. Grounded in
/// `original_source/engine/memory/memory_manager.{h,cpp}`.
pub struct MemoryManager {
    _arena: Arena,
    stack: parking_lot::Mutex<StackAllocator>,
    pool: PoolAllocator,
}

impl MemoryManager {
    pub fn construct(config: &EngineConfig) -> Self {
        let arena = Arena::new(config.arena_size, config.default_alignment);
        let stack = StackAllocator::new(&arena, config.default_alignment);
        tracing::info!(arena_size = config.arena_size, "memory manager constructed");
        // The pool allocator draws its own backing storage from the system
        // allocator rather than the stack, mirroring the original's
        // `construct(&manager->pool, poolContainer, get_allocator_bindings(&manager->stack))`
        // only in spirit: since buckets never need to be freed individually
        // before process exit, going through the stack would just be a
        // second bump allocator with no reclaim story either way.
        let system_bindings = get_bindings(Arc::new(SystemAllocator));
        let pool = PoolAllocator::new(config, &system_bindings);
        MemoryManager { _arena: arena, stack: parking_lot::Mutex::new(stack), pool }
    }

    pub fn stack_allocate(&self, size: usize) -> Result<*mut u8, crate::error::EngineError> {
        self.stack.lock().allocate(size)
    }

    pub fn stack_mark(&self) -> super::stack::Mark {
        self.stack.lock().mark()
    }

    pub fn stack_reset_to(&self, mark: super::stack::Mark) {
        self.stack.lock().reset_to(mark)
    }

    pub fn pool(&self) -> &PoolAllocator {
        &self.pool
    }

    pub fn pool_bindings(self: &Arc<Self>) -> AllocatorBindings {
        get_bindings(self.clone())
    }
}

impl Allocator for MemoryManager {
    fn allocate(&self, size: usize) -> *mut u8 {
        self.pool.allocate(size).unwrap_or(std::ptr::null_mut())
    }

    fn deallocate(&self, ptr: *mut u8, size: usize) {
        self.pool.deallocate(ptr, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_and_allocate_from_both_tiers() {
        let config = EngineConfig::default();
        let manager = MemoryManager::construct(&config);
        let stack_ptr = manager.stack_allocate(64).unwrap();
        assert!(!stack_ptr.is_null());
        let pool_ptr = manager.pool().allocate(16).unwrap();
        assert!(!pool_ptr.is_null());
    }
}
