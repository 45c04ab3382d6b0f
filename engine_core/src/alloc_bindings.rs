use std::sync::Arc;

/// A concrete allocator a component can be handed without knowing which one
/// it is. Implemented by `StackAllocator`, `PoolAllocator` and the system
/// allocator escape hatch.
pub trait Allocator: Send + Sync {
    fn allocate(&self, size: usize) -> *mut u8;
    fn deallocate(&self, ptr: *mut u8, size: usize);
}

/// A capability handle: `{ allocate_fn, deallocate_fn, allocator_ref }` from
/// spec.md section 3, minus the raw function pointers — Rust's trait objects
/// give the same decoupling without hand-rolled vtables. Cheap to clone
/// (`Arc`), so containers store it by value the way the original stores the
/// `AllocatorBindings` trio by value.
#[derive(Clone)]
pub struct AllocatorBindings {
    allocator: Arc<dyn Allocator>,
}

impl AllocatorBindings {
    pub fn new(allocator: Arc<dyn Allocator>) -> Self {
        AllocatorBindings { allocator }
    }

    pub fn allocate(&self, size: usize) -> *mut u8 {
        self.allocator.allocate(size)
    }

    pub fn deallocate(&self, ptr: *mut u8, size: usize) {
        self.allocator.deallocate(ptr, size)
    }
}

/// The one-shot system-allocator escape hatch named in spec.md section 1's
/// non-goals ("no general-purpose heap fallback beyond a single system
/// allocator escape hatch").
#[derive(Debug, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize) -> *mut u8 {
        if size == 0 {
            return std::ptr::NonNull::dangling().as_ptr();
        }
        let layout = std::alloc::Layout::from_size_align(size, std::mem::align_of::<usize>())
            .expect("invalid layout requested from system allocator");
        unsafe { std::alloc::alloc(layout) }
    }

    fn deallocate(&self, ptr: *mut u8, size: usize) {
        if size == 0 {
            return;
        }
        let layout = std::alloc::Layout::from_size_align(size, std::mem::align_of::<usize>())
            .expect("invalid layout requested from system allocator");
        unsafe { std::alloc::dealloc(ptr, layout) }
    }
}

pub fn get_bindings(allocator: Arc<dyn Allocator>) -> AllocatorBindings {
    AllocatorBindings::new(allocator)
}
