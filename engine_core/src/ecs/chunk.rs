use crate::alloc_bindings::AllocatorBindings;

/// A single pool allocation backing one slab of an archetype's parallel
/// component arrays (spec.md section 3, "Archetype" / "Chunk"). Owns its
/// memory and releases it through the same bindings it was allocated with.
pub(crate) struct Chunk {
    ptr: *mut u8,
    size: usize,
    bindings: AllocatorBindings,
}

unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    pub(crate) fn new(bindings: AllocatorBindings, size: usize) -> Self {
        let ptr = bindings.allocate(size);
        assert!(!ptr.is_null(), "pool allocator failed to serve an archetype chunk");
        unsafe { std::ptr::write_bytes(ptr, 0, size) };
        Chunk { ptr, size, bindings }
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        self.bindings.deallocate(self.ptr, self.size);
    }
}
