use parking_lot::Mutex;

use super::bucket::MemoryBucket;
use crate::alloc_bindings::{Allocator, AllocatorBindings};
use crate::config::EngineConfig;
use crate::error::EngineError;

/// A small ordered set of buckets serving variable-size, recyclable
/// allocations by best fit. Grounded in
/// `original_source/engine/memory/pool_allocator.cpp`'s `allocate`: for each
/// bucket compute `(blocks_used, wasted_bytes)`, sort ascending, attempt in
/// that order. The `(ptr -> size)` registry backs the `*_untracked` trio for
/// third-party APIs that track only pointers (e.g. stbi-style callers in the
/// original).
pub struct PoolAllocator {
    buckets: Vec<MemoryBucket>,
    untracked: Mutex<fxhash::FxHashMap<usize, usize>>,
}

struct BucketCompareInfo {
    bucket_index: usize,
    blocks_used: usize,
    wasted_bytes: usize,
}

impl PoolAllocator {
    pub fn new(config: &EngineConfig, bindings: &AllocatorBindings) -> Self {
        let buckets = config
            .resolved_buckets()
            .into_iter()
            .map(|(block_size, block_count)| MemoryBucket::new(block_size, block_count, bindings))
            .collect();
        PoolAllocator { buckets, untracked: Mutex::new(fxhash::FxHashMap::default()) }
    }

    pub fn allocate(&self, size: usize) -> Result<*mut u8, EngineError> {
        let mut infos: Vec<BucketCompareInfo> = self
            .buckets
            .iter()
            .enumerate()
            .map(|(i, bucket)| {
                let (blocks_used, wasted_bytes) = if bucket.block_size >= size {
                    (1, bucket.block_size - size)
                } else {
                    let blocks = 1 + (size - 1) / bucket.block_size;
                    (blocks, blocks * bucket.block_size - size)
                };
                BucketCompareInfo { bucket_index: i, blocks_used, wasted_bytes }
            })
            .collect();
        infos.sort_by(|a, b| {
            a.wasted_bytes.cmp(&b.wasted_bytes).then(a.blocks_used.cmp(&b.blocks_used))
        });
        for info in &infos {
            if let Some(ptr) = self.buckets[info.bucket_index].allocate(size) {
                return Ok(ptr);
            }
        }
        Err(EngineError::OutOfMemory("no pool bucket could serve the request"))
    }

    pub fn deallocate(&self, ptr: *mut u8, size: usize) {
        for bucket in &self.buckets {
            if bucket.is_belongs(ptr) {
                bucket.deallocate(ptr, size);
                return;
            }
        }
        debug_assert!(false, "deallocate called with a pointer owned by no bucket");
    }

    pub fn allocate_untracked(&self, size: usize) -> Result<*mut u8, EngineError> {
        let ptr = self.allocate(size)?;
        self.untracked.lock().insert(ptr as usize, size);
        Ok(ptr)
    }

    pub fn deallocate_untracked(&self, ptr: *mut u8) {
        let size = self.untracked.lock().remove(&(ptr as usize));
        if let Some(size) = size {
            self.deallocate(ptr, size);
        } else {
            debug_assert!(false, "deallocate_untracked called with an unregistered pointer");
        }
    }

    pub fn reallocate_untracked(&self, ptr: *mut u8, new_size: usize) -> Result<*mut u8, EngineError> {
        let old_size = *self
            .untracked
            .lock()
            .get(&(ptr as usize))
            .expect("reallocate_untracked called with an unregistered pointer");
        let new_ptr = self.allocate_untracked(new_size)?;
        let copy_size = old_size.min(new_size);
        unsafe { std::ptr::copy_nonoverlapping(ptr, new_ptr, copy_size) };
        self.deallocate_untracked(ptr);
        Ok(new_ptr)
    }

    #[cfg(test)]
    pub fn buckets(&self) -> &[MemoryBucket] {
        &self.buckets
    }
}

impl Allocator for PoolAllocator {
    fn allocate(&self, size: usize) -> *mut u8 {
        PoolAllocator::allocate(self, size).unwrap_or(std::ptr::null_mut())
    }

    fn deallocate(&self, ptr: *mut u8, size: usize) {
        PoolAllocator::deallocate(self, ptr, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc_bindings::{get_bindings, SystemAllocator};
    use std::sync::Arc;

    fn bindings() -> AllocatorBindings {
        get_bindings(Arc::new(SystemAllocator))
    }

    fn config_with(buckets: Vec<(usize, usize)>) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.pool_bucket_mix = buckets
            .iter()
            .map(|&(block_size, _)| crate::config::BucketMix { block_size, fraction_percent: 0 })
            .collect();
        config
    }

    // S1: pool with buckets {16B x 1024, 128B x 64, 1KiB x 16}; two
    // allocate(20) calls are both served from the 128-byte bucket because it
    // wastes less than the 1KiB bucket and the 16-byte bucket can't fit 20
    // bytes in one block.
    #[test]
    fn s1_best_fit_selects_smallest_waste_bucket() {
        let pool = PoolAllocatorHarness::new(vec![(16, 1024), (128, 64), (1024, 16)]);
        let p1 = pool.allocate(20).unwrap();
        let p2 = pool.allocate(20).unwrap();
        let bucket128 = &pool.allocator.buckets()[1];
        assert!(bucket128.is_belongs(p1));
        assert!(bucket128.is_belongs(p2));
        assert_eq!(bucket128.blocks_in_use(), 2);
    }

    struct PoolAllocatorHarness {
        allocator: PoolAllocator,
    }

    impl PoolAllocatorHarness {
        fn new(buckets: Vec<(usize, usize)>) -> Self {
            let bindings = bindings();
            let bucket_objs = buckets
                .into_iter()
                .map(|(block_size, block_count)| MemoryBucket::new(block_size, block_count, &bindings))
                .collect();
            PoolAllocatorHarness {
                allocator: PoolAllocator { buckets: bucket_objs, untracked: Mutex::new(fxhash::FxHashMap::default()) },
            }
        }

        fn allocate(&self, size: usize) -> Result<*mut u8, EngineError> {
            self.allocator.allocate(size)
        }
    }

    #[test]
    fn untracked_roundtrip_preserves_contents() {
        let config = config_with(vec![(16, 64)]);
        let pool = PoolAllocator::new(&config, &bindings());
        let ptr = pool.allocate_untracked(10).unwrap();
        unsafe { std::ptr::write_bytes(ptr, 0xAB, 10) };
        let grown = pool.reallocate_untracked(ptr, 20).unwrap();
        let slice = unsafe { std::slice::from_raw_parts(grown, 10) };
        assert!(slice.iter().all(|&b| b == 0xAB));
        pool.deallocate_untracked(grown);
    }
}
