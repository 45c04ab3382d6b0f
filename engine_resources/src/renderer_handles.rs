use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

use engine_core::handle::ResourceHandle;

/// A `{valid, index}` handle into one of the renderer's GPU resource tables
/// (texture, index buffer, vertex buffer, vertex array), grounded in
/// `original_source/engine/resources/resource_manager.h`'s
/// `RendererTexture2dHandle` / `reserve_texture_2d` family (spec.md §3,
/// "Renderer handle"). Every handle a `HandleTable` hands out is valid —
/// `RendererHandle::invalid()` exists only as the placeholder a caller can
/// hold before reservation happens.
pub type RendererHandle = ResourceHandle;

/// A lock-free free-list over one GPU resource class: reservation pops a
/// recycled index if one exists, otherwise grows the table. `release`
/// returns an index to circulation without ever blocking a caller on the
/// render thread.
pub struct HandleTable {
    free: SegQueue<u64>,
    next: AtomicUsize,
}

impl Default for HandleTable {
    fn default() -> Self {
        HandleTable { free: SegQueue::new(), next: AtomicUsize::new(0) }
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&self) -> RendererHandle {
        match self.free.pop() {
            Ok(index) => RendererHandle::new(index),
            Err(_) => RendererHandle::new(self.next.fetch_add(1, Ordering::Relaxed) as u64),
        }
    }

    pub fn release(&self, handle: RendererHandle) {
        if let Some(index) = handle.index() {
            self.free.push(index);
        }
    }
}
