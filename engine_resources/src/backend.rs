use parking_lot::Mutex;

use crate::obj::MeshVertex;
use crate::renderer_handles::RendererHandle;

/// The out-of-scope collaborator boundary named in the resource_manager
/// module: a rendering API is explicitly a non-goal, so the resource
/// manager only ever calls through this trait. Grounded in
/// `original_source/engine/resources/resource_manager.cpp`'s calls into
/// `Renderer::get()->create_texture_2d`/`create_index_buffer`/etc.
pub trait RenderBackend: Send + Sync {
    fn create_texture_2d(&self, handle: RendererHandle, path: &str);
    fn create_index_buffer(&self, handle: RendererHandle, indices: &[u32]);
    fn create_vertex_buffer(&self, handle: RendererHandle, vertices: &[MeshVertex]);
    fn create_vertex_array(&self, handle: RendererHandle, vertex_buffer: RendererHandle, index_buffer: RendererHandle);
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateTexture2d { handle: RendererHandle, path: String },
    CreateIndexBuffer { handle: RendererHandle, index_count: usize },
    CreateVertexBuffer { handle: RendererHandle, vertex_count: usize },
    CreateVertexArray { handle: RendererHandle, vertex_buffer: RendererHandle, index_buffer: RendererHandle },
}

/// A GPU-less test double: records every call instead of touching a device.
/// Used to exercise `add_texture_resource`/`add_mesh_resource` end to end in
/// tests without a render context.
#[derive(Default)]
pub struct NullRenderBackend {
    calls: Mutex<Vec<BackendCall>>,
}

impl NullRenderBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }
}

impl RenderBackend for NullRenderBackend {
    fn create_texture_2d(&self, handle: RendererHandle, path: &str) {
        self.calls.lock().push(BackendCall::CreateTexture2d { handle, path: path.to_string() });
    }

    fn create_index_buffer(&self, handle: RendererHandle, indices: &[u32]) {
        self.calls.lock().push(BackendCall::CreateIndexBuffer { handle, index_count: indices.len() });
    }

    fn create_vertex_buffer(&self, handle: RendererHandle, vertices: &[MeshVertex]) {
        self.calls.lock().push(BackendCall::CreateVertexBuffer { handle, vertex_count: vertices.len() });
    }

    fn create_vertex_array(&self, handle: RendererHandle, vertex_buffer: RendererHandle, index_buffer: RendererHandle) {
        self.calls.lock().push(BackendCall::CreateVertexArray { handle, vertex_buffer, index_buffer });
    }
}
