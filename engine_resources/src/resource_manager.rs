use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use engine_core::handle::ResourceHandle;
use engine_core::jobs::{JobSystems, SystemKind};
use fxhash::FxHashMap;
use parking_lot::Mutex;

use crate::backend::RenderBackend;
use crate::filesystem::{FileHandle, FileLoadMode, FileSystem};
use crate::obj::{parse_obj, Mesh};
use crate::renderer_handles::{HandleTable, RendererHandle};

/// `{valid, index}` per spec.md §3's "Resource handle"; `index` addresses
/// the manager's internal table. A handle is always born valid — failure
/// is tracked on the table entry itself (see `TextureResource::valid` /
/// `MeshResource::valid`) since the caller's copy of the handle can't be
/// mutated retroactively once the async load it started fails.
pub type TextureResourceHandle = ResourceHandle;
pub type MeshResourceHandle = ResourceHandle;

struct TextureResource {
    path: String,
    renderer_handle: RendererHandle,
    valid: AtomicBool,
}

/// GPU handles reserved for one submesh's draw data, filled in once the
/// render-system creation job runs (spec.md "resources" module).
#[derive(Debug, Clone, Copy)]
pub struct RenderSubmesh {
    pub vertex_buffer: RendererHandle,
    pub index_buffer: RendererHandle,
    pub vertex_array: RendererHandle,
}

struct MeshResource {
    path: String,
    render_submeshes: Mutex<Vec<RenderSubmesh>>,
    valid: AtomicBool,
}

/// Deduplicates resource loads by path, reserves renderer handles up front,
/// and chains the job graph that turns a file on disk into GPU-ready draw
/// data: `async_load` -> parse -> per-submesh buffer creation. Grounded in
/// `original_source/engine/resources/resource_manager.{h,cpp}`.
pub struct ResourceManager {
    jobs: Arc<JobSystems>,
    file_system: Arc<FileSystem>,
    backend: Arc<dyn RenderBackend>,
    textures: Mutex<Vec<TextureResource>>,
    texture_index: Mutex<FxHashMap<String, TextureResourceHandle>>,
    texture_handles: HandleTable,
    meshes: Mutex<Vec<Arc<MeshResource>>>,
    mesh_index: Mutex<FxHashMap<String, MeshResourceHandle>>,
    vertex_buffer_handles: HandleTable,
    index_buffer_handles: HandleTable,
    vertex_array_handles: HandleTable,
}

impl ResourceManager {
    pub fn construct(jobs: Arc<JobSystems>, file_system: Arc<FileSystem>, backend: Arc<dyn RenderBackend>) -> Arc<Self> {
        Arc::new(ResourceManager {
            jobs,
            file_system,
            backend,
            textures: Mutex::new(Vec::new()),
            texture_index: Mutex::new(FxHashMap::default()),
            texture_handles: HandleTable::new(),
            meshes: Mutex::new(Vec::new()),
            mesh_index: Mutex::new(FxHashMap::default()),
            vertex_buffer_handles: HandleTable::new(),
            index_buffer_handles: HandleTable::new(),
            vertex_array_handles: HandleTable::new(),
        })
    }

    /// Idempotent: a second call with the same path returns the handle
    /// registered by the first without touching the backend again.
    pub fn add_texture_resource(&self, path: &str) -> TextureResourceHandle {
        if let Some(&handle) = self.texture_index.lock().get(path) {
            tracing::debug!(path, "texture resource already registered");
            return handle;
        }
        tracing::info!(path, "adding texture resource");
        let renderer_handle = self.texture_handles.reserve();
        let mut textures = self.textures.lock();
        let handle = TextureResourceHandle::new(textures.len() as u64);
        textures.push(TextureResource { path: path.to_string(), renderer_handle, valid: AtomicBool::new(true) });
        drop(textures);
        self.texture_index.lock().insert(path.to_string(), handle);

        let backend = self.backend.clone();
        let path = path.to_string();
        let job = self.jobs.get_job(SystemKind::Render);
        self.jobs.configure(job, move || backend.create_texture_2d(renderer_handle, &path));
        self.jobs.start_job(job);
        handle
    }

    pub fn get_texture_resource(&self, path: &str) -> Option<TextureResourceHandle> {
        self.texture_index.lock().get(path).copied()
    }

    pub fn get_renderer_texture_handle(&self, handle: TextureResourceHandle) -> Option<RendererHandle> {
        let index = handle.index()? as usize;
        let textures = self.textures.lock();
        let texture = textures.get(index)?;
        texture.valid.load(Ordering::Acquire).then_some(texture.renderer_handle)
    }

    /// Idempotent: starts `async_load`, chains a post-load parse job with
    /// `set_after`, then one render-system buffer-creation job per submesh.
    /// Returns immediately; the mesh is not ready for rendering until the
    /// whole chain has drained through `JobSystems`.
    pub fn add_mesh_resource(self: &Arc<Self>, path: &str) -> MeshResourceHandle {
        if let Some(&handle) = self.mesh_index.lock().get(path) {
            tracing::debug!(path, "mesh resource already registered");
            return handle;
        }
        tracing::info!(path, "adding mesh resource");
        let resource =
            Arc::new(MeshResource { path: path.to_string(), render_submeshes: Mutex::new(Vec::new()), valid: AtomicBool::new(true) });
        let mut meshes = self.meshes.lock();
        let handle = MeshResourceHandle::new(meshes.len() as u64);
        meshes.push(resource.clone());
        drop(meshes);
        self.mesh_index.lock().insert(path.to_string(), handle);

        let (file_handle, load_job) = match self.file_system.async_load(path, FileLoadMode::Read) {
            Ok(pair) => pair,
            Err(error) => {
                // FileIo is fatal in debug builds, a failed resource in
                // release (spec.md §7): the handle was already handed back
                // to the caller, so failure is recorded on the table entry.
                engine_core::fatal!("failed to start mesh load for {}: {}", path, error);
                resource.valid.store(false, Ordering::Release);
                return handle;
            }
        };

        let post_load_job = self.jobs.get_job(SystemKind::Main);
        let this = self.clone();
        let path_owned = path.to_string();
        self.jobs.configure(post_load_job, move || {
            this.process_loaded_mesh(&path_owned, file_handle, resource);
        });
        self.jobs.set_after(post_load_job, load_job);
        self.jobs.start_job(post_load_job);
        handle
    }

    fn process_loaded_mesh(self: &Arc<Self>, path: &str, file_handle: FileHandle, resource: Arc<MeshResource>) {
        tracing::debug!(path, "processing loaded mesh");
        let bytes = self.file_system.contents(file_handle);
        self.file_system.free_handle(file_handle);
        // `contents` carries the trailing NUL the file system appends
        // (spec.md §4.E); the OBJ scanner works line-by-line and has no
        // notion of a C-string terminator, so strip it before parsing.
        let trimmed = bytes.strip_suffix(&[0u8]).unwrap_or(&bytes);
        let text = match std::str::from_utf8(trimmed) {
            Ok(text) => text,
            Err(error) => {
                // Non-UTF8 mesh content is treated as FileIo's sibling case:
                // fatal in debug, a failed (!valid) resource in release.
                engine_core::fatal!("mesh file {} is not valid utf-8: {}", path, error);
                resource.valid.store(false, Ordering::Release);
                return;
            }
        };
        let mesh = match parse_obj(text) {
            Ok(mesh) => mesh,
            Err(error) => {
                engine_core::fatal!("failed to parse mesh {}: {}", path, error);
                resource.valid.store(false, Ordering::Release);
                return;
            }
        };
        self.dispatch_submesh_render_jobs(mesh, resource);
    }

    fn dispatch_submesh_render_jobs(&self, mesh: Mesh, resource: Arc<MeshResource>) {
        for submesh in mesh.submeshes {
            tracing::debug!(name = submesh.name.as_str(), vertices = submesh.vertices.len(), "processing submesh");
            let render_submesh = RenderSubmesh {
                vertex_buffer: self.vertex_buffer_handles.reserve(),
                index_buffer: self.index_buffer_handles.reserve(),
                vertex_array: self.vertex_array_handles.reserve(),
            };
            resource.render_submeshes.lock().push(render_submesh);

            let backend = self.backend.clone();
            let job = self.jobs.get_job(SystemKind::Render);
            self.jobs.configure(job, move || {
                backend.create_index_buffer(render_submesh.index_buffer, &submesh.indices);
                backend.create_vertex_buffer(render_submesh.vertex_buffer, &submesh.vertices);
                backend.create_vertex_array(render_submesh.vertex_array, render_submesh.vertex_buffer, render_submesh.index_buffer);
            });
            self.jobs.start_job(job);
        }
    }

    pub fn get_mesh_resource(&self, path: &str) -> Option<MeshResourceHandle> {
        self.mesh_index.lock().get(path).copied()
    }

    /// Snapshots the renderer handles created so far for this mesh. Empty
    /// until the load/parse/create job chain has drained; `None` once the
    /// handle's load or parse step has failed and left it `!valid` (spec.md
    /// §7) — downstream draws detect and skip it the same way.
    pub fn get_render_mesh(&self, handle: MeshResourceHandle) -> Option<Vec<RenderSubmesh>> {
        let index = handle.index()? as usize;
        let meshes = self.meshes.lock();
        let mesh = meshes.get(index)?;
        mesh.valid.load(Ordering::Acquire).then(|| mesh.render_submeshes.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullRenderBackend;
    use engine_core::config::EngineConfig;
    use std::io::Write;

    fn harness() -> (Arc<JobSystems>, Arc<ResourceManager>) {
        let config = EngineConfig::default();
        let jobs = JobSystems::construct(&config, Some(2));
        let fs = FileSystem::construct(&config, jobs.clone());
        let backend = Arc::new(NullRenderBackend::new());
        let manager = ResourceManager::construct(jobs.clone(), fs, backend);
        (jobs, manager)
    }

    #[test]
    fn add_texture_resource_is_idempotent() {
        let (jobs, manager) = harness();
        let a = manager.add_texture_resource("textures/brick.png");
        let b = manager.add_texture_resource("textures/brick.png");
        assert_eq!(a, b);
        jobs.destruct();
    }

    // S6: a one-triangle OBJ file runs through async_load -> parse ->
    // per-submesh render-resource creation, and the backend observes
    // exactly the calls the mesh implies.
    #[test]
    fn s6_mesh_pipeline_drains_into_backend_calls() {
        let (jobs, manager) = harness();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "o tri").unwrap();
        writeln!(file, "v 0.0 0.0 0.0").unwrap();
        writeln!(file, "v 1.0 0.0 0.0").unwrap();
        writeln!(file, "v 0.0 1.0 0.0").unwrap();
        writeln!(file, "f 1 2 3").unwrap();
        let path = file.path().to_str().unwrap();

        let handle = manager.add_mesh_resource(path);
        // Drain both systems until the chain (main load/parse, render
        // buffer creation) has nothing left to do.
        for _ in 0..1000 {
            let drained_render = !jobs.dispatch_one(SystemKind::Render);
            if drained_render && manager.get_render_mesh(handle).map(|s| !s.is_empty()).unwrap_or(false) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let submeshes = manager.get_render_mesh(handle).unwrap();
        assert_eq!(submeshes.len(), 1);
        jobs.destruct();
    }

    // spec.md §7: a malformed mesh leaves its handle `!valid` in release
    // builds rather than taking the process down. Debug builds take the
    // `fatal!` branch instead (a hard abort), so this only holds in release.
    #[test]
    #[cfg(not(debug_assertions))]
    fn malformed_mesh_leaves_handle_invalid_in_release_builds() {
        let (jobs, manager) = harness();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "o bad").unwrap();
        writeln!(file, "v 0.0 0.0 0.0").unwrap();
        writeln!(file, "f not-a-number 2 3").unwrap();
        let path = file.path().to_str().unwrap();

        let handle = manager.add_mesh_resource(path);
        let mut result = manager.get_render_mesh(handle);
        for _ in 0..1000 {
            if result.is_none() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
            result = manager.get_render_mesh(handle);
        }

        assert!(result.is_none(), "malformed mesh should leave the handle !valid");
        jobs.destruct();
    }
}
