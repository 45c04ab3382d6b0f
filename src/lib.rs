//! Top-level wiring for the forge engine core: a single `EngineContext`
//! constructed in a fixed order and threaded by reference through the
//! application, in place of the original's global singleton instances
//! (spec.md section 9, "Global singletons for manager instances").

use std::sync::Arc;
use std::sync::Once;

use engine_core::alloc_bindings::{get_bindings, SystemAllocator};
use engine_core::config::EngineConfig;
use engine_core::ecs::World;
use engine_core::jobs::JobSystems;
use engine_core::memory::MemoryManager;
use engine_resources::backend::{NullRenderBackend, RenderBackend};
use engine_resources::filesystem::FileSystem;
use engine_resources::resource_manager::ResourceManager;

static LOGGING: Once = Once::new();

/// Installs a `tracing_subscriber::fmt` subscriber exactly once. Safe to
/// call from multiple `#[test]` functions.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}

/// Owns every subsystem constructed by `engine_init`. There is no global
/// mutable instance of this type anywhere in the crate; callers hold it and
/// pass `&EngineContext`/`&mut EngineContext` down into their own code.
pub struct EngineContext {
    pub memory: Arc<MemoryManager>,
    pub jobs: Arc<JobSystems>,
    pub world: World,
    pub files: Arc<FileSystem>,
    pub resources: Arc<ResourceManager>,
}

/// Constructs every subsystem in the fixed order spec.md section 6 requires:
/// memory manager, then both job systems (which may draw stack allocations
/// during worker thread setup), then file system, then resource manager.
pub fn engine_init(config: EngineConfig) -> EngineContext {
    engine_init_with_backend(config, Arc::new(NullRenderBackend::new()))
}

pub fn engine_init_with_backend(config: EngineConfig, backend: Arc<dyn RenderBackend>) -> EngineContext {
    let memory = Arc::new(MemoryManager::construct(&config));
    let jobs = JobSystems::construct(&config, None);
    let world = World::new(config.clone(), memory.pool_bindings());
    let files = FileSystem::construct(&config, jobs.clone());
    let resources = ResourceManager::construct(jobs.clone(), files.clone(), backend);
    tracing::info!("engine context constructed");
    EngineContext { memory, jobs, world, files, resources }
}

/// Tears down in the reverse of construction order.
pub fn engine_shutdown(context: EngineContext) {
    drop(context.resources);
    drop(context.files);
    context.jobs.destruct();
    drop(context.world);
    drop(context.memory);
    tracing::info!("engine context shut down");
}

/// A standalone, process-wide `Allocator` escape hatch for code that needs
/// one before an `EngineContext` exists (spec.md section 1 non-goals: "no
/// general-purpose heap fallback beyond a single system allocator escape
/// hatch").
pub fn system_allocator_bindings() -> engine_core::alloc_bindings::AllocatorBindings {
    get_bindings(Arc::new(SystemAllocator))
}
