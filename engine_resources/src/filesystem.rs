use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use engine_core::config::EngineConfig;
use engine_core::error::{EngineError, EngineResult};
use engine_core::jobs::{JobHandle, JobSystems, SystemKind};
use parking_lot::Mutex;

/// `fopen` mode, grounded in `original_source/engine/file_system/file_load.h`'s
/// `LOAD_MODE_TO_STR` table. Only `Read` is exercised by the resource
/// pipeline; `Write` exists for API symmetry with the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLoadMode {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Loading,
    Loaded,
}

/// An index into the file system's handle table. Cheap to copy, stable
/// until `free_handle` is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(pub(crate) usize);

struct FileSlot {
    state: FileState,
    memory: Arc<[u8]>,
}

/// Owns the fixed-size table of in-flight file handles and dispatches
/// asynchronous reads onto the main job system's worker pool — there is no
/// OS-level async I/O here, just a synchronous read run off the calling
/// thread (spec.md "filesystem" module, "async is emulated by dispatch").
/// Grounded in `original_source/engine/file_system/file_system.{h,cpp}`.
pub struct FileSystem {
    slots: Mutex<Vec<Option<FileSlot>>>,
    max_handles: usize,
    max_async_reads: usize,
    async_path_max: usize,
    in_flight_reads: AtomicUsize,
    jobs: Arc<JobSystems>,
}

impl FileSystem {
    pub fn construct(config: &EngineConfig, jobs: Arc<JobSystems>) -> Arc<Self> {
        Arc::new(FileSystem {
            slots: Mutex::new(Vec::new()),
            max_handles: config.max_file_handles,
            max_async_reads: config.max_async_file_reads,
            async_path_max: config.async_path_max,
            in_flight_reads: AtomicUsize::new(0),
            jobs,
        })
    }

    /// Reads the whole file into memory synchronously on the calling thread.
    pub fn sync_load(&self, path: &str, mode: FileLoadMode) -> EngineResult<FileHandle> {
        tracing::debug!(path, ?mode, "sync file load requested");
        let memory = read_file(path)?;
        self.alloc_slot(FileState::Loaded, memory)
    }

    /// Reserves a `Loading` handle immediately, then dispatches the actual
    /// read onto the main job system. The returned job can be chained with
    /// `set_after` so downstream work only runs once the handle is `Loaded`.
    pub fn async_load(self: &Arc<Self>, path: &str, mode: FileLoadMode) -> EngineResult<(FileHandle, JobHandle)> {
        tracing::debug!(path, ?mode, "async file load requested");
        if path.len() > self.async_path_max {
            return Err(EngineError::CapacityExceeded("ASYNC_PATH_MAX exceeded"));
        }
        if self.in_flight_reads.fetch_add(1, Ordering::AcqRel) >= self.max_async_reads {
            self.in_flight_reads.fetch_sub(1, Ordering::AcqRel);
            return Err(EngineError::CapacityExceeded("MAX_ASYNC_FILE_READS exceeded"));
        }
        let handle = match self.alloc_slot(FileState::Loading, Arc::from(Vec::new())) {
            Ok(handle) => handle,
            Err(error) => {
                self.in_flight_reads.fetch_sub(1, Ordering::AcqRel);
                return Err(error);
            }
        };
        let job = self.jobs.get_job(SystemKind::Main);
        let fs = self.clone();
        let path = path.to_string();
        let index = handle.0;
        self.jobs.configure(job, move || {
            match read_file(&path) {
                Ok(memory) => fs.complete_loading(index, memory),
                Err(error) => tracing::error!(path, %error, "async file load failed"),
            }
            fs.in_flight_reads.fetch_sub(1, Ordering::AcqRel);
        });
        self.jobs.start_job(job);
        Ok((handle, job))
    }

    fn complete_loading(&self, index: usize, memory: Arc<[u8]>) {
        let mut slots = self.slots.lock();
        if let Some(Some(slot)) = slots.get_mut(index) {
            slot.memory = memory;
            slot.state = FileState::Loaded;
        }
    }

    pub fn state(&self, handle: FileHandle) -> FileState {
        self.slots.lock()[handle.0].as_ref().expect("use of a freed file handle").state
    }

    /// Clones out the handle's bytes. Cheap: contents are stored in an
    /// `Arc<[u8]>`, so this is a refcount bump, not a copy.
    pub fn contents(&self, handle: FileHandle) -> Arc<[u8]> {
        self.slots.lock()[handle.0].as_ref().expect("use of a freed file handle").memory.clone()
    }

    pub fn free_handle(&self, handle: FileHandle) {
        let mut slots = self.slots.lock();
        let slot = slots[handle.0].take();
        debug_assert!(
            slot.map(|s| s.state != FileState::Loading).unwrap_or(false),
            "freed a handle that was still loading or already free"
        );
    }

    fn alloc_slot(&self, state: FileState, memory: Arc<[u8]>) -> EngineResult<FileHandle> {
        let mut slots = self.slots.lock();
        if let Some(index) = slots.iter().position(|s| s.is_none()) {
            slots[index] = Some(FileSlot { state, memory });
            return Ok(FileHandle(index));
        }
        if slots.len() >= self.max_handles {
            return Err(EngineError::CapacityExceeded("MAX_FILE_HANDLES exceeded"));
        }
        slots.push(Some(FileSlot { state, memory }));
        Ok(FileHandle(slots.len() - 1))
    }
}

/// Reads the whole file and appends a trailing NUL, matching the original's
/// `allocate(size + 1)` / `buffer[size] = 0` convention (spec.md §4.E) so
/// text assets (OBJ, shader source) can be handed to C-string-expecting
/// callers without a copy.
fn read_file(path: &str) -> EngineResult<Arc<[u8]>> {
    let bytes = std::fs::read(path)?;
    let mut terminated = Vec::with_capacity(bytes.len() + 1);
    terminated.extend_from_slice(&bytes);
    terminated.push(0);
    Ok(Arc::from(terminated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::config::EngineConfig;
    use std::io::Write;

    fn test_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn sync_load_reads_full_contents() {
        let config = EngineConfig::default();
        let jobs = JobSystems::construct(&config, Some(1));
        let fs = FileSystem::construct(&config, jobs.clone());
        let file = test_file(b"hello world");

        let handle = fs.sync_load(file.path().to_str().unwrap(), FileLoadMode::Read).unwrap();
        assert_eq!(fs.state(handle), FileState::Loaded);
        let memory = fs.contents(handle);
        // S11: the loaded buffer is one byte longer than the file and ends
        // in a NUL terminator.
        assert_eq!(memory.len(), "hello world".len() + 1);
        assert_eq!(&memory[..memory.len() - 1], b"hello world");
        assert_eq!(memory[memory.len() - 1], 0);
        fs.free_handle(handle);
        jobs.destruct();
    }

    #[test]
    fn async_load_transitions_from_loading_to_loaded() {
        let config = EngineConfig::default();
        let jobs = JobSystems::construct(&config, Some(1));
        let fs = FileSystem::construct(&config, jobs.clone());
        let file = test_file(b"async payload");

        let (handle, job) = fs.async_load(file.path().to_str().unwrap(), FileLoadMode::Read).unwrap();
        jobs.wait_for(engine_core::jobs::SystemKind::Main, job);
        assert_eq!(fs.state(handle), FileState::Loaded);
        let memory = fs.contents(handle);
        assert_eq!(memory.len(), "async payload".len() + 1);
        assert_eq!(&memory[..memory.len() - 1], b"async payload");
        assert_eq!(memory[memory.len() - 1], 0);
        jobs.destruct();
    }

    #[test]
    fn freed_slot_is_reused_by_next_allocation() {
        let config = EngineConfig::default();
        let jobs = JobSystems::construct(&config, Some(1));
        let fs = FileSystem::construct(&config, jobs.clone());
        let file = test_file(b"x");

        let first = fs.sync_load(file.path().to_str().unwrap(), FileLoadMode::Read).unwrap();
        fs.free_handle(first);
        let second = fs.sync_load(file.path().to_str().unwrap(), FileLoadMode::Read).unwrap();
        assert_eq!(first.0, second.0);
        jobs.destruct();
    }

    #[test]
    fn async_load_rejects_paths_over_async_path_max() {
        let mut config = EngineConfig::default();
        config.async_path_max = 4;
        let jobs = JobSystems::construct(&config, Some(1));
        let fs = FileSystem::construct(&config, jobs.clone());

        let error = fs.async_load("a/path/longer/than/four/bytes", FileLoadMode::Read).unwrap_err();
        assert!(matches!(error, EngineError::CapacityExceeded("ASYNC_PATH_MAX exceeded")));
        jobs.destruct();
    }

    #[test]
    fn async_load_rejects_once_in_flight_limit_is_reached() {
        let mut config = EngineConfig::default();
        config.max_async_file_reads = 0;
        let jobs = JobSystems::construct(&config, Some(1));
        let fs = FileSystem::construct(&config, jobs.clone());

        let error = fs.async_load("irrelevant.txt", FileLoadMode::Read).unwrap_err();
        assert!(matches!(error, EngineError::CapacityExceeded("MAX_ASYNC_FILE_READS exceeded")));
        jobs.destruct();
    }
}
