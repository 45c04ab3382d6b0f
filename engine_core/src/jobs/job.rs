use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;

/// Which named job system instance owns a job. Two exist in the process: a
/// multi-threaded main system and a zero-worker render system drained by the
/// render thread (spec.md section 3, "Job system").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemKind {
    Main,
    Render,
}

/// An index into the process-wide pool of preallocated job slots. Cheap to
/// copy, stable for the job's lifetime between `get_job` and the point it is
/// returned to the free pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(pub(crate) usize);

pub(crate) type Dispatch = Box<dyn FnOnce() + Send + 'static>;

/// One preallocated job slot. Fields mirror
/// `original_source/engine/job_system/job_system_job.h`'s `Job`: a dispatch
/// function, an atomic predecessor counter, and a fixed-capacity successor
/// list (`SmallVec` in place of the C++ `ArrayContainer<Job*, MAX_NEXT_JOBS>`).
pub(crate) struct JobSlot {
    pub(crate) remaining_predecessors: AtomicUsize,
    pub(crate) successors: Mutex<SmallVec<[usize; 8]>>,
    pub(crate) dispatch: Mutex<Option<Dispatch>>,
    pub(crate) owner: AtomicUsize,
}

impl JobSlot {
    pub(crate) fn new() -> Self {
        JobSlot {
            remaining_predecessors: AtomicUsize::new(0),
            successors: Mutex::new(SmallVec::new()),
            dispatch: Mutex::new(None),
            owner: AtomicUsize::new(0),
        }
    }

    /// `remaining_predecessors == 0` after configuration never happens by
    /// construction; `== 1` is "ready for dispatch"; `> 1` is "still
    /// waiting" (spec.md section 3, "Job" invariants).
    pub(crate) fn is_finished(&self) -> bool {
        self.remaining_predecessors.load(Ordering::Acquire) == 0
    }

    pub(crate) fn is_ready_for_dispatch(&self) -> bool {
        self.remaining_predecessors.load(Ordering::Acquire) == 1
    }
}

impl SystemKind {
    pub(crate) fn as_index(self) -> usize {
        match self {
            SystemKind::Main => 0,
            SystemKind::Render => 1,
        }
    }

    pub(crate) fn from_index(index: usize) -> Self {
        match index {
            0 => SystemKind::Main,
            1 => SystemKind::Render,
            _ => unreachable!("job system index out of range"),
        }
    }
}
