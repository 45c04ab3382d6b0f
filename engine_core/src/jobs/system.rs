use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;

use super::job::{Dispatch, JobHandle, JobSlot, SystemKind};
use crate::config::EngineConfig;
use crate::error::EngineError;

/// One named job system's ready-queue and worker span. The render system is
/// constructed with zero workers and is pumped externally by the render
/// thread (spec.md section 4.C).
struct QueueAndWorkers {
    ready: ArrayQueue<usize>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
}

impl QueueAndWorkers {
    fn new(capacity: usize) -> Self {
        QueueAndWorkers {
            ready: ArrayQueue::new(capacity),
            workers: Mutex::new(Vec::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Owns the process-wide pool of `MAX_JOBS` preallocated slots and the two
/// named job system instances that share it: `main` (N worker threads) and
/// `render` (zero workers, pumped by `dispatch_one(Render)`). Grounded in
/// `original_source/engine/job_system/job_system.{h,cpp}`'s static
/// `jobs[MAX_JOBS]` pool shared by both `JobSystem` instances.
pub struct JobSystems {
    slots: Vec<JobSlot>,
    free: ArrayQueue<usize>,
    main: QueueAndWorkers,
    render: QueueAndWorkers,
    sleep: std::time::Duration,
}

impl JobSystems {
    /// Constructs both job systems with `main_worker_count` workers on the
    /// main system and zero on the render system, then spawns the main
    /// system's worker threads. Defaults to `hardware_concurrency - 2`
    /// (floor 1) when `main_worker_count` is `None`, per spec.md section 3.
    pub fn construct(config: &EngineConfig, main_worker_count: Option<usize>) -> Arc<Self> {
        let slots: Vec<JobSlot> = (0..config.max_jobs).map(|_| JobSlot::new()).collect();
        let free = ArrayQueue::new(config.max_jobs);
        for i in 0..config.max_jobs {
            let _ = free.push(i);
        }
        let systems = Arc::new(JobSystems {
            slots,
            free,
            main: QueueAndWorkers::new(config.max_jobs),
            render: QueueAndWorkers::new(config.max_jobs),
            sleep: config.job_thread_sleep,
        });

        let workers = main_worker_count.unwrap_or_else(|| num_cpus::get().saturating_sub(2).max(1));
        tracing::info!(workers, "job systems constructed");
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let systems = systems.clone();
            let shutdown = systems.main.shutdown.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("job-worker-{}", id))
                    .spawn(move || systems.worker_loop(SystemKind::Main, shutdown))
                    .expect("failed to spawn job worker thread"),
            );
        }
        *systems.main.workers.lock() = handles;
        systems
    }

    pub fn destruct(&self) {
        self.main.shutdown.store(true, Ordering::Release);
        for handle in self.main.workers.lock().drain(..) {
            let _ = handle.join();
        }
    }

    fn queue_for(&self, kind: SystemKind) -> &QueueAndWorkers {
        match kind {
            SystemKind::Main => &self.main,
            SystemKind::Render => &self.render,
        }
    }

    /// Dequeues a free slot from the shared pool; aborts if empty, matching
    /// the original's `al_assert(job)` after `freeJobs.dequeue`.
    pub fn get_job(&self, owner: SystemKind) -> JobHandle {
        let index = self.free.pop().expect("job pool exhausted: increase MAX_JOBS");
        let slot = &self.slots[index];
        slot.owner.store(owner.as_index(), Ordering::Relaxed);
        JobHandle(index)
    }

    /// Atomically stores `remaining_predecessors = 1` and records the
    /// dispatch closure. A configured job is ready for dispatch.
    pub fn configure(&self, job: JobHandle, f: impl FnOnce() + Send + 'static) {
        let slot = &self.slots[job.0];
        *slot.dispatch.lock() = Some(Box::new(f) as Dispatch);
        slot.remaining_predecessors.store(1, Ordering::Release);
    }

    /// Appends `other` to `job`'s successor list. Debug-asserts `other` is
    /// not already present (spec.md section 4.C, `set_before`).
    pub fn set_before(&self, job: JobHandle, other: JobHandle) {
        let mut successors = self.slots[job.0].successors.lock();
        debug_assert!(
            !successors.contains(&other.0),
            "job is already stored in the successor list"
        );
        successors.push(other.0);
    }

    /// `set_after(a, b)` := `set_before(b, a)` then
    /// `a.remaining_predecessors.fetch_add(1)` (spec.md section 4.C).
    pub fn set_after(&self, job: JobHandle, predecessor: JobHandle) {
        self.set_before(predecessor, job);
        self.slots[job.0].remaining_predecessors.fetch_add(1, Ordering::Relaxed);
    }

    /// Enqueues the job on its owning system's ready queue only if it is
    /// ready for dispatch; otherwise its predecessors are responsible for
    /// enqueueing it on their own completion.
    pub fn start_job(&self, job: JobHandle) {
        let slot = &self.slots[job.0];
        debug_assert!(!slot.is_finished(), "cannot start a job that has already finished");
        if slot.is_ready_for_dispatch() {
            self.enqueue_ready(job);
        }
    }

    fn enqueue_ready(&self, job: JobHandle) {
        let owner = SystemKind::from_index(self.slots[job.0].owner.load(Ordering::Relaxed));
        self.queue_for(owner)
            .ready
            .push(job.0)
            .unwrap_or_else(|_| panic!("job ready-queue is full: increase MAX_JOBS"));
    }

    /// Pops one ready job from `kind`'s queue and dispatches it. Returns
    /// `false` if the queue was empty. Used by the render thread to pump the
    /// render job system and internally by the worker loop / `wait_for`.
    pub fn dispatch_one(&self, kind: SystemKind) -> bool {
        let index = match self.queue_for(kind).ready.pop() {
            Ok(index) => index,
            Err(_) => return false,
        };
        self.dispatch_index(index);
        true
    }

    fn dispatch_index(&self, index: usize) {
        let slot = &self.slots[index];
        debug_assert!(slot.is_ready_for_dispatch(), "dispatched job was not ready");
        let dispatch = slot.dispatch.lock().take().expect("job had no dispatch function configured");
        // Dispatch functions are assumed non-throwing by the spec; Rust
        // closures are not non-throwing by construction, so a panic is
        // caught and turned into a logged JobPanicked rather than taking
        // down the worker thread.
        if let Err(payload) = catch_unwind(AssertUnwindSafe(dispatch)) {
            let message = panic_message(payload);
            tracing::error!(error = %message, "job panicked during dispatch");
        }
        self.finish(JobHandle(index));
    }

    fn finish(&self, job: JobHandle) {
        let slot = &self.slots[job.0];
        debug_assert!(slot.is_ready_for_dispatch());
        slot.remaining_predecessors.fetch_sub(1, Ordering::AcqRel);
        let successors: Vec<usize> = std::mem::take(&mut *slot.successors.lock()).into_vec();
        for successor in successors {
            self.notify_predecessor_finished(JobHandle(successor));
        }
        self.free.push(job.0).expect("returning job slot to an already-full free pool");
    }

    fn notify_predecessor_finished(&self, job: JobHandle) {
        let slot = &self.slots[job.0];
        let remaining = slot.remaining_predecessors.fetch_sub(1, Ordering::AcqRel);
        if remaining == 2 {
            // counter just dropped from 2 to 1: now ready for dispatch.
            self.enqueue_ready(job);
        }
    }

    /// Cooperative wait: while `job` is unfinished, try to dispatch another
    /// ready job from `kind`'s queue; if none is available, sleep for the
    /// configured interval. Only ever steals jobs that are already in the
    /// ready queue, i.e. whose predecessors have all finished (open
    /// question 4 in spec.md section 9).
    pub fn wait_for(&self, kind: SystemKind, job: JobHandle) {
        while !self.slots[job.0].is_finished() {
            if !self.dispatch_one(kind) {
                std::thread::sleep(self.sleep);
            }
        }
    }

    /// Ambient convenience beyond the distilled spec: block on an entire
    /// batch of jobs rather than one at a time.
    pub fn wait_for_all(&self, kind: SystemKind, jobs: &[JobHandle]) {
        for &job in jobs {
            self.wait_for(kind, job);
        }
    }

    fn worker_loop(&self, kind: SystemKind, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            if !self.dispatch_one(kind) {
                std::thread::sleep(self.sleep);
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Drop for JobSystems {
    fn drop(&mut self) {
        self.main.shutdown.store(true, Ordering::Release);
        for handle in self.main.workers.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    // S3: jobs A, B, C with set_after(B, A), set_after(C, B). Submitting A
    // runs all three exactly once, in dependency order, and all three slots
    // return to the free pool.
    #[test]
    fn s3_job_chain_runs_in_dependency_order() {
        let config = EngineConfig { max_jobs: 8, ..EngineConfig::default() };
        let systems = JobSystems::construct(&config, Some(2));
        let order = Arc::new(Mutex::new(Vec::new()));

        let a = systems.get_job(SystemKind::Main);
        let b = systems.get_job(SystemKind::Main);
        let c = systems.get_job(SystemKind::Main);

        systems.set_after(b, a);
        systems.set_after(c, b);

        let order_a = order.clone();
        systems.configure(a, move || order_a.lock().push('A'));
        let order_b = order.clone();
        systems.configure(b, move || order_b.lock().push('B'));
        let order_c = order.clone();
        systems.configure(c, move || order_c.lock().push('C'));

        systems.start_job(c);
        systems.start_job(b);
        systems.start_job(a);

        systems.wait_for(SystemKind::Main, c);

        assert_eq!(*order.lock(), vec!['A', 'B', 'C']);
        systems.destruct();
    }

    #[test]
    fn counter_never_underflows_free_pool_reused_exactly_once() {
        let config = EngineConfig { max_jobs: 4, ..EngineConfig::default() };
        let systems = JobSystems::construct(&config, Some(1));
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..100 {
            let job = systems.get_job(SystemKind::Main);
            let counter = counter.clone();
            systems.configure(job, move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
            systems.start_job(job);
            systems.wait_for(SystemKind::Main, job);
        }
        assert_eq!(counter.load(Ordering::Relaxed), 100);
        systems.destruct();
    }

    #[test]
    fn panicking_job_is_recorded_not_fatal() {
        let config = EngineConfig { max_jobs: 4, ..EngineConfig::default() };
        let systems = JobSystems::construct(&config, Some(1));
        let job = systems.get_job(SystemKind::Main);
        systems.configure(job, || panic!("boom"));
        systems.start_job(job);
        systems.wait_for(SystemKind::Main, job);
        systems.destruct();
    }
}
