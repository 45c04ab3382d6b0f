/// Engine-wide tunables, enumerated in spec.md section 6. Ported as a
/// runtime struct rather than compile-time constants: the teacher's own
/// `Universe`/`World` split is not generic over a config type, and making
/// every archetype/bucket count a const generic would ripple that
/// genericity through the whole public API for no benefit here.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub arena_size: usize,
    pub pool_bytes: usize,
    pub pool_bucket_mix: Vec<BucketMix>,
    pub default_alignment: usize,
    pub max_jobs: usize,
    pub max_next_jobs: usize,
    pub job_thread_sleep: std::time::Duration,
    pub ecs_max_components: usize,
    pub ecs_max_entities: usize,
    pub ecs_max_archetypes: usize,
    pub ecs_chunk_bytes: usize,
    pub max_file_handles: usize,
    pub max_async_file_reads: usize,
    pub async_path_max: usize,
}

/// One `(block_size, fraction_of_pool)` row of the pool allocator's bucket
/// mix (spec.md section 6, "Pool bucket mix").
#[derive(Debug, Clone, Copy)]
pub struct BucketMix {
    pub block_size: usize,
    pub fraction_percent: usize,
}

const GIB: usize = 1024 * 1024 * 1024;

impl Default for EngineConfig {
    fn default() -> Self {
        let pool_bytes = 64 * 1024 * 1024;
        EngineConfig {
            arena_size: GIB,
            pool_bytes,
            pool_bucket_mix: vec![
                BucketMix { block_size: 1024, fraction_percent: 10 },
                BucketMix { block_size: 128, fraction_percent: 20 },
                BucketMix { block_size: 16, fraction_percent: 30 },
                BucketMix { block_size: 8, fraction_percent: 40 },
            ],
            default_alignment: 16,
            max_jobs: 1024,
            max_next_jobs: 8,
            job_thread_sleep: std::time::Duration::from_millis(5),
            ecs_max_components: 127,
            ecs_max_entities: 1 << 20,
            ecs_max_archetypes: 4096,
            ecs_chunk_bytes: 16 * 1024,
            max_file_handles: 4096,
            max_async_file_reads: 128,
            async_path_max: 128,
        }
    }
}

impl EngineConfig {
    /// Resolves the configured pool bucket mix into concrete
    /// `(block_size, block_count)` pairs, the last bucket absorbing whatever
    /// remainder the percentage split leaves (mirrors the original's
    /// `bucketSize4 = POOL_ALLOCATOR_MEMORY_SIZE - (bucketSize1 + bucketSize2 + bucketSize3)`).
    pub fn resolved_buckets(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(self.pool_bucket_mix.len());
        let mut used = 0usize;
        for (i, mix) in self.pool_bucket_mix.iter().enumerate() {
            let bytes = if i + 1 == self.pool_bucket_mix.len() {
                self.pool_bytes.saturating_sub(used)
            } else {
                let raw = self.pool_bytes * mix.fraction_percent / 100;
                align_up(raw, mix.block_size)
            };
            used += bytes;
            let count = bytes / mix.block_size;
            out.push((mix.block_size, count));
        }
        out
    }
}

fn align_up(value: usize, align: usize) -> usize {
    if align == 0 || value % align == 0 {
        value
    } else {
        value + align - (value % align)
    }
}
