pub mod arena;
pub mod bucket;
pub mod manager;
pub mod pool;
pub mod stack;

pub use arena::Arena;
pub use bucket::MemoryBucket;
pub use manager::MemoryManager;
pub use pool::PoolAllocator;
pub use stack::{Mark, StackAllocator};
