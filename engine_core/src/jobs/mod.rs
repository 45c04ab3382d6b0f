pub mod job;
pub mod system;

pub use job::{JobHandle, SystemKind};
pub use system::JobSystems;
