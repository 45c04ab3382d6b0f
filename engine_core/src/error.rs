use thiserror::Error;

/// The engine-wide error taxonomy. Most variants are fatal by construction:
/// the configured sizes are meant to make them unreachable under a correctly
/// sized workload, so hitting one in a debug build is a bug, not routine
/// control flow. See `fatal!` for the debug-abort / release-propagate split.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("out of memory: {0}")]
    OutOfMemory(&'static str),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(&'static str),

    #[error("file i/o error: {0}")]
    FileIo(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("internal invariant violated: {0}")]
    InvariantViolation(&'static str),

    #[error("job panicked: {0}")]
    JobPanicked(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Logs a categorised error line and aborts in debug builds; in release
/// builds the caller is expected to have already turned this into an
/// `EngineError` and is just logging context on the way out.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        tracing::error!($($arg)*);
        if cfg!(debug_assertions) {
            panic!($($arg)*);
        }
    }};
}
