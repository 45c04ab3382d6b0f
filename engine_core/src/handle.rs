/// A `{ valid: 1 bit, index: 63 bits }` surrogate for an engine-owned
/// resource, packed into one `u64`. Grounded in
/// `original_source/engine/resources/resource_manager.h`'s
/// `ResourceManagerHandleT` bitfield union (`isValid : 1; index : 63;`);
/// the packed layout is kept rather than an `Option<usize>` so the type
/// stays a plain `Copy` value the size of a pointer, matching how the
/// original threads it through render-thread job closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(u64);

const VALID_BIT: u64 = 1 << 63;

impl ResourceHandle {
    pub fn new(index: u64) -> Self {
        debug_assert!(index < VALID_BIT, "resource index does not fit in 63 bits");
        ResourceHandle(index | VALID_BIT)
    }

    /// The canonical `!valid` handle: what a failed `add_<resource>` job
    /// leaves behind for downstream draws to detect and skip (spec.md §7).
    pub fn invalid() -> Self {
        ResourceHandle(0)
    }

    pub fn is_valid(self) -> bool {
        self.0 & VALID_BIT != 0
    }

    pub fn index(self) -> Option<u64> {
        self.is_valid().then_some(self.0 & !VALID_BIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_handle_is_valid_and_round_trips_its_index() {
        let handle = ResourceHandle::new(42);
        assert!(handle.is_valid());
        assert_eq!(handle.index(), Some(42));
    }

    #[test]
    fn invalid_handle_reports_no_index() {
        let handle = ResourceHandle::invalid();
        assert!(!handle.is_valid());
        assert_eq!(handle.index(), None);
    }
}
