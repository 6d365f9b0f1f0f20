//! Storage allocation for the device buffer.

use tracing::error;

use crate::error::{DeviceError, DeviceResult};

/// Source of zero-filled buffer storage.
///
/// Implementations must either return exactly `size` zeroed bytes or fail
/// with [`DeviceError::AllocationFailed`].
pub trait BufferAllocator: Send + Sync {
    fn allocate(&self, size: usize) -> DeviceResult<Vec<u8>>;
}

/// Heap allocation that reports out-of-memory instead of aborting.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn allocate(&self, size: usize) -> DeviceResult<Vec<u8>> {
        let mut data = Vec::new();
        if let Err(e) = data.try_reserve_exact(size) {
            error!(size, error = %e, "failed to allocate device buffer");
            return Err(DeviceError::AllocationFailed { size });
        }
        data.resize(size, 0);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_allocation_is_zeroed() {
        let data = HeapAllocator.allocate(4096).unwrap();
        assert_eq!(data.len(), 4096);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn impossible_allocation_fails() {
        assert!(matches!(
            HeapAllocator.allocate(usize::MAX),
            Err(DeviceError::AllocationFailed { size: usize::MAX })
        ));
    }
}
