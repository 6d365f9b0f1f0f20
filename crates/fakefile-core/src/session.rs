//! Session lifecycle for the shared device buffer.
//!
//! Every opener shares one buffer and one cursor. The buffer is allocated
//! when the open count goes from zero to one and freed when it drops back
//! to zero. A single mutex guards the count, the buffer and its cursor.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alloc::{BufferAllocator, HeapAllocator};
use crate::buffer::{BoundedBuffer, Whence};
use crate::error::{DeviceError, DeviceResult};

/// Snapshot of the session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub capacity: usize,
    pub open_count: usize,
    pub allocated: bool,
    /// Buffers allocated since the manager was created.
    pub allocations: u64,
    /// Buffers freed since the manager was created.
    pub releases: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    open_count: usize,
    buffer: Option<BoundedBuffer>,
    allocations: u64,
    releases: u64,
}

/// Reference-counted owner of the device buffer.
pub struct SessionManager {
    capacity: usize,
    allocator: Box<dyn BufferAllocator>,
    state: Mutex<SessionState>,
}

impl SessionManager {
    /// Create a manager whose buffer will hold `capacity` bytes.
    pub fn new(capacity: usize) -> DeviceResult<Self> {
        Self::with_allocator(capacity, HeapAllocator)
    }

    /// Create a manager that obtains buffer storage from `allocator`.
    pub fn with_allocator<A>(capacity: usize, allocator: A) -> DeviceResult<Self>
    where
        A: BufferAllocator + 'static,
    {
        if capacity == 0 {
            return Err(DeviceError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            allocator: Box::new(allocator),
            state: Mutex::new(SessionState::default()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Every mutation leaves the state consistent before it can panic, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new opener, allocating the buffer for the first one.
    ///
    /// On allocation failure the open count is left untouched and the
    /// buffer stays unallocated.
    pub fn open(&self) -> DeviceResult<()> {
        let mut state = self.lock();

        if state.buffer.is_none() {
            let buffer = BoundedBuffer::with_allocator(self.capacity, self.allocator.as_ref())?;
            state.buffer = Some(buffer);
            state.allocations += 1;
            info!(size = self.capacity, "device buffer allocated");
        }

        state.open_count += 1;
        info!(open_count = state.open_count, "device opened");
        Ok(())
    }

    /// Drop one opener, freeing the buffer when the last one leaves.
    ///
    /// Closing with no open sessions is rejected and changes nothing.
    pub fn close(&self) -> DeviceResult<()> {
        let mut state = self.lock();

        if state.open_count == 0 {
            warn!("close called with no open session");
            return Err(DeviceError::InvalidCloseWithoutOpen);
        }

        state.open_count -= 1;
        if state.open_count == 0 && state.buffer.take().is_some() {
            state.releases += 1;
            info!(size = self.capacity, "device buffer freed");
        }

        info!(open_count = state.open_count, "device closed");
        Ok(())
    }

    /// Run `f` against the shared buffer while holding the session lock.
    pub fn with_buffer<F, R>(&self, f: F) -> DeviceResult<R>
    where
        F: FnOnce(&mut BoundedBuffer) -> DeviceResult<R>,
    {
        let mut state = self.lock();
        let buffer = state.buffer.as_mut().ok_or_else(|| {
            debug!("buffer access with no open session");
            DeviceError::NotOpen
        })?;
        f(buffer)
    }

    pub fn read(&self, dst: &mut [u8], requested: usize) -> DeviceResult<usize> {
        self.with_buffer(|buf| buf.read(dst, requested))
    }

    pub fn write(&self, src: &[u8], requested: usize) -> DeviceResult<usize> {
        self.with_buffer(|buf| buf.write(src, requested))
    }

    pub fn seek(&self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        self.with_buffer(|buf| buf.seek(offset, whence))
    }

    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    pub fn is_allocated(&self) -> bool {
        self.lock().buffer.is_some()
    }

    pub fn stats(&self) -> SessionStats {
        let state = self.lock();
        SessionStats {
            capacity: self.capacity,
            open_count: state.open_count,
            allocated: state.buffer.is_some(),
            allocations: state.allocations,
            releases: state.releases,
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` allocations, then defers to the heap.
    struct FlakyAllocator {
        failures: AtomicUsize,
    }

    impl FlakyAllocator {
        fn failing(n: usize) -> Self {
            Self {
                failures: AtomicUsize::new(n),
            }
        }
    }

    impl BufferAllocator for FlakyAllocator {
        fn allocate(&self, size: usize) -> DeviceResult<Vec<u8>> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(DeviceError::AllocationFailed { size });
            }
            HeapAllocator.allocate(size)
        }
    }

    #[test]
    fn buffer_lives_until_last_close() {
        let mgr = SessionManager::new(16).unwrap();
        for _ in 0..3 {
            mgr.open().unwrap();
        }
        assert_eq!(mgr.stats().allocations, 1);

        mgr.close().unwrap();
        mgr.close().unwrap();
        assert!(mgr.is_allocated());
        assert_eq!(mgr.stats().releases, 0);

        mgr.close().unwrap();
        let stats = mgr.stats();
        assert!(!stats.allocated);
        assert_eq!(stats.open_count, 0);
        assert_eq!(stats.releases, 1);
    }

    #[test]
    fn reopen_starts_fresh() {
        let mgr = SessionManager::new(8).unwrap();
        mgr.open().unwrap();
        mgr.write(b"dirty", 5).unwrap();
        mgr.close().unwrap();

        mgr.open().unwrap();
        mgr.with_buffer(|buf| {
            assert_eq!(buf.cursor(), 0);
            assert!(buf.as_bytes().iter().all(|&b| b == 0));
            Ok(())
        })
        .unwrap();
        assert_eq!(mgr.stats().allocations, 2);
    }

    #[test]
    fn openers_share_cursor() {
        let mgr = SessionManager::new(8).unwrap();
        mgr.open().unwrap();
        mgr.open().unwrap();
        mgr.write(b"abc", 3).unwrap();
        assert_eq!(mgr.with_buffer(|buf| Ok(buf.cursor())).unwrap(), 3);
        mgr.close().unwrap();
        assert_eq!(mgr.with_buffer(|buf| Ok(buf.cursor())).unwrap(), 3);
        mgr.close().unwrap();
    }

    #[test]
    fn failed_allocation_rolls_back() {
        let mgr = SessionManager::with_allocator(32, FlakyAllocator::failing(1)).unwrap();

        let err = mgr.open().unwrap_err();
        assert!(matches!(err, DeviceError::AllocationFailed { size: 32 }));
        assert_eq!(mgr.open_count(), 0);
        assert!(!mgr.is_allocated());
        assert!(matches!(mgr.close(), Err(DeviceError::InvalidCloseWithoutOpen)));

        mgr.open().unwrap();
        assert_eq!(mgr.open_count(), 1);
        assert!(mgr.is_allocated());
    }

    #[test]
    fn close_without_open_is_rejected() {
        let mgr = SessionManager::new(4).unwrap();
        assert!(matches!(mgr.close(), Err(DeviceError::InvalidCloseWithoutOpen)));
        assert_eq!(mgr.open_count(), 0);

        mgr.open().unwrap();
        mgr.close().unwrap();
        assert!(matches!(mgr.close(), Err(DeviceError::InvalidCloseWithoutOpen)));
        assert_eq!(mgr.stats().releases, 1);
    }

    #[test]
    fn io_without_session_is_rejected() {
        let mgr = SessionManager::new(4).unwrap();
        let mut out = [0u8; 4];
        assert!(matches!(mgr.read(&mut out, 4), Err(DeviceError::NotOpen)));
        assert!(matches!(mgr.write(b"x", 1), Err(DeviceError::NotOpen)));
        assert!(matches!(mgr.seek(0, Whence::Start), Err(DeviceError::NotOpen)));
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            SessionManager::new(0),
            Err(DeviceError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn concurrent_open_close_frees_once() {
        let mgr = Arc::new(SessionManager::new(64).unwrap());
        let n = 8;

        for _ in 0..n {
            mgr.open().unwrap();
        }

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let mgr = Arc::clone(&mgr);
                std::thread::spawn(move || mgr.close().unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = mgr.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.releases, 1);
        assert!(!stats.allocated);
    }
}
