//! Fixed-capacity byte store with a single cursor.
//!
//! Reads and writes past the end are truncated to the bytes that remain;
//! seeks are strict and leave the cursor untouched when rejected.

use std::fmt;

use tracing::{debug, warn};

use crate::alloc::{BufferAllocator, HeapAllocator};
use crate::error::{DeviceError, DeviceResult};

/// Origin for [`BoundedBuffer::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl Whence {
    /// The POSIX `SEEK_*` value for this origin.
    pub fn as_raw(self) -> i32 {
        match self {
            Whence::Start => 0,
            Whence::Current => 1,
            Whence::End => 2,
        }
    }
}

impl TryFrom<i32> for Whence {
    type Error = i32;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            other => Err(other),
        }
    }
}

impl fmt::Display for Whence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Whence::Start => "start",
            Whence::Current => "current",
            Whence::End => "end",
        };
        f.write_str(name)
    }
}

/// A fixed-capacity byte buffer with a read/write cursor.
///
/// Invariant: `cursor <= data.len()`, and `data.len()` never changes.
#[derive(Debug)]
pub struct BoundedBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl BoundedBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes on the heap.
    pub fn new(capacity: usize) -> DeviceResult<Self> {
        Self::with_allocator(capacity, &HeapAllocator)
    }

    /// Allocate a zeroed buffer of `capacity` bytes through `allocator`.
    pub fn with_allocator(capacity: usize, allocator: &dyn BufferAllocator) -> DeviceResult<Self> {
        if capacity == 0 {
            return Err(DeviceError::InvalidCapacity(capacity));
        }

        let data = allocator.allocate(capacity)?;
        if data.len() != capacity {
            warn!(
                expected = capacity,
                got = data.len(),
                "allocator returned storage of the wrong size"
            );
            return Err(DeviceError::AllocationFailed { size: capacity });
        }

        Ok(Self { data, cursor: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    /// The whole backing store, independent of the cursor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy up to `requested` bytes from the cursor into `dst`.
    ///
    /// The request is first truncated to [`remaining`](Self::remaining). If
    /// `dst` cannot hold the truncated count, nothing is copied and the
    /// cursor does not move. Returns the number of bytes transferred, which
    /// is zero once the cursor sits at the end.
    pub fn read(&mut self, dst: &mut [u8], requested: usize) -> DeviceResult<usize> {
        let count = requested.min(self.remaining());
        let available = dst.len();
        let dst = dst.get_mut(..count).ok_or_else(|| {
            warn!(requested = count, available, "invalid destination region");
            DeviceError::InvalidDestination {
                requested: count,
                available,
            }
        })?;

        dst.copy_from_slice(&self.data[self.cursor..self.cursor + count]);
        self.cursor += count;
        Ok(count)
    }

    /// Copy up to `requested` bytes from `src` into the buffer at the cursor.
    ///
    /// Mirrors [`read`](Self::read): the request is truncated to the bytes
    /// remaining, and a `src` shorter than the truncated count is rejected
    /// before anything is copied.
    pub fn write(&mut self, src: &[u8], requested: usize) -> DeviceResult<usize> {
        let count = requested.min(self.remaining());
        let available = src.len();
        let src = src.get(..count).ok_or_else(|| {
            warn!(requested = count, available, "invalid source region");
            DeviceError::InvalidSource {
                requested: count,
                available,
            }
        })?;

        self.data[self.cursor..self.cursor + count].copy_from_slice(src);
        self.cursor += count;
        Ok(count)
    }

    /// Move the cursor and return its new position.
    ///
    /// Negative offsets are rejected for every origin. `Start` accepts
    /// `0..=capacity`, `Current` accepts any offset that keeps the cursor
    /// within `0..=capacity`, and `End` accepts only offset zero.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        let invalid = || {
            debug!(offset, %whence, "seek rejected");
            DeviceError::InvalidSeek {
                offset,
                whence: whence.as_raw(),
            }
        };

        let offset = usize::try_from(offset).map_err(|_| invalid())?;

        let target = match whence {
            Whence::Start => offset,
            Whence::Current => self.cursor.checked_add(offset).ok_or_else(invalid)?,
            Whence::End if offset == 0 => self.end_position(),
            Whence::End => return Err(invalid()),
        };

        if target > self.capacity() {
            return Err(invalid());
        }

        self.cursor = target;
        Ok(target as u64)
    }

    /// Seek by raw POSIX origin; unknown origins are an invalid seek.
    pub fn seek_raw(&mut self, offset: i64, whence: i32) -> DeviceResult<u64> {
        let whence =
            Whence::try_from(whence).map_err(|whence| DeviceError::InvalidSeek { offset, whence })?;
        self.seek(offset, whence)
    }

    /// Position an end-relative seek lands on.
    ///
    /// This is the index of the last byte, not one past it, even though a
    /// start-relative seek to `capacity` is accepted. Callers that want the
    /// one-past-end position must use `seek(capacity, Whence::Start)`.
    fn end_position(&self) -> usize {
        debug!(
            capacity = self.capacity(),
            "end seek lands on last byte, not one past the end"
        );
        self.capacity() - 1
    }
}
