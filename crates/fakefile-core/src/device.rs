//! The `fakefile` character device.
//!
//! A [`FakeFile`] is registered once, opened any number of times, and
//! unregistered when no handles remain. Every [`FileHandle`] talks to the
//! same buffer and the same cursor.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::buffer::Whence;
use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult};
use crate::session::{SessionManager, SessionStats};

/// A named in-memory character device.
#[derive(Debug)]
pub struct FakeFile {
    name: String,
    major: u32,
    minor: u32,
    registered: Mutex<bool>,
    sessions: SessionManager,
}

impl FakeFile {
    /// Build an unregistered device from its configuration.
    pub fn new(config: &DeviceConfig) -> DeviceResult<Arc<Self>> {
        config.validate()?;
        let sessions = SessionManager::new(config.capacity)?;
        Ok(Self::with_sessions(config, sessions))
    }

    /// Build an unregistered device around an existing session manager.
    pub fn with_sessions(config: &DeviceConfig, sessions: SessionManager) -> Arc<Self> {
        Arc::new(Self {
            name: config.name.clone(),
            major: config.major,
            minor: config.minor,
            registered: Mutex::new(false),
            sessions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Path the device node would live at.
    pub fn node_path(&self) -> String {
        format!("/dev/{}", self.name)
    }

    /// Size of the device buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.sessions.capacity()
    }

    /// Whether the buffer currently exists, i.e. some handle is open.
    pub fn is_allocated(&self) -> bool {
        self.sessions.is_allocated()
    }

    pub fn stats(&self) -> SessionStats {
        self.sessions.stats()
    }

    /// Make the device available to [`open`](Self::open).
    pub fn register(&self) -> DeviceResult<()> {
        let mut registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        if *registered {
            return Err(DeviceError::AlreadyRegistered(self.name.clone()));
        }
        *registered = true;

        info!(
            name = %self.name,
            major = self.major,
            minor = self.minor,
            capacity = self.sessions.capacity(),
            "registered device"
        );
        info!(
            "create the node with `mknod {} c {} {}`",
            self.node_path(),
            self.major,
            self.minor
        );
        Ok(())
    }

    /// Withdraw the device. Fails while any handle is still open.
    pub fn unregister(&self) -> DeviceResult<()> {
        let mut registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        if !*registered {
            return Err(DeviceError::NotRegistered(self.name.clone()));
        }

        let open_count = self.sessions.open_count();
        if open_count > 0 {
            warn!(name = %self.name, open_count, "refusing to unregister busy device");
            return Err(DeviceError::Busy {
                name: self.name.clone(),
                open_count,
            });
        }

        *registered = false;
        info!(name = %self.name, "unregistered device");
        Ok(())
    }

    /// Open a new handle on the shared buffer.
    pub fn open(self: &Arc<Self>) -> DeviceResult<FileHandle> {
        // Held across the session open so unregister cannot slip in between.
        let registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        if !*registered {
            return Err(DeviceError::NotRegistered(self.name.clone()));
        }

        self.sessions.open()?;
        drop(registered);

        Ok(FileHandle {
            device: Arc::clone(self),
            closed: false,
        })
    }
}

/// An open session on a [`FakeFile`].
///
/// Dropping the handle closes it. The cursor belongs to the device, so a
/// seek through one handle moves every other handle too.
#[derive(Debug)]
pub struct FileHandle {
    device: Arc<FakeFile>,
    closed: bool,
}

impl FileHandle {
    /// Read up to `requested` bytes into `dst`; see [`crate::BoundedBuffer::read`].
    pub fn read(&self, dst: &mut [u8], requested: usize) -> DeviceResult<usize> {
        self.device.sessions.read(dst, requested)
    }

    /// Write up to `requested` bytes from `src`; see [`crate::BoundedBuffer::write`].
    pub fn write(&self, src: &[u8], requested: usize) -> DeviceResult<usize> {
        self.device.sessions.write(src, requested)
    }

    pub fn seek(&self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        self.device.sessions.seek(offset, whence)
    }

    /// Seek using a raw POSIX origin value.
    pub fn seek_raw(&self, offset: i64, whence: i32) -> DeviceResult<u64> {
        self.device
            .sessions
            .with_buffer(|buf| buf.seek_raw(offset, whence))
    }

    /// Current cursor position.
    pub fn position(&self) -> DeviceResult<usize> {
        self.device.sessions.with_buffer(|buf| Ok(buf.cursor()))
    }

    /// Close the handle, releasing the buffer if this was the last one.
    pub fn close(mut self) -> DeviceResult<()> {
        self.closed = true;
        self.device.sessions.close()
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.device.sessions.close() {
            warn!(name = %self.device.name, error = %e, "failed to close dropped handle");
        }
    }
}

impl io::Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        Ok(FileHandle::read(self, buf, len)?)
    }
}

impl io::Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(FileHandle::write(self, buf, buf.len())?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `SeekFrom::End(0)` lands on the last byte (`capacity - 1`), not one
/// past it as `std::io::Seek` documents, and any other end offset is
/// rejected. Use `SeekFrom::Start(capacity)` to reach the end position.
impl io::Seek for FileHandle {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(n) => {
                let n = i64::try_from(n)
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset too large"))?;
                (n, Whence::Start)
            }
            io::SeekFrom::Current(n) => (n, Whence::Current),
            io::SeekFrom::End(n) => (n, Whence::End),
        };
        Ok(FileHandle::seek(self, offset, whence)?)
    }
}
