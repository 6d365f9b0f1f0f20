//! fakefile-core: a bounded in-memory character device.
//!
//! One fixed-size buffer and one cursor, shared by every opener. The buffer
//! is allocated zeroed on the first open and freed on the last close.
//! Reads and writes truncate at the end of the buffer; seeks are strict.

pub mod alloc;
pub mod buffer;
pub mod config;
pub mod device;
pub mod error;
pub mod session;

// Re-export commonly used items at crate root.
pub use alloc::{BufferAllocator, HeapAllocator};
pub use buffer::{BoundedBuffer, Whence};
pub use config::{DeviceConfig, Overrides};
pub use device::{FakeFile, FileHandle};
pub use error::{DeviceError, DeviceResult};
pub use session::{SessionManager, SessionStats};
