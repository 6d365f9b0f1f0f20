use thiserror::Error;

/// Errors produced by the fakefile device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to allocate {size} bytes for device buffer")]
    AllocationFailed { size: usize },

    #[error("invalid destination: {requested} bytes requested, region holds {available}")]
    InvalidDestination { requested: usize, available: usize },

    #[error("invalid source: {requested} bytes requested, region holds {available}")]
    InvalidSource { requested: usize, available: usize },

    /// `whence` is the raw POSIX origin (0 = start, 1 = current, 2 = end).
    #[error("invalid seek: offset {offset}, whence {whence}")]
    InvalidSeek { offset: i64, whence: i32 },

    #[error("close called with no open session")]
    InvalidCloseWithoutOpen,

    #[error("device is not open")]
    NotOpen,

    #[error("invalid capacity: {0}")]
    InvalidCapacity(usize),

    #[error("device `{0}` is not registered")]
    NotRegistered(String),

    #[error("device `{0}` is already registered")]
    AlreadyRegistered(String),

    #[error("device `{name}` is busy: {open_count} session(s) open")]
    Busy { name: String, open_count: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for DeviceError {
    fn from(e: toml::de::Error) -> Self {
        DeviceError::Config(e.to_string())
    }
}

impl From<DeviceError> for std::io::Error {
    fn from(e: DeviceError) -> Self {
        let kind = match &e {
            DeviceError::AllocationFailed { .. } => std::io::ErrorKind::OutOfMemory,
            DeviceError::InvalidDestination { .. }
            | DeviceError::InvalidSource { .. }
            | DeviceError::InvalidSeek { .. }
            | DeviceError::InvalidCapacity(_) => std::io::ErrorKind::InvalidInput,
            DeviceError::NotOpen | DeviceError::NotRegistered(_) => std::io::ErrorKind::NotFound,
            DeviceError::Io(inner) => inner.kind(),
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;
