//! Device configuration: TOML file + overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{DeviceError, DeviceResult};

/// Default buffer size in bytes.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub device: DeviceConfig,
}

/// `[device]` section of the config TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_major")]
    pub major: u32,
    #[serde(default = "default_minor")]
    pub minor: u32,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            major: default_major(),
            minor: default_minor(),
            capacity: default_capacity(),
        }
    }
}

fn default_name() -> String {
    "fakefile".to_string()
}
fn default_major() -> u32 {
    42
}
fn default_minor() -> u32 {
    7
}
fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

/// Values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub capacity: Option<usize>,
}

impl DeviceConfig {
    /// Load config from a TOML file, then apply overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> DeviceResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    toml::from_str::<ConfigFile>(&content)?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        let mut config = file_config.device;
        if let Some(name) = overrides.name {
            config.name = name;
        }
        if let Some(capacity) = overrides.capacity {
            config.capacity = capacity;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the device cannot run with.
    pub fn validate(&self) -> DeviceResult<()> {
        if self.capacity == 0 {
            return Err(DeviceError::InvalidCapacity(self.capacity));
        }
        if self.name.is_empty() || self.name.contains('/') {
            return Err(DeviceError::Config(format!(
                "invalid device name '{}'",
                self.name
            )));
        }
        Ok(())
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.name, "fakefile");
        assert_eq!(cfg.major, 42);
        assert_eq!(cfg.minor, 7);
        assert_eq!(cfg.capacity, 1024);
    }

    #[test]
    fn parse_partial_toml_config() {
        let toml_str = r#"
[device]
capacity = 4096
"#;
        let cfg: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.device.capacity, 4096);
        assert_eq!(cfg.device.name, "fakefile");
        assert_eq!(cfg.device.major, 42);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DeviceConfig::load(Some(&dir.path().join("nope.toml")), Overrides::default())
            .unwrap();
        assert_eq!(cfg, DeviceConfig::default());
    }

    #[test]
    fn overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[device]\nname = \"scratch\"\ncapacity = 64").unwrap();

        let cfg = DeviceConfig::load(
            Some(file.path()),
            Overrides {
                name: None,
                capacity: Some(10),
            },
        )
        .unwrap();
        assert_eq!(cfg.name, "scratch");
        assert_eq!(cfg.capacity, 10);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[device]\ncapacity = \"lots\"").unwrap();
        assert!(matches!(
            DeviceConfig::load(Some(file.path()), Overrides::default()),
            Err(DeviceError::Config(_))
        ));
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            DeviceConfig::load(
                None,
                Overrides {
                    name: None,
                    capacity: Some(0)
                }
            ),
            Err(DeviceError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn bad_name_rejected() {
        let cfg = DeviceConfig {
            name: "a/b".into(),
            ..DeviceConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(DeviceError::Config(_))));
    }
}
