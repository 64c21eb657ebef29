use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// Attribute-file access below a sysfs class root.
///
/// Writes are synchronous and run on the calling thread, inside the
/// actuator lock. Sysfs GPIO/PWM attributes complete without waiting on a
/// device; a driver backed by slower I/O should move writes to
/// `tokio::task::spawn_blocking`.
pub trait DeviceIO: Send + 'static {
    fn write(&self, attr: &Path, value: &str) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// Real filesystem rooted at e.g. `/sys/class`.
#[derive(Debug, Clone)]
pub struct SysfsRoot {
    root: PathBuf,
}

impl SysfsRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DeviceIO for SysfsRoot {
    fn write(&self, attr: &Path, value: &str) -> Result<()> {
        let path = self.root.join(attr);
        fs::write(&path, value).with_context(|| format!("write {value:?} to {}", path.display()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).exists()
    }
}
