use crate::constants::{READ_TIMEOUT, WRITE_TIMEOUT};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to find, open and bring up a base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Directory holding `digiBase.rbf` / `digiBaseRH.rbf`
    pub firmware_dir: PathBuf,
    /// Select a specific base when several are attached
    pub serial: Option<String>,
    pub write_timeout: Duration,
    pub read_timeout: Duration,
    /// Issue a USB port reset before claiming the interface
    pub reset_on_open: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            firmware_dir: PathBuf::from("."),
            serial: None,
            write_timeout: WRITE_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            reset_on_open: true,
        }
    }
}

impl DeviceConfig {
    pub fn with_firmware_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.firmware_dir = dir.into();
        self
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn with_timeouts(mut self, write_timeout: Duration, read_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_reset(mut self, reset_on_open: bool) -> Self {
        self.reset_on_open = reset_on_open;
        self
    }

    pub fn firmware_path(&self, file_name: &str) -> PathBuf {
        Path::new(&self.firmware_dir).join(file_name)
    }
}
