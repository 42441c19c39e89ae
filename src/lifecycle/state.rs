//! Scanner state and the errors its operations report.

use crate::capture::{ConfigError, DeviceError, VideoDevice};
use crate::decode::FormatError;
use thiserror::Error;

/// Camera permission as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    /// Never asked, or the answer could not be interpreted.
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl Permission {
    /// `Some(true)`, `Some(false)` or `None` for unknown.
    pub fn as_option(self) -> Option<bool> {
        match self {
            Permission::Unknown => None,
            Permission::Granted => Some(true),
            Permission::Denied => Some(false),
        }
    }
}

/// Observable state of a [`ScannerLifecycle`](super::ScannerLifecycle).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleState {
    pub permission: Permission,
    /// Whether any video input exists, once known.
    pub has_devices: Option<bool>,
    /// Devices from the most recent enumeration.
    pub devices: Vec<VideoDevice>,
    pub selected: Option<VideoDevice>,
    pub enabled: bool,
    pub autostarting: bool,
    pub autostarted: bool,
    /// Host initialization has run.
    pub ready: bool,
}

/// Result of a device selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChange {
    /// The selection took effect.
    Applied,
    /// Stored until the host finishes initializing.
    Deferred,
    Ignored(IgnoreReason),
}

/// Why a device selection was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Autostart owns device selection until it finishes.
    Autostarting,
    /// The device is already selected.
    SameDevice,
    /// Camera permission has not been granted.
    PermissionNotGranted,
}

/// Errors from scanner lifecycle operations.
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("there is already a scan process running")]
    AlreadyScanning,

    #[error("no device selected, cannot start scanning")]
    NoDeviceSelected,

    #[error("camera permission has not been granted")]
    PermissionNotGranted,

    #[error("impossible to autostart, no input devices available")]
    NoInputDevices,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
