//! Scanner lifecycle: permission, device selection and notifications.
//!
//! The [`ScannerLifecycle`] decides when a scan session should run. Hosts
//! drive it with property-style calls (`set_device`, `set_enabled`, ...)
//! and observe it through the channels on [`ScannerEvents`].

mod controller;
mod events;
mod permission;
mod state;

pub use controller::{ScanSession, ScannerLifecycle};
pub use events::{Channel, ScanStats, ScanStatsSnapshot, ScannerEvents, EVENT_CAPACITY};
pub use permission::{
    classify_permission_error, select_autostart_device, PermissionOutcome, REAR_CAMERA_HINTS,
};
pub use state::{DeviceChange, IgnoreReason, LifecycleState, Permission, ScannerError};
