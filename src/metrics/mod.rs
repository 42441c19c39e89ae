//! Prometheus metrics for the camera scanner.
//!
//! Snapshots of a [`ScannerLifecycle`](crate::lifecycle::ScannerLifecycle)
//! feed a Prometheus registry. With the `metrics` feature the registry is
//! also served over HTTP.
//!
//! # Metrics Exposed
//!
//! ## State
//! - `camera_scanner_scanning` - Whether a session is running (1=yes, 0=no)
//! - `camera_scanner_permission` - Camera permission (1=granted, 0=denied, -1=unknown)
//! - `camera_scanner_devices` - Devices seen by the last enumeration
//! - `camera_scanner_formats` - Barcode formats being looked for
//!
//! ## Activity
//! - `camera_scanner_scan_success_total` - Decoded symbols
//! - `camera_scanner_scan_miss_total` - Attempts that found nothing
//! - `camera_scanner_scan_fault_total` - Fatal decode faults
//! - `camera_scanner_sessions_started_total` - Sessions started
//!
//! # Example
//!
//! ```no_run
//! use camera_scanner::lifecycle::Permission;
//! use camera_scanner::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     scanning: true,
//!     permission: Permission::Granted,
//!     device_count: 2,
//!     format_count: 1,
//!     successes: 3,
//!     misses: 120,
//!     faults: 0,
//!     sessions_started: 1,
//! };
//!
//! registry.update(&snapshot);
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError, SharedMetricsState};
