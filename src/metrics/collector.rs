//! Metrics collection and registry.

use crate::lifecycle::{Permission, ScannerLifecycle};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of scanner state for metrics update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Whether a session is running.
    pub scanning: bool,
    /// Camera permission as last observed.
    pub permission: Permission,
    /// Devices seen by the last enumeration.
    pub device_count: usize,
    /// Formats the decoder is looking for.
    pub format_count: usize,
    /// Decoded symbols.
    pub successes: u64,
    /// Attempts that found nothing.
    pub misses: u64,
    /// Fatal decode faults.
    pub faults: u64,
    /// Sessions started.
    pub sessions_started: u64,
}

impl MetricsSnapshot {
    /// Captures the current state of a scanner.
    pub fn from_lifecycle(scanner: &ScannerLifecycle) -> Self {
        let stats = scanner.stats().snapshot();
        Self {
            scanning: scanner.is_scanning(),
            permission: scanner.permission(),
            device_count: scanner.state().devices.len(),
            format_count: scanner.formats().len(),
            successes: stats.successes,
            misses: stats.misses,
            faults: stats.faults,
            sessions_started: stats.sessions_started,
        }
    }

    /// Whether the scanner can reach a camera at all.
    pub fn is_healthy(&self) -> bool {
        self.permission != Permission::Denied && self.device_count > 0
    }
}

/// Prometheus metrics registry for the scanner.
pub struct MetricsRegistry {
    registry: Registry,

    // State
    scanning: IntGauge,
    permission: IntGauge,
    devices: IntGauge,
    formats: IntGauge,

    // Activity
    successes: IntCounter,
    misses: IntCounter,
    faults: IntCounter,
    sessions_started: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all scanner metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let scanning = IntGauge::new(
            "camera_scanner_scanning",
            "Whether a scan session is running (1=yes, 0=no)",
        )?;
        let permission = IntGauge::new(
            "camera_scanner_permission",
            "Camera permission (1=granted, 0=denied, -1=unknown)",
        )?;
        let devices = IntGauge::new(
            "camera_scanner_devices",
            "Video input devices seen by the last enumeration",
        )?;
        let formats = IntGauge::new(
            "camera_scanner_formats",
            "Barcode formats the decoder looks for",
        )?;

        let successes = IntCounter::new(
            "camera_scanner_scan_success_total",
            "Total number of decoded symbols",
        )?;
        let misses = IntCounter::new(
            "camera_scanner_scan_miss_total",
            "Total number of attempts that found no symbol",
        )?;
        let faults = IntCounter::new(
            "camera_scanner_scan_fault_total",
            "Total number of fatal decode faults",
        )?;
        let sessions_started = IntCounter::new(
            "camera_scanner_sessions_started_total",
            "Total number of scan sessions started",
        )?;

        registry.register(Box::new(scanning.clone()))?;
        registry.register(Box::new(permission.clone()))?;
        registry.register(Box::new(devices.clone()))?;
        registry.register(Box::new(formats.clone()))?;
        registry.register(Box::new(successes.clone()))?;
        registry.register(Box::new(misses.clone()))?;
        registry.register(Box::new(faults.clone()))?;
        registry.register(Box::new(sessions_started.clone()))?;

        Ok(Self {
            registry,
            scanning,
            permission,
            devices,
            formats,
            successes,
            misses,
            faults,
            sessions_started,
        })
    }

    /// Updates all metrics from a snapshot of scanner state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.scanning.set(i64::from(snapshot.scanning));
        self.permission.set(match snapshot.permission {
            Permission::Granted => 1,
            Permission::Denied => 0,
            Permission::Unknown => -1,
        });
        self.devices.set(snapshot.device_count as i64);
        self.formats.set(snapshot.format_count as i64);

        // Counters only move forward; snapshots carry running totals.
        advance(&self.successes, snapshot.successes);
        advance(&self.misses, snapshot.misses);
        advance(&self.faults, snapshot.faults);
        advance(&self.sessions_started, snapshot.sessions_started);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
