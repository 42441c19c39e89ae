//! Notification channels published by the scanner.
//!
//! Every channel is an independent `tokio::sync::broadcast` fan-out, so
//! hosts subscribe only to what they care about. Slow receivers lag
//! rather than block the scanner.

use crate::capture::{DeviceError, VideoDevice};
use crate::decode::{DecodeError, DecodedResult, ScanOutcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Buffered events per channel before slow receivers start lagging.
pub const EVENT_CAPACITY: usize = 64;

/// One notification channel.
#[derive(Debug)]
pub struct Channel<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> Channel<T> {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// True if at least one receiver is subscribed.
    pub fn has_listeners(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    pub(crate) fn emit(&self, value: T) {
        // No receivers is not an error: nobody asked to be told.
        let _ = self.sender.send(value);
    }
}

/// All channels a scanner publishes on.
#[derive(Debug)]
pub struct ScannerEvents {
    /// The autostart sequence finished.
    pub autostarted: Channel<()>,
    /// The autostart sequence began (`true`) or ended (`false`).
    pub autostarting: Channel<bool>,
    /// Whether the running session can drive a torch.
    pub torch_compatible: Channel<bool>,
    /// Text of each decoded symbol.
    pub scan_success: Channel<String>,
    /// Benign misses, with their reason.
    pub scan_failure: Channel<Option<DecodeError>>,
    /// Fatal decode faults.
    pub scan_error: Channel<DecodeError>,
    /// Every non-fatal attempt; carries the result on success.
    pub scan_complete: Channel<Option<DecodedResult>>,
    /// Devices found by enumeration.
    pub cameras_found: Channel<Vec<VideoDevice>>,
    /// No usable camera, with the media error when there was one.
    pub cameras_not_found: Channel<Option<DeviceError>>,
    /// Permission state after each request; failures follow as `Err`.
    pub permission_response: Channel<Result<Option<bool>, DeviceError>>,
    /// Whether devices are present, if known.
    pub has_devices: Channel<Option<bool>>,
    /// Device selected by autostart, or `None` on reset.
    pub device_change: Channel<Option<VideoDevice>>,
    last_scan_error: Mutex<Option<DecodeError>>,
}

impl Default for ScannerEvents {
    fn default() -> Self {
        Self {
            autostarted: Channel::new(),
            autostarting: Channel::new(),
            torch_compatible: Channel::new(),
            scan_success: Channel::new(),
            scan_failure: Channel::new(),
            scan_error: Channel::new(),
            scan_complete: Channel::new(),
            cameras_found: Channel::new(),
            cameras_not_found: Channel::new(),
            permission_response: Channel::new(),
            has_devices: Channel::new(),
            device_change: Channel::new(),
            last_scan_error: Mutex::new(None),
        }
    }
}

impl ScannerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent fatal decode fault, kept so a listener attached
    /// after the fact can still see it.
    pub fn last_scan_error(&self) -> Option<DecodeError> {
        self.last_scan_error.lock().clone()
    }

    /// Republishes one session outcome on the matching channels.
    pub(crate) fn dispatch(&self, outcome: ScanOutcome) {
        match outcome {
            ScanOutcome::Success { payload } => {
                self.scan_success.emit(payload.text.clone());
                self.scan_complete.emit(Some(payload));
            }
            ScanOutcome::BenignMiss { reason } => {
                self.scan_failure.emit(Some(reason));
                self.scan_complete.emit(None);
            }
            ScanOutcome::FatalFault { cause } => {
                if !self.scan_error.has_listeners() {
                    tracing::error!(fault = cause.name(), error = %cause, "camera scanner fault");
                    tracing::warn!("Subscribe to `scan_error` to handle faults like this one");
                }
                *self.last_scan_error.lock() = Some(cause.clone());
                self.scan_error.emit(cause);
            }
        }
    }
}

/// Running totals of session activity.
#[derive(Debug, Default)]
pub struct ScanStats {
    successes: AtomicU64,
    misses: AtomicU64,
    faults: AtomicU64,
    sessions_started: AtomicU64,
}

/// Point-in-time copy of [`ScanStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatsSnapshot {
    pub successes: u64,
    pub misses: u64,
    pub faults: u64,
    pub sessions_started: u64,
}

impl ScanStats {
    pub(crate) fn record(&self, outcome: &ScanOutcome) {
        let counter = match outcome {
            ScanOutcome::Success { .. } => &self.successes,
            ScanOutcome::BenignMiss { .. } => &self.misses,
            ScanOutcome::FatalFault { .. } => &self.faults,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::BarcodeFormat;

    #[tokio::test]
    async fn test_success_goes_to_success_and_complete() {
        let events = ScannerEvents::new();
        let mut success = events.scan_success.subscribe();
        let mut complete = events.scan_complete.subscribe();
        let mut failure = events.scan_failure.subscribe();

        let payload = DecodedResult::new("ABC123", BarcodeFormat::QrCode);
        events.dispatch(ScanOutcome::Success {
            payload: payload.clone(),
        });

        assert_eq!(success.recv().await.unwrap(), "ABC123");
        assert_eq!(complete.recv().await.unwrap(), Some(payload));
        assert!(failure.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_miss_goes_to_failure_and_complete() {
        let events = ScannerEvents::new();
        let mut failure = events.scan_failure.subscribe();
        let mut complete = events.scan_complete.subscribe();

        events.dispatch(ScanOutcome::BenignMiss {
            reason: DecodeError::not_found(),
        });

        assert_eq!(failure.recv().await.unwrap(), Some(DecodeError::not_found()));
        assert_eq!(complete.recv().await.unwrap(), None);
    }

    #[test]
    fn test_unobserved_fault_is_retained() {
        let events = ScannerEvents::new();
        assert!(!events.scan_error.has_listeners());

        events.dispatch(ScanOutcome::FatalFault {
            cause: DecodeError::device_lost("gone"),
        });
        assert_eq!(events.last_scan_error(), Some(DecodeError::device_lost("gone")));
    }

    #[test]
    fn test_stats_count_by_kind() {
        let stats = ScanStats::default();
        stats.record(&ScanOutcome::BenignMiss {
            reason: DecodeError::not_found(),
        });
        stats.record(&ScanOutcome::BenignMiss {
            reason: DecodeError::not_found(),
        });
        stats.record_session_started();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.misses, 2);
        assert_eq!(snapshot.successes, 0);
        assert_eq!(snapshot.sessions_started, 1);
    }
}
