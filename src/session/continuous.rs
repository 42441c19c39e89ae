//! Callback-to-stream bridge over a decode collaborator.

use super::controls::{SessionControls, SessionError};
use super::subject::{OutcomeSubject, ScanStream};
use crate::capture::{DeviceId, DisplayTarget, StreamRegistry};
use crate::decode::{AttemptCallback, DecodeCollaborator, ScanOutcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type ControlSlot = Arc<Mutex<Option<Arc<SessionControls>>>>;

/// Runs one continuous decode loop at a time on top of a decoder.
///
/// [`start`](Self::start) registers a per-attempt callback with the
/// decoder and publishes each attempt as a [`ScanOutcome`]. Benign misses
/// never stop the loop. A fatal fault ends the stream, stops the decoder
/// and clears the stored controls.
pub struct ContinuousScanSession {
    decoder: Arc<dyn DecodeCollaborator>,
    registry: Arc<StreamRegistry>,
    controls: ControlSlot,
}

impl ContinuousScanSession {
    pub fn new(decoder: Arc<dyn DecodeCollaborator>, registry: Arc<StreamRegistry>) -> Self {
        Self {
            decoder,
            registry,
            controls: Arc::new(Mutex::new(None)),
        }
    }

    /// The decoder this adapter drives.
    pub fn decoder(&self) -> &Arc<dyn DecodeCollaborator> {
        &self.decoder
    }

    /// Controls of the running session.
    pub fn controls(&self) -> Result<Arc<SessionControls>, SessionError> {
        self.controls
            .lock()
            .as_ref()
            .filter(|c| !c.is_stopped())
            .cloned()
            .ok_or(SessionError::NoActiveSession)
    }

    /// Stops the running session, if any.
    pub fn stop(&self) {
        let controls = self.controls.lock().take();
        if let Some(controls) = controls {
            controls.stop();
        }
    }

    /// Starts decoding from `device` into `target`.
    ///
    /// Any session already running on this adapter is stopped first. The
    /// returned stream is live before the decoder is asked to start, so it
    /// sees every attempt. A setup failure arrives on the stream as its
    /// only item, a [`ScanOutcome::FatalFault`].
    pub async fn start(&self, device: &DeviceId, target: &DisplayTarget) -> ScanStream {
        self.stop();

        let subject = Arc::new(OutcomeSubject::new());
        let stream = subject.subscribe();
        let accepting = Arc::new(AtomicBool::new(true));

        let callback = attempt_callback(
            device.clone(),
            Arc::clone(&subject),
            Arc::clone(&accepting),
            Arc::clone(&self.controls),
        );

        match self.decoder.decode_continuously(device, target, callback).await {
            Ok(handle) => {
                let controls = SessionControls::new(
                    device.clone(),
                    handle,
                    Arc::clone(&subject),
                    Arc::clone(&accepting),
                );
                controls.register(&self.registry);

                let mut slot = self.controls.lock();
                if accepting.load(Ordering::Acquire) {
                    *slot = Some(controls);
                    tracing::info!(device = %device, target = %target, "Scan session started");
                } else {
                    // Faulted while the decoder was still setting up.
                    drop(slot);
                    controls.stop();
                }
            }
            Err(cause) => {
                tracing::error!(device = %device, error = %cause, "Failed to start scan session");
                accepting.store(false, Ordering::Release);
                subject.fail(cause);
                self.stop();
            }
        }

        stream
    }
}

fn attempt_callback(
    device: DeviceId,
    subject: Arc<OutcomeSubject>,
    accepting: Arc<AtomicBool>,
    slot: ControlSlot,
) -> AttemptCallback {
    Arc::new(move |attempt| {
        if !accepting.load(Ordering::Acquire) {
            tracing::trace!(device = %device, "Ignoring decode attempt from a finished session");
            return;
        }

        match ScanOutcome::from_attempt(attempt) {
            ScanOutcome::FatalFault { cause } => {
                let mut guard = slot.lock();
                if !accepting.swap(false, Ordering::AcqRel) {
                    return;
                }
                tracing::warn!(device = %device, error = %cause, "Fatal decode fault, stopping session");
                subject.fail(cause);

                let ours = guard.as_ref().is_some_and(|c| c.belongs_to(&subject));
                let controls = if ours { guard.take() } else { None };
                drop(guard);
                if let Some(controls) = controls {
                    controls.stop();
                }
            }
            outcome => {
                subject.next(outcome);
            }
        }
    })
}

impl std::fmt::Debug for ContinuousScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinuousScanSession")
            .field("controls", &*self.controls.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ReaderOptions;
    use crate::decode::{
        BarcodeFormat, CallLog, DecodeError, DecodeErrorKind, DecodeHints, DecodedResult,
        ScriptedDecoder, NO_READER_DETECTED,
    };
    use futures::StreamExt;

    fn setup() -> (Arc<ScriptedDecoder>, Arc<StreamRegistry>, ContinuousScanSession) {
        let decoder = Arc::new(ScriptedDecoder::new(
            CallLog::default(),
            DecodeHints::default(),
            ReaderOptions::default(),
        ));
        let registry = Arc::new(StreamRegistry::new());
        let session = ContinuousScanSession::new(decoder.clone(), Arc::clone(&registry));
        (decoder, registry, session)
    }

    fn device(id: &str) -> DeviceId {
        DeviceId::new(id)
    }

    fn target() -> DisplayTarget {
        DisplayTarget::new("preview")
    }

    #[tokio::test]
    async fn test_benign_misses_keep_loop_running() {
        let (decoder, _registry, session) = setup();
        let mut stream = session.start(&device("cam"), &target()).await;

        let misses = [
            DecodeError::not_found(),
            DecodeError::new(DecodeErrorKind::Checksum, "checksum"),
            DecodeError::new(DecodeErrorKind::Format, "format"),
            DecodeError::new(DecodeErrorKind::Other("Error".into()), NO_READER_DETECTED),
        ];
        for miss in misses.iter().cloned() {
            assert!(decoder.emit(Err(miss)));
        }
        decoder.emit(Ok(DecodedResult::new("after-misses", BarcodeFormat::QrCode)));

        for miss in misses {
            assert_eq!(stream.next().await, Some(ScanOutcome::BenignMiss { reason: miss }));
        }
        match stream.next().await {
            Some(ScanOutcome::Success { payload }) => assert_eq!(payload.text, "after-misses"),
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(decoder.stop_count(), 0);
        assert!(session.controls().is_ok());
    }

    #[tokio::test]
    async fn test_fatal_fault_stops_once_and_terminates() {
        let (decoder, registry, session) = setup();
        let mut stream = session.start(&device("cam"), &target()).await;
        assert_eq!(registry.len(), 1);

        decoder.emit(Err(DecodeError::device_lost("unplugged")));
        decoder.emit(Ok(DecodedResult::new("ignored", BarcodeFormat::QrCode)));
        decoder.emit(Err(DecodeError::device_lost("again")));

        match stream.next().await {
            Some(ScanOutcome::FatalFault { cause }) => assert_eq!(cause.message, "unplugged"),
            other => panic!("expected fault, got {other:?}"),
        }
        assert_eq!(stream.next().await, None);
        assert_eq!(decoder.stop_count(), 1);
        assert_eq!(session.controls().unwrap_err(), SessionError::NoActiveSession);
        assert!(registry.is_empty());

        session.stop();
        assert_eq!(decoder.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_wrapped_stop_is_idempotent() {
        let (decoder, _registry, session) = setup();
        let mut stream = session.start(&device("cam"), &target()).await;

        let controls = session.controls().unwrap();
        controls.stop();
        controls.stop();

        assert_eq!(decoder.stop_count(), 1);
        assert_eq!(stream.next().await, None);

        decoder.emit(Err(DecodeError::device_lost("after stop")));
        assert_eq!(decoder.stop_count(), 1);
        assert!(session.controls().is_err());
    }

    #[tokio::test]
    async fn test_start_failure_faults_stream() {
        let (decoder, registry, session) = setup();
        decoder.fail_next_start(DecodeError::new(DecodeErrorKind::Setup, "no camera"));

        let mut stream = session.start(&device("cam"), &target()).await;
        assert!(stream.is_terminated());
        assert!(stream.next().await.unwrap().is_fatal());
        assert_eq!(stream.next().await, None);
        assert!(session.controls().is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_latest_outcome() {
        let (decoder, _registry, session) = setup();
        let stream = session.start(&device("cam"), &target()).await;

        decoder.emit(Err(DecodeError::not_found()));
        decoder.emit(Ok(DecodedResult::new("latest", BarcodeFormat::QrCode)));

        let mut late = stream.resubscribe();
        match late.next().await {
            Some(ScanOutcome::Success { payload }) => assert_eq!(payload.text, "latest"),
            other => panic!("expected replayed success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_new_start_stops_previous_session() {
        let (decoder, _registry, session) = setup();
        let mut first = session.start(&device("a"), &target()).await;
        let _second = session.start(&device("b"), &target()).await;

        assert_eq!(decoder.stop_count(), 1);
        assert_eq!(first.next().await, None);
        assert_eq!(session.controls().unwrap().device(), &device("b"));
    }

    #[tokio::test]
    async fn test_release_all_stops_session() {
        let (decoder, registry, session) = setup();
        let mut stream = session.start(&device("cam"), &target()).await;

        assert_eq!(registry.release_all(), 1);
        assert_eq!(decoder.stop_count(), 1);
        assert_eq!(stream.next().await, None);
        assert!(session.controls().is_err());
    }
}
