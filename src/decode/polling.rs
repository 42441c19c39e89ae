//! Continuous decoding by polling a frame source.
//!
//! [`PollingDecoder`] turns a single-frame [`FrameDecoder`] into the
//! continuous decode capability: grab a frame, decode it, report the
//! attempt, wait, repeat. After a success it waits
//! `delay_between_scan_success` instead of `delay_between_scan_attempts`.

use super::collaborator::{AttemptCallback, ControlHandle, DecodeCollaborator, DecoderFactory};
use super::hints::DecodeHints;
use super::outcome::{DecodeError, DecodeErrorKind, DecodedResult};
use crate::capture::{DeviceId, DisplayTarget, Frame, FrameSource, ReaderOptions};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Decodes a single frame. This is the seam to the actual barcode library.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &Frame, hints: &DecodeHints) -> Result<DecodedResult, DecodeError>;
}

/// Opens a fresh frame source for every session.
pub type FrameSourceFactory = Arc<dyn Fn() -> Box<dyn FrameSource> + Send + Sync>;

/// Continuous decoder over a polled frame source.
pub struct PollingDecoder {
    sources: FrameSourceFactory,
    frames: Arc<dyn FrameDecoder>,
    hints: Arc<RwLock<DecodeHints>>,
    options: ReaderOptions,
}

impl PollingDecoder {
    pub fn new(
        sources: FrameSourceFactory,
        frames: Arc<dyn FrameDecoder>,
        hints: DecodeHints,
        options: ReaderOptions,
    ) -> Self {
        Self {
            sources,
            frames,
            hints: Arc::new(RwLock::new(hints)),
            options,
        }
    }
}

#[async_trait]
impl DecodeCollaborator for PollingDecoder {
    async fn decode_continuously(
        &self,
        device: &DeviceId,
        target: &DisplayTarget,
        on_attempt: AttemptCallback,
    ) -> Result<Box<dyn ControlHandle>, DecodeError> {
        let mut source = (self.sources)();
        source.set_autofocus(self.options.autofocus);
        source
            .open(device)
            .map_err(|e| DecodeError::new(DecodeErrorKind::Setup, e.to_string()))?;

        let controls = PollingControls {
            stopped: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        };

        tracing::debug!(device = %device, target = %target, "Starting polling decode loop");

        tokio::spawn(poll_frames(
            source,
            Arc::clone(&self.frames),
            Arc::clone(&self.hints),
            self.options,
            on_attempt,
            Arc::clone(&controls.stopped),
            Arc::clone(&controls.wake),
        ));

        Ok(Box::new(controls))
    }

    fn set_hints(&self, hints: &DecodeHints) {
        *self.hints.write() = hints.clone();
    }
}

async fn poll_frames(
    mut source: Box<dyn FrameSource>,
    frames: Arc<dyn FrameDecoder>,
    hints: Arc<RwLock<DecodeHints>>,
    options: ReaderOptions,
    on_attempt: AttemptCallback,
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
) {
    while !stopped.load(Ordering::Acquire) {
        let current = hints.read().clone();
        let attempt = match source.capture() {
            Ok(frame) => frames.decode(&frame, &current),
            Err(e) => Err(DecodeError::device_lost(e.to_string())),
        };

        let device_lost = matches!(&attempt, Err(e) if e.kind == DecodeErrorKind::DeviceLost);
        let delay = if attempt.is_ok() {
            options.delay_between_scan_success
        } else {
            options.delay_between_scan_attempts
        };

        on_attempt(attempt);
        if device_lost {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wake.notified() => {}
        }
    }

    source.close();
    tracing::debug!("Polling decode loop finished");
}

struct PollingControls {
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ControlHandle for PollingControls {
    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

/// Factory for [`PollingDecoder`]s sharing one frame decoder.
pub struct PollingDecoderFactory {
    sources: FrameSourceFactory,
    frames: Arc<dyn FrameDecoder>,
}

impl PollingDecoderFactory {
    pub fn new(sources: FrameSourceFactory, frames: Arc<dyn FrameDecoder>) -> Self {
        Self { sources, frames }
    }
}

impl DecoderFactory for PollingDecoderFactory {
    fn create(&self, hints: &DecodeHints, options: &ReaderOptions) -> Arc<dyn DecodeCollaborator> {
        Arc::new(PollingDecoder::new(
            Arc::clone(&self.sources),
            Arc::clone(&self.frames),
            hints.clone(),
            *options,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraError, MockCamera};
    use crate::decode::BarcodeFormat;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Finds a code in every second frame.
    struct EverySecondFrame;

    impl FrameDecoder for EverySecondFrame {
        fn decode(&self, frame: &Frame, hints: &DecodeHints) -> Result<DecodedResult, DecodeError> {
            if frame.sequence() % 2 == 0 && hints.accepts(BarcodeFormat::QrCode) {
                Ok(DecodedResult::new(format!("frame-{}", frame.sequence()), BarcodeFormat::QrCode))
            } else {
                Err(DecodeError::not_found())
            }
        }
    }

    fn decoder(camera: fn() -> MockCamera) -> PollingDecoder {
        let options = ReaderOptions {
            delay_between_scan_attempts: Duration::from_millis(10),
            delay_between_scan_success: Duration::from_millis(50),
            autofocus: true,
        };
        PollingDecoder::new(
            Arc::new(move || Box::new(camera()) as Box<dyn FrameSource>),
            Arc::new(EverySecondFrame),
            DecodeHints::default(),
            options,
        )
    }

    /// Remembers the focus mode it was asked for.
    struct FocusRecorder {
        camera: MockCamera,
        autofocus: Arc<parking_lot::Mutex<Option<bool>>>,
    }

    impl FrameSource for FocusRecorder {
        fn open(&mut self, device: &DeviceId) -> Result<(), CameraError> {
            self.camera.open(device)
        }

        fn capture(&mut self) -> Result<Frame, CameraError> {
            self.camera.capture()
        }

        fn is_open(&self) -> bool {
            self.camera.is_open()
        }

        fn set_autofocus(&mut self, enabled: bool) {
            *self.autofocus.lock() = Some(enabled);
        }

        fn close(&mut self) {
            self.camera.close();
        }
    }

    fn collector() -> (AttemptCallback, mpsc::UnboundedReceiver<Result<DecodedResult, DecodeError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(move |attempt| {
            let _ = tx.send(attempt);
        }), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_stopped() {
        let decoder = decoder(MockCamera::new);
        let (callback, mut rx) = collector();

        let controls = decoder
            .decode_continuously(&DeviceId::new("cam"), &DisplayTarget::new("preview"), callback)
            .await
            .unwrap();

        assert!(rx.recv().await.unwrap().is_err());
        let hit = rx.recv().await.unwrap().unwrap();
        assert_eq!(hit.text, "frame-2");
        assert!(rx.recv().await.unwrap().is_err());

        controls.stop();
        // The loop exits and drops its callback, closing the channel.
        while rx.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_failure_reports_device_lost() {
        let decoder = decoder(|| MockCamera::failing_after(1));
        let (callback, mut rx) = collector();

        decoder
            .decode_continuously(&DeviceId::new("cam"), &DisplayTarget::new("preview"), callback)
            .await
            .unwrap();

        assert!(rx.recv().await.unwrap().is_err());
        let lost = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(lost.kind, DecodeErrorKind::DeviceLost);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_open_failure_is_setup_error() {
        let decoder = decoder(MockCamera::new);
        let (callback, _rx) = collector();

        let result = decoder
            .decode_continuously(&DeviceId::new(""), &DisplayTarget::new("preview"), callback)
            .await;
        assert!(matches!(result, Err(e) if e.kind == DecodeErrorKind::Setup));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hints_apply_to_running_loop() {
        let decoder = decoder(MockCamera::new);
        decoder.set_hints(&DecodeHints {
            possible_formats: vec![BarcodeFormat::Ean13],
            try_harder: true,
        });
        let (callback, mut rx) = collector();

        let controls = decoder
            .decode_continuously(&DeviceId::new("cam"), &DisplayTarget::new("preview"), callback)
            .await
            .unwrap();

        for _ in 0..4 {
            assert!(rx.recv().await.unwrap().is_err());
        }
        controls.stop();
    }

    #[tokio::test]
    async fn test_autofocus_option_reaches_source() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let recorded = Arc::clone(&seen);
        let options = ReaderOptions {
            autofocus: false,
            ..ReaderOptions::default()
        };
        let decoder = PollingDecoder::new(
            Arc::new(move || {
                Box::new(FocusRecorder {
                    camera: MockCamera::new(),
                    autofocus: Arc::clone(&recorded),
                }) as Box<dyn FrameSource>
            }),
            Arc::new(EverySecondFrame),
            DecodeHints::default(),
            options,
        );
        let (callback, _rx) = collector();

        let controls = decoder
            .decode_continuously(&DeviceId::new("cam"), &DisplayTarget::new("preview"), callback)
            .await
            .unwrap();
        controls.stop();

        assert_eq!(*seen.lock(), Some(false));
    }
}
