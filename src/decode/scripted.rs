//! A decoder driven by hand, for tests and demos.
//!
//! [`ScriptedDecoder`] never looks at frames. Whoever holds it pushes
//! attempts through [`ScriptedDecoder::emit`], and every start/stop lands
//! in a shared [`CallLog`] so ordering between sessions can be asserted.

use super::collaborator::{
    AttemptCallback, ControlError, ControlHandle, DecodeCollaborator, DecoderFactory,
};
use super::hints::DecodeHints;
use super::outcome::{DecodeError, DecodedResult};
use crate::capture::{DeviceId, DisplayTarget, ReaderOptions, VideoConstraints};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A call observed by a scripted decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderCall {
    Start(DeviceId),
    Stop(DeviceId),
    Torch(bool),
    Constraints(VideoConstraints),
    Hints(DecodeHints),
}

/// Ordered log shared by every decoder a factory creates.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<DecoderCall>>>);

impl CallLog {
    pub fn push(&self, call: DecoderCall) {
        self.0.lock().push(call);
    }

    pub fn entries(&self) -> Vec<DecoderCall> {
        self.0.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&DecoderCall) -> bool) -> usize {
        self.0.lock().iter().filter(|c| predicate(c)).count()
    }
}

/// Hand-driven decode collaborator.
pub struct ScriptedDecoder {
    log: CallLog,
    hints: Mutex<DecodeHints>,
    options: ReaderOptions,
    callback: Mutex<Option<AttemptCallback>>,
    start_error: Mutex<Option<DecodeError>>,
    torch: bool,
    stops: Arc<AtomicUsize>,
}

impl ScriptedDecoder {
    pub fn new(log: CallLog, hints: DecodeHints, options: ReaderOptions) -> Self {
        Self {
            log,
            hints: Mutex::new(hints),
            options,
            callback: Mutex::new(None),
            start_error: Mutex::new(None),
            torch: false,
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Advertises torch support on every handle this decoder returns.
    pub fn with_torch(mut self) -> Self {
        self.torch = true;
        self
    }

    /// Makes the next start fail with `error`.
    pub fn fail_next_start(&self, error: DecodeError) {
        *self.start_error.lock() = Some(error);
    }

    /// Pushes one attempt through the most recently registered callback.
    ///
    /// Returns false if nothing was ever started.
    pub fn emit(&self, attempt: Result<DecodedResult, DecodeError>) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(attempt);
                true
            }
            None => false,
        }
    }

    /// Number of times any handle from this decoder was stopped.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn hints(&self) -> DecodeHints {
        self.hints.lock().clone()
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }
}

#[async_trait]
impl DecodeCollaborator for ScriptedDecoder {
    async fn decode_continuously(
        &self,
        device: &DeviceId,
        _target: &DisplayTarget,
        on_attempt: AttemptCallback,
    ) -> Result<Box<dyn ControlHandle>, DecodeError> {
        if let Some(error) = self.start_error.lock().take() {
            return Err(error);
        }
        self.log.push(DecoderCall::Start(device.clone()));
        *self.callback.lock() = Some(on_attempt);
        Ok(Box::new(ScriptedControls {
            device: device.clone(),
            log: self.log.clone(),
            stops: Arc::clone(&self.stops),
            torch: self.torch,
        }))
    }

    fn set_hints(&self, hints: &DecodeHints) {
        *self.hints.lock() = hints.clone();
        self.log.push(DecoderCall::Hints(hints.clone()));
    }
}

struct ScriptedControls {
    device: DeviceId,
    log: CallLog,
    stops: Arc<AtomicUsize>,
    torch: bool,
}

impl ControlHandle for ScriptedControls {
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.log.push(DecoderCall::Stop(self.device.clone()));
    }

    fn supports_torch(&self) -> bool {
        self.torch
    }

    fn switch_torch(&self, on: bool) -> Result<(), ControlError> {
        if !self.torch {
            return Err(ControlError::Unsupported("torch"));
        }
        self.log.push(DecoderCall::Torch(on));
        Ok(())
    }

    fn apply_video_constraints(&self, constraints: &VideoConstraints) -> Result<(), ControlError> {
        self.log.push(DecoderCall::Constraints(constraints.clone()));
        Ok(())
    }
}

/// Factory producing [`ScriptedDecoder`]s that share one call log.
#[derive(Default)]
pub struct ScriptedDecoderFactory {
    log: CallLog,
    torch: bool,
    created: Mutex<Vec<Arc<ScriptedDecoder>>>,
}

impl ScriptedDecoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_torch() -> Self {
        Self {
            torch: true,
            ..Self::default()
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// The most recently created decoder.
    pub fn current(&self) -> Option<Arc<ScriptedDecoder>> {
        self.created.lock().last().cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl DecoderFactory for ScriptedDecoderFactory {
    fn create(&self, hints: &DecodeHints, options: &ReaderOptions) -> Arc<dyn DecodeCollaborator> {
        let mut decoder = ScriptedDecoder::new(self.log.clone(), hints.clone(), *options);
        if self.torch {
            decoder = decoder.with_torch();
        }
        let decoder = Arc::new(decoder);
        self.created.lock().push(Arc::clone(&decoder));
        decoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::BarcodeFormat;

    #[tokio::test]
    async fn test_emit_reaches_callback() {
        let decoder = ScriptedDecoder::new(CallLog::default(), DecodeHints::default(), ReaderOptions::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        assert!(!decoder.emit(Err(DecodeError::not_found())));

        let handle = decoder
            .decode_continuously(
                &DeviceId::new("cam"),
                &DisplayTarget::new("preview"),
                Arc::new(move |attempt| sink.lock().push(attempt.is_ok())),
            )
            .await
            .unwrap();

        assert!(decoder.emit(Ok(DecodedResult::new("x", BarcodeFormat::QrCode))));
        assert_eq!(*seen.lock(), vec![true]);

        handle.stop();
        assert_eq!(decoder.stop_count(), 1);
    }

    #[test]
    fn test_factory_tracks_instances() {
        let factory = ScriptedDecoderFactory::new();
        assert!(factory.current().is_none());

        factory.create(&DecodeHints::default(), &ReaderOptions::default());
        factory.create(&DecodeHints::default(), &ReaderOptions::default());
        assert_eq!(factory.created_count(), 2);
    }
}
