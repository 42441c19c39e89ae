//! Wrapped control handle of a running scan session.

use super::subject::OutcomeSubject;
use crate::capture::{DeviceId, RegistrationId, Releasable, StreamRegistry, VideoConstraints};
use crate::decode::{ControlError, ControlHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors from session-level operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no scan session is running")]
    NoActiveSession,
}

/// Controls of one running session.
///
/// Stopping halts the decoder's loop, ends the session's stream and
/// drops the session from the stream registry. Stopping twice is a no-op.
pub struct SessionControls {
    device: DeviceId,
    inner: Box<dyn ControlHandle>,
    subject: Arc<OutcomeSubject>,
    accepting: Arc<AtomicBool>,
    stopped: AtomicBool,
    registration: Mutex<Option<(Arc<StreamRegistry>, RegistrationId)>>,
}

impl SessionControls {
    pub(crate) fn new(
        device: DeviceId,
        inner: Box<dyn ControlHandle>,
        subject: Arc<OutcomeSubject>,
        accepting: Arc<AtomicBool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            device,
            inner,
            subject,
            accepting,
            stopped: AtomicBool::new(false),
            registration: Mutex::new(None),
        })
    }

    pub(crate) fn register(self: &Arc<Self>, registry: &Arc<StreamRegistry>) {
        let id = registry.register(Arc::clone(self) as Arc<dyn Releasable>);
        *self.registration.lock() = Some((Arc::clone(registry), id));
    }

    pub(crate) fn belongs_to(&self, subject: &Arc<OutcomeSubject>) -> bool {
        Arc::ptr_eq(&self.subject, subject)
    }

    /// Device this session decodes from.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.accepting.store(false, Ordering::Release);
        if let Some((registry, id)) = self.registration.lock().take() {
            registry.deregister(id);
        }
        self.inner.stop();
        self.subject.complete();
        tracing::debug!(device = %self.device, "Scan session stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn supports_torch(&self) -> bool {
        self.inner.supports_torch()
    }

    pub fn switch_torch(&self, on: bool) -> Result<(), ControlError> {
        self.inner.switch_torch(on)
    }

    pub fn apply_video_constraints(&self, constraints: &VideoConstraints) -> Result<(), ControlError> {
        self.inner.apply_video_constraints(constraints)
    }
}

impl Releasable for SessionControls {
    fn release(&self) {
        self.stop();
    }
}

impl std::fmt::Debug for SessionControls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionControls")
            .field("device", &self.device)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
