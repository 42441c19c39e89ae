//! The decode capability consumed by scan sessions.
//!
//! A decode collaborator runs its own loop against a device and reports
//! every attempt through a callback. It hands back a [`ControlHandle`]
//! that stops the loop and, depending on the backend, drives auxiliary
//! hardware such as the torch.

use super::hints::DecodeHints;
use super::outcome::{DecodeError, DecodedResult};
use crate::capture::{DeviceId, DisplayTarget, ReaderOptions, VideoConstraints};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Callback invoked once per decode attempt.
pub type AttemptCallback = Arc<dyn Fn(Result<DecodedResult, DecodeError>) + Send + Sync>;

/// Errors from auxiliary controls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("control not supported by this device: {0}")]
    Unsupported(&'static str),
    #[error("failed to apply control: {0}")]
    Failed(String),
}

/// Control over a running decode loop.
pub trait ControlHandle: Send + Sync {
    /// Halts the decode loop and releases the device stream.
    fn stop(&self);

    /// True if [`switch_torch`](Self::switch_torch) can succeed.
    fn supports_torch(&self) -> bool {
        false
    }

    fn switch_torch(&self, _on: bool) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("torch"))
    }

    fn apply_video_constraints(&self, _constraints: &VideoConstraints) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("video constraints"))
    }
}

/// A barcode decoder able to scan continuously from a device.
#[async_trait]
pub trait DecodeCollaborator: Send + Sync {
    /// Starts decoding frames from `device` rendered into `target`.
    ///
    /// `on_attempt` is invoked for every attempt until the returned handle
    /// is stopped. Setup failures are returned as errors.
    async fn decode_continuously(
        &self,
        device: &DeviceId,
        target: &DisplayTarget,
        on_attempt: AttemptCallback,
    ) -> Result<Box<dyn ControlHandle>, DecodeError>;

    /// Replaces the hints used for subsequent attempts.
    fn set_hints(&self, hints: &DecodeHints);
}

/// Builds decoder instances.
///
/// Some auxiliary controls latch onto a specific decoder instance, so the
/// scanner occasionally throws its decoder away and asks for a new one.
pub trait DecoderFactory: Send + Sync {
    fn create(&self, hints: &DecodeHints, options: &ReaderOptions) -> Arc<dyn DecodeCollaborator>;
}
