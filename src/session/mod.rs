//! Continuous scan sessions.
//!
//! A session binds one device and one display target to a decoder and
//! exposes the decoder's per-attempt callbacks as a [`ScanStream`].

mod continuous;
mod controls;
mod subject;

pub use continuous::ContinuousScanSession;
pub use controls::{SessionControls, SessionError};
pub use subject::{OutcomeSubject, ScanStream};
