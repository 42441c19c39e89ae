//! Per-attempt decode results and their classification.
//!
//! Most frames contain no symbol at all, so a decode "error" is usually
//! just noise. [`classify`] separates that noise from faults that must end
//! a session.

use super::hints::BarcodeFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Message the multi-format reader reports when none of its readers
/// recognized anything in the frame.
pub const NO_READER_DETECTED: &str = "No MultiFormat Readers were able to detect the code.";

/// A successfully decoded symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedResult {
    /// Decoded text content.
    pub text: String,
    /// Symbology the content was decoded from.
    pub format: BarcodeFormat,
    /// Raw bytes, when the symbology carries them.
    #[serde(default)]
    pub raw_bytes: Option<Vec<u8>>,
    /// When the frame was decoded.
    pub decoded_at: DateTime<Utc>,
}

impl DecodedResult {
    pub fn new(text: impl Into<String>, format: BarcodeFormat) -> Self {
        Self {
            text: text.into(),
            format,
            raw_bytes: None,
            decoded_at: Utc::now(),
        }
    }
}

/// Failure classes reported by the decode collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeErrorKind {
    /// No symbol in the frame.
    NotFound,
    /// A symbol was found but failed its checksum.
    Checksum,
    /// A symbol was found but did not parse as its format.
    Format,
    /// The video input went away mid-session.
    DeviceLost,
    /// The decoder could not be set up.
    Setup,
    /// Anything else, by name.
    Other(String),
}

/// An error reported for one decode attempt or for session setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub message: String,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(DecodeErrorKind::NotFound, "No barcode found in frame")
    }

    pub fn device_lost(message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::DeviceLost, message)
    }

    /// Name of the failure class.
    pub fn name(&self) -> &str {
        match &self.kind {
            DecodeErrorKind::NotFound => "NotFoundException",
            DecodeErrorKind::Checksum => "ChecksumException",
            DecodeErrorKind::Format => "FormatException",
            DecodeErrorKind::DeviceLost => "DeviceLostError",
            DecodeErrorKind::Setup => "SetupError",
            DecodeErrorKind::Other(name) => name,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message)
    }
}

/// Whether a decode error lets the session continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    Benign,
    Fatal,
}

/// Classifies a decode error.
pub fn classify(error: &DecodeError) -> FaultClass {
    match error.kind {
        DecodeErrorKind::NotFound | DecodeErrorKind::Checksum | DecodeErrorKind::Format => {
            FaultClass::Benign
        }
        _ if error.message.contains(NO_READER_DETECTED) => FaultClass::Benign,
        _ => FaultClass::Fatal,
    }
}

/// What one decode attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// A symbol was decoded.
    Success { payload: DecodedResult },
    /// Nothing usable in this frame; scanning continues.
    BenignMiss { reason: DecodeError },
    /// The session cannot continue.
    FatalFault { cause: DecodeError },
}

impl ScanOutcome {
    /// Maps a raw attempt onto an outcome using [`classify`].
    pub fn from_attempt(attempt: Result<DecodedResult, DecodeError>) -> Self {
        match attempt {
            Ok(payload) => ScanOutcome::Success { payload },
            Err(error) => match classify(&error) {
                FaultClass::Benign => ScanOutcome::BenignMiss { reason: error },
                FaultClass::Fatal => ScanOutcome::FatalFault { cause: error },
            },
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanOutcome::FatalFault { .. })
    }
}
