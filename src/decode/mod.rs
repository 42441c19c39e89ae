//! Decode vocabulary and the decode collaborator seam.
//!
//! The barcode algorithm itself lives behind [`DecodeCollaborator`] (or,
//! for polled sources, [`FrameDecoder`]). This module only defines what an
//! attempt can produce and how those results are classified.

mod collaborator;
mod hints;
mod outcome;
mod polling;
mod scripted;

pub use collaborator::{
    AttemptCallback, ControlError, ControlHandle, DecodeCollaborator, DecoderFactory,
};
pub use hints::{parse_formats, BarcodeFormat, DecodeHints, FormatError};
pub use outcome::{
    classify, DecodeError, DecodeErrorKind, DecodedResult, FaultClass, ScanOutcome,
    NO_READER_DETECTED,
};
pub use polling::{FrameDecoder, FrameSourceFactory, PollingDecoder, PollingDecoderFactory};
pub use scripted::{CallLog, DecoderCall, ScriptedDecoder, ScriptedDecoderFactory};
