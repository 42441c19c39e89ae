//! Camera Scanner Library
//!
//! Continuous barcode scanning from a camera. The library negotiates
//! camera permission, picks and switches video input devices, runs one
//! decode loop at a time and republishes every decode attempt on typed
//! notification channels.
//!
//! # Architecture
//!
//! ```text
//! capture (devices, streams) → session (decode loop → stream) → lifecycle (events)
//!                  ↑                   ↑
//!             decode (collaborators, formats, outcomes)
//! ```
//!
//! # Design Principles
//!
//! - **Collaborators at the edges**: media access and barcode decoding sit
//!   behind traits, so the state machine runs the same against a browser
//!   bridge, a native backend or in-memory mocks
//! - **One session at a time**: a device change fully stops the previous
//!   session before a new one is requested
//! - **Benign misses are not errors**: "nothing found" keeps the loop
//!   running; only device loss and setup failures end a session
//!
//! # Example
//!
//! ```no_run
//! use camera_scanner::{
//!     capture::{MockDevices, ScannerConfig, VideoDevice},
//!     decode::ScriptedDecoderFactory,
//!     lifecycle::{ScannerError, ScannerLifecycle},
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), ScannerError> {
//! let devices = Arc::new(MockDevices::with_devices(vec![
//!     VideoDevice::new("1", "Front Camera"),
//!     VideoDevice::new("2", "Back Camera"),
//! ]));
//! let decoders = Arc::new(ScriptedDecoderFactory::new());
//!
//! let mut scanner = ScannerLifecycle::new(ScannerConfig::default(), devices, decoders)?;
//! let mut results = scanner.events().scan_success.subscribe();
//!
//! // Asks for permission, picks the back camera and starts scanning.
//! scanner.init().await?;
//!
//! if let Ok(text) = results.recv().await {
//!     println!("scanned {text}");
//! }
//! scanner.shutdown();
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod decode;
pub mod lifecycle;
pub mod metrics;
pub mod session;

// Re-export commonly used types at crate root
pub use capture::{DeviceCollaborator, FileConfig, ScannerConfig, StreamRegistry, VideoDevice};
pub use decode::{BarcodeFormat, DecodeCollaborator, DecodeError, DecodedResult, ScanOutcome};
pub use lifecycle::{ScannerError, ScannerEvents, ScannerLifecycle};
pub use session::{ContinuousScanSession, ScanStream};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
