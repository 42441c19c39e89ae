//! Camera devices, configuration and the shared stream registry.
//!
//! This module owns everything on the media side of the scanner: the
//! device collaborator seam, display targets, the process-wide registry
//! of acquired streams, and the frame sources used by polling decoders.

mod camera;
mod config;
mod device;
mod frame;
#[cfg(feature = "camera")]
mod native;
mod registry;

pub use camera::{CameraError, FrameSource, MockCamera};
pub use config::{
    ConfigError, FacingMode, FileConfig, MetricsConfig, ReaderOptions, ScannerConfig,
    VideoConstraints, DEFAULT_SCAN_DELAY_MS,
};
pub use device::{
    DeviceCall, DeviceCollaborator, DeviceError, DeviceId, DisplayTarget, MediaStream,
    MockDevices, VideoDevice,
};
pub use frame::Frame;
#[cfg(feature = "camera")]
pub use native::NativeDevices;
pub use registry::{RegistrationId, Releasable, StreamLease, StreamRegistry};
