//! Video input devices and the media capability surface.
//!
//! The scanner never talks to camera hardware directly. Everything it
//! needs (permission probing, enumeration, display binding) goes through
//! the [`DeviceCollaborator`] trait so hosts can plug in a browser bridge,
//! a native backend or the in-memory [`MockDevices`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque identifier of a video input device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A video input device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDevice {
    /// Opaque device identifier.
    pub id: DeviceId,
    /// Human-readable label. Empty until permission has been granted on
    /// most platforms.
    pub label: String,
}

impl VideoDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(id),
            label: label.into(),
        }
    }
}

/// Handle of the surface a live stream is rendered onto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayTarget(String);

impl DisplayTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An acquired media stream. Must be handed back through
/// [`DeviceCollaborator::release_stream`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaStream {
    /// Collaborator-assigned stream identifier.
    pub id: u64,
    /// Device the stream was opened on, when known.
    pub device: Option<DeviceId>,
}

/// Failures reported by the media capability.
///
/// The variants mirror the failure classes a media stack reports when a
/// stream is requested, so that permission handling can classify them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Capture is not supported here (insecure origin, missing backend).
    #[error("media capture not supported: {0}")]
    NotSupported(String),
    /// The user or a policy refused access.
    #[error("camera access denied: {0}")]
    NotAllowed(String),
    /// No video input device is attached.
    #[error("no video input device found: {0}")]
    NotFound(String),
    /// A device exists but its stream could not be read.
    #[error("could not read video input: {0}")]
    NotReadable(String),
    /// Anything the media stack reported that is not classified above.
    #[error("{name}: {message}")]
    Other { name: String, message: String },
}

impl DeviceError {
    /// Short name of the failure class.
    pub fn name(&self) -> &str {
        match self {
            DeviceError::NotSupported(_) => "NotSupportedError",
            DeviceError::NotAllowed(_) => "NotAllowedError",
            DeviceError::NotFound(_) => "NotFoundError",
            DeviceError::NotReadable(_) => "NotReadableError",
            DeviceError::Other { name, .. } => name,
        }
    }
}

/// The media capability consumed by the scanner.
#[async_trait]
pub trait DeviceCollaborator: Send + Sync {
    /// Lists the currently known video input devices.
    async fn list_video_inputs(&self) -> Result<Vec<VideoDevice>, DeviceError>;

    /// Acquires a stream from any video input. Used to trigger and check
    /// the permission grant.
    async fn acquire_any_stream(&self) -> Result<MediaStream, DeviceError>;

    /// Stops every track of a previously acquired stream.
    fn release_stream(&self, stream: &MediaStream);

    /// Attaches the live video to the display target.
    fn bind_display_target(&self, target: &DisplayTarget);

    /// Detaches whatever is bound to the display target.
    fn unbind_display_target(&self, target: &DisplayTarget);
}

/// A call observed by [`MockDevices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    List,
    Acquire,
    Release(u64),
    Bind(DisplayTarget),
    Unbind(DisplayTarget),
}

#[derive(Debug, Default)]
struct MockDevicesState {
    devices: Vec<VideoDevice>,
    hidden: bool,
    acquire_error: Option<DeviceError>,
    next_stream: u64,
    open_streams: Vec<u64>,
    calls: Vec<DeviceCall>,
}

/// In-memory device collaborator for tests and demos.
#[derive(Debug, Default)]
pub struct MockDevices {
    state: Mutex<MockDevicesState>,
}

impl MockDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock exposing the given devices, with permission granted.
    pub fn with_devices(devices: Vec<VideoDevice>) -> Self {
        let mock = Self::default();
        mock.set_devices(devices);
        mock
    }

    pub fn set_devices(&self, devices: Vec<VideoDevice>) {
        self.state.lock().devices = devices;
    }

    /// Makes enumeration report no devices while streams can still be
    /// acquired, as when the last camera vanishes after the grant.
    pub fn hide_devices(&self) {
        self.state.lock().hidden = true;
    }

    /// Makes every subsequent stream acquisition fail with `error`.
    pub fn fail_acquire(&self, error: DeviceError) {
        self.state.lock().acquire_error = Some(error);
    }

    /// Streams acquired and not yet released.
    pub fn open_streams(&self) -> usize {
        self.state.lock().open_streams.len()
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl DeviceCollaborator for MockDevices {
    async fn list_video_inputs(&self) -> Result<Vec<VideoDevice>, DeviceError> {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::List);
        if state.hidden {
            return Ok(Vec::new());
        }
        Ok(state.devices.clone())
    }

    async fn acquire_any_stream(&self) -> Result<MediaStream, DeviceError> {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Acquire);
        if let Some(error) = state.acquire_error.clone() {
            return Err(error);
        }
        let device = state.devices.first().map(|d| d.id.clone());
        if device.is_none() {
            return Err(DeviceError::NotFound("Requested device not found".into()));
        }
        state.next_stream += 1;
        let id = state.next_stream;
        state.open_streams.push(id);
        Ok(MediaStream { id, device })
    }

    fn release_stream(&self, stream: &MediaStream) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Release(stream.id));
        state.open_streams.retain(|id| *id != stream.id);
    }

    fn bind_display_target(&self, target: &DisplayTarget) {
        self.state.lock().calls.push(DeviceCall::Bind(target.clone()));
    }

    fn unbind_display_target(&self, target: &DisplayTarget) {
        self.state.lock().calls.push(DeviceCall::Unbind(target.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_stream_lifecycle() {
        let devices = MockDevices::with_devices(vec![VideoDevice::new("cam-1", "Back Camera")]);

        let stream = devices.acquire_any_stream().await.unwrap();
        assert_eq!(stream.device, Some(DeviceId::new("cam-1")));
        assert_eq!(devices.open_streams(), 1);

        devices.release_stream(&stream);
        assert_eq!(devices.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_acquire_without_devices_is_not_found() {
        let devices = MockDevices::new();
        let err = devices.acquire_any_stream().await.unwrap_err();
        assert_eq!(err.name(), "NotFoundError");
    }

    #[tokio::test]
    async fn test_configured_acquire_failure() {
        let devices = MockDevices::with_devices(vec![VideoDevice::new("cam-1", "")]);
        devices.fail_acquire(DeviceError::NotAllowed("Permission denied".into()));

        assert!(matches!(
            devices.acquire_any_stream().await,
            Err(DeviceError::NotAllowed(_))
        ));
        assert_eq!(devices.open_streams(), 0);
    }
}
