//! Frame sources for the polling decoder.
//!
//! A [`FrameSource`] is the pull side of a video input: open it on a
//! device, grab frames, close it. Real backends and [`MockCamera`] share
//! the trait so the continuous decoder can be exercised without hardware.

use super::device::DeviceId;
use super::Frame;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
}

/// A pull-based source of preview frames.
pub trait FrameSource: Send {
    /// Opens the source on the given device.
    fn open(&mut self, device: &DeviceId) -> Result<(), CameraError>;

    /// Grabs the next frame.
    fn capture(&mut self) -> Result<Frame, CameraError>;

    fn is_open(&self) -> bool;

    /// Asks the device to keep autofocus on or off. Sources without focus
    /// control ignore it.
    fn set_autofocus(&mut self, _enabled: bool) {}

    /// Closes the source and releases the device.
    fn close(&mut self);
}

/// Mock camera producing synthetic frames.
#[derive(Debug)]
pub struct MockCamera {
    device: Option<DeviceId>,
    width: u32,
    height: u32,
    sequence: u64,
    fail_after: Option<u64>,
    autofocus: bool,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self {
            device: None,
            width: 64,
            height: 48,
            sequence: 0,
            fail_after: None,
            autofocus: true,
        }
    }
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the device being unplugged after `frames` captures.
    pub fn failing_after(frames: u64) -> Self {
        Self {
            fail_after: Some(frames),
            ..Self::default()
        }
    }

    pub fn autofocus(&self) -> bool {
        self.autofocus
    }
}

impl FrameSource for MockCamera {
    fn open(&mut self, device: &DeviceId) -> Result<(), CameraError> {
        if device.as_str().is_empty() {
            return Err(CameraError::DeviceNotFound("empty device id".into()));
        }
        self.device = Some(device.clone());
        self.sequence = 0;
        tracing::info!(device = %device, "MockCamera opened");
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let device = self.device.as_ref().ok_or(CameraError::NotInitialized)?;

        if self.fail_after.is_some_and(|limit| self.sequence >= limit) {
            return Err(CameraError::CaptureFailed("device disconnected".into()));
        }

        let pixel_count = (self.width * self.height) as usize;
        let luma: Vec<u8> = (0..pixel_count)
            .map(|i| ((i as u64 + self.sequence * 3) % 256) as u8)
            .collect();

        self.sequence += 1;
        Ok(Frame::new(
            luma,
            self.width,
            self.height,
            self.sequence,
            device.clone(),
        ))
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn set_autofocus(&mut self, enabled: bool) {
        self.autofocus = enabled;
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            tracing::info!("MockCamera closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_camera_lifecycle() {
        let mut camera = MockCamera::new();
        assert!(!camera.is_open());

        camera.open(&DeviceId::new("cam-1")).unwrap();
        assert!(camera.is_open());

        let frame = camera.capture().unwrap();
        assert!(frame.is_complete());
        assert_eq!(frame.sequence(), 1);
        assert_eq!(camera.capture().unwrap().sequence(), 2);

        camera.close();
        assert!(!camera.is_open());
    }

    #[test]
    fn test_capture_without_open() {
        let mut camera = MockCamera::new();
        assert!(matches!(camera.capture(), Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_failing_camera() {
        let mut camera = MockCamera::failing_after(1);
        camera.open(&DeviceId::new("cam-1")).unwrap();

        assert!(camera.capture().is_ok());
        assert!(matches!(camera.capture(), Err(CameraError::CaptureFailed(_))));
    }

    #[test]
    fn test_autofocus_defaults_on() {
        let mut camera = MockCamera::new();
        assert!(camera.autofocus());
        camera.set_autofocus(false);
        assert!(!camera.autofocus());
    }
}
