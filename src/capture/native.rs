//! Native device enumeration backed by `nokhwa`.

use super::device::{DeviceCollaborator, DeviceError, DeviceId, DisplayTarget, MediaStream, VideoDevice};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use std::sync::atomic::{AtomicU64, Ordering};

/// Device collaborator talking to the platform camera stack.
///
/// There is no preview surface natively, so display binding is a no-op.
/// Stream acquisition opens and immediately closes the first camera: it
/// exists to check access, which is all the scanner asks of it.
#[derive(Debug, Default)]
pub struct NativeDevices {
    next_stream: AtomicU64,
}

impl NativeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_access_stream(&self) -> Result<MediaStream, DeviceError> {
        let cameras = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| DeviceError::NotSupported(e.to_string()))?;
        let info = cameras
            .first()
            .ok_or_else(|| DeviceError::NotFound("no cameras reported by backend".into()))?;

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = nokhwa::Camera::new(info.index().clone(), format)
            .map_err(|e| DeviceError::NotReadable(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| DeviceError::NotReadable(e.to_string()))?;
        if let Err(e) = camera.stop_stream() {
            tracing::warn!(error = %e, "Failed to stop access stream");
        }

        Ok(MediaStream {
            id: self.next_stream.fetch_add(1, Ordering::Relaxed),
            device: Some(DeviceId::new(index_string(info.index()))),
        })
    }
}

fn index_string(index: &CameraIndex) -> String {
    match index {
        CameraIndex::Index(i) => i.to_string(),
        CameraIndex::String(s) => s.clone(),
    }
}

#[async_trait]
impl DeviceCollaborator for NativeDevices {
    async fn list_video_inputs(&self) -> Result<Vec<VideoDevice>, DeviceError> {
        let cameras = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| DeviceError::NotSupported(e.to_string()))?;
        Ok(cameras
            .iter()
            .map(|info| VideoDevice::new(index_string(info.index()), info.human_name()))
            .collect())
    }

    async fn acquire_any_stream(&self) -> Result<MediaStream, DeviceError> {
        self.open_access_stream()
    }

    fn release_stream(&self, stream: &MediaStream) {
        tracing::debug!(stream = stream.id, "Native access stream already closed");
    }

    fn bind_display_target(&self, target: &DisplayTarget) {
        tracing::debug!(target = %target, "No native preview surface to bind");
    }

    fn unbind_display_target(&self, target: &DisplayTarget) {
        tracing::debug!(target = %target, "No native preview surface to unbind");
    }
}
