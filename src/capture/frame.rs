//! A single preview frame handed to the decoder.

use super::device::DeviceId;
use std::time::Instant;

/// One luminance frame grabbed from a video input.
#[derive(Clone)]
pub struct Frame {
    luma: Vec<u8>,
    width: u32,
    height: u32,
    captured_at: Instant,
    sequence: u64,
    device: DeviceId,
}

impl Frame {
    pub fn new(luma: Vec<u8>, width: u32, height: u32, sequence: u64, device: DeviceId) -> Self {
        Self {
            luma,
            width,
            height,
            captured_at: Instant::now(),
            sequence,
            device,
        }
    }

    /// Raw 8-bit luminance samples, row-major.
    #[inline]
    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Monotonic sequence number within one capture session.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Device the frame came from.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// True if the sample buffer matches the frame dimensions.
    pub fn is_complete(&self) -> bool {
        self.luma.len() == (self.width as usize) * (self.height as usize)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("device", &self.device)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("luma_bytes", &self.luma.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_frame() {
        let frame = Frame::new(vec![0u8; 320 * 240], 320, 240, 7, DeviceId::new("cam"));
        assert!(frame.is_complete());
        assert_eq!(frame.sequence(), 7);
        assert_eq!(frame.device().as_str(), "cam");
    }

    #[test]
    fn test_truncated_frame() {
        let frame = Frame::new(vec![0u8; 10], 320, 240, 1, DeviceId::new("cam"));
        assert!(!frame.is_complete());
    }
}
