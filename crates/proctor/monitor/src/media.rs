//! Media capability contracts
//!
//! The host supplies camera, microphone and focus signals through these traits. The monitor
//! never touches capture hardware itself; it only samples feeds and stops tracks when a
//! session ends.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture device kinds required by the environment check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Camera,
    Microphone,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Camera => f.write_str("camera"),
            DeviceKind::Microphone => f.write_str("microphone"),
        }
    }
}

/// Why a device could not be opened
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("no device found")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

/// A still RGBA image captured from the camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA bytes, `width * height * 4` long
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (rgba.len() == expected).then_some(Self {
            width,
            height,
            rgba,
        })
    }

    /// A frame filled with one opaque colour
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut rgba = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// A live capture track that holds hardware until stopped
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> DeviceKind;

    /// Release the underlying hardware. Must be idempotent.
    fn stop(&self);

    fn is_stopped(&self) -> bool;
}

/// Camera track that can produce a still frame on demand
#[async_trait]
pub trait CameraFeed: MediaTrack {
    /// Current frame, or `None` when the stream is not ready yet.
    async fn capture(&self) -> Option<Frame>;
}

/// Microphone track with a frequency analyser attached
#[async_trait]
pub trait MicrophoneFeed: MediaTrack {
    /// Frequency-bin magnitudes (0-255), or `None` while the analyser is uninitialized.
    async fn frequency_data(&self) -> Option<Vec<u8>>;
}

/// Whether the hosting page currently has input focus
pub trait FocusSource: Send + Sync {
    fn has_focus(&self) -> bool;
}

/// Host media layer
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn open_camera(&self) -> Result<Arc<dyn CameraFeed>, DeviceError>;

    async fn open_microphone(&self) -> Result<Arc<dyn MicrophoneFeed>, DeviceError>;
}

/// The tracks acquired for one session
#[derive(Clone)]
pub struct MediaSet {
    pub camera: Arc<dyn CameraFeed>,
    pub microphone: Arc<dyn MicrophoneFeed>,
}

impl MediaSet {
    pub fn stop_all(&self) {
        self.camera.stop();
        self.microphone.stop();
    }

    pub fn all_stopped(&self) -> bool {
        self.camera.is_stopped() && self.microphone.is_stopped()
    }
}

/// Tracks held by one session. Dropping the lease stops every track.
#[derive(Debug)]
pub struct MediaLease {
    media: MediaSet,
}

impl MediaLease {
    pub fn new(media: MediaSet) -> Self {
        Self { media }
    }

    pub fn media(&self) -> &MediaSet {
        &self.media
    }

    pub fn release(&self) {
        self.media.stop_all();
    }
}

impl Drop for MediaLease {
    fn drop(&mut self) {
        self.media.stop_all();
    }
}

impl fmt::Debug for MediaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSet")
            .field("camera_stopped", &self.camera.is_stopped())
            .field("microphone_stopped", &self.microphone.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_frame_length_is_checked() {
        assert!(Frame::new(2, 2, vec![0; 16]).is_some());
        assert!(Frame::new(2, 2, vec![0; 15]).is_none());
    }

    struct Track(AtomicBool);

    impl MediaTrack for Track {
        fn kind(&self) -> DeviceKind {
            DeviceKind::Camera
        }

        fn stop(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        fn is_stopped(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CameraFeed for Track {
        async fn capture(&self) -> Option<Frame> {
            None
        }
    }

    #[async_trait]
    impl MicrophoneFeed for Track {
        async fn frequency_data(&self) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn test_dropping_lease_stops_tracks() {
        let camera = Arc::new(Track(AtomicBool::new(false)));
        let microphone = Arc::new(Track(AtomicBool::new(false)));
        let lease = MediaLease::new(MediaSet {
            camera: camera.clone(),
            microphone: microphone.clone(),
        });
        assert!(!lease.media().all_stopped());

        drop(lease);
        assert!(camera.is_stopped());
        assert!(microphone.is_stopped());
    }

    #[test]
    fn test_filled_frame() {
        let frame = Frame::filled(3, 2, [10, 20, 30]);
        assert_eq!(frame.rgba.len(), 24);
        assert_eq!(&frame.rgba[4..8], &[10, 20, 30, 255]);
        assert!(frame.same_dimensions(&Frame::filled(3, 2, [0, 0, 0])));
        assert!(!frame.same_dimensions(&Frame::filled(2, 3, [0, 0, 0])));
    }
}
