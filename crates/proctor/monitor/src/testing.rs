//! In-memory signal sources.
//!
//! Settable stand-ins for the host media layer and the vision backend, used by tests and by
//! trace replay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::media::{
    CameraFeed, DeviceError, DeviceKind, FocusSource, Frame, MediaDevices, MediaTrack,
    MicrophoneFeed,
};
use crate::vision::{DetectedEntity, VisionBackend, VisionError};

/// Camera that returns whatever frame was last set.
pub struct StaticCamera {
    frame: RwLock<Option<Frame>>,
    stopped: AtomicBool,
}

impl StaticCamera {
    /// A camera producing a black 64x48 frame.
    pub fn ready() -> Self {
        Self {
            frame: RwLock::new(Some(Frame::filled(64, 48, [0, 0, 0]))),
            stopped: AtomicBool::new(false),
        }
    }

    /// A camera whose stream has not produced a frame yet.
    pub fn not_ready() -> Self {
        Self {
            frame: RwLock::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn set_frame(&self, frame: Option<Frame>) {
        *self.frame.write() = frame;
    }
}

impl MediaTrack for StaticCamera {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Camera
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraFeed for StaticCamera {
    async fn capture(&self) -> Option<Frame> {
        if self.is_stopped() {
            return None;
        }
        self.frame.read().clone()
    }
}

/// Microphone whose analyser reports a flat spectrum at a settable level.
pub struct StaticMicrophone {
    level: RwLock<Option<u8>>,
    stopped: AtomicBool,
}

impl StaticMicrophone {
    pub fn with_level(level: u8) -> Self {
        Self {
            level: RwLock::new(Some(level)),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn silent() -> Self {
        Self::with_level(0)
    }

    /// `None` simulates an analyser that is not initialized yet.
    pub fn set_level(&self, level: Option<u8>) {
        *self.level.write() = level;
    }
}

impl MediaTrack for StaticMicrophone {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Microphone
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MicrophoneFeed for StaticMicrophone {
    async fn frequency_data(&self) -> Option<Vec<u8>> {
        if self.is_stopped() {
            return None;
        }
        self.level.read().map(|level| vec![level; 64])
    }
}

/// Vision backend that reports a settable scene for every frame.
pub struct SceneVision {
    scene: RwLock<Result<Vec<DetectedEntity>, VisionError>>,
}

impl SceneVision {
    pub fn new(entities: Vec<DetectedEntity>) -> Self {
        Self {
            scene: RwLock::new(Ok(entities)),
        }
    }

    /// A scene with exactly one confident face.
    pub fn single_face() -> Self {
        Self::new(vec![DetectedEntity::face(0.95)])
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            scene: RwLock::new(Err(VisionError(reason.to_string()))),
        }
    }

    pub fn set_scene(&self, entities: Vec<DetectedEntity>) {
        *self.scene.write() = Ok(entities);
    }
}

#[async_trait]
impl VisionBackend for SceneVision {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedEntity>, VisionError> {
        self.scene.read().clone()
    }

    fn name(&self) -> &str {
        "scene"
    }
}

/// Focus source with a settable flag.
pub struct ToggleFocus {
    focused: AtomicBool,
}

impl ToggleFocus {
    pub fn new(focused: bool) -> Self {
        Self {
            focused: AtomicBool::new(focused),
        }
    }

    pub fn set(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }
}

impl FocusSource for ToggleFocus {
    fn has_focus(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }
}

/// Media layer handing out the given feeds, or denying access when a feed is missing.
pub struct FakeDevices {
    camera: RwLock<Option<Arc<StaticCamera>>>,
    microphone: RwLock<Option<Arc<StaticMicrophone>>>,
}

impl FakeDevices {
    pub fn new(camera: Arc<StaticCamera>, microphone: Arc<StaticMicrophone>) -> Self {
        Self {
            camera: RwLock::new(Some(camera)),
            microphone: RwLock::new(Some(microphone)),
        }
    }

    pub fn deny_camera(&self) {
        *self.camera.write() = None;
    }

    pub fn grant_camera(&self, camera: Arc<StaticCamera>) {
        *self.camera.write() = Some(camera);
    }

    pub fn deny_microphone(&self) {
        *self.microphone.write() = None;
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn open_camera(&self) -> Result<Arc<dyn CameraFeed>, DeviceError> {
        match self.camera.read().clone() {
            Some(camera) => Ok(camera),
            None => Err(DeviceError::PermissionDenied),
        }
    }

    async fn open_microphone(&self) -> Result<Arc<dyn MicrophoneFeed>, DeviceError> {
        match self.microphone.read().clone() {
            Some(microphone) => Ok(microphone),
            None => Err(DeviceError::PermissionDenied),
        }
    }
}
