//! End-to-end tests of the async runtime with in-memory devices and paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use proctor_monitor::testing::{FakeDevices, SceneVision, StaticCamera, StaticMicrophone};
use proctor_monitor::{
    MediaTrack, MemorySink, ProctorError, ProctorSession, QuestionPlan, SessionHandle,
};
use proctor_types::{
    ActivityKind, MalpracticeCategory, ProctorConfig, SessionOutcome, SessionStatus, SubjectId,
    TerminationReason,
};

struct Rig {
    camera: Arc<StaticCamera>,
    microphone: Arc<StaticMicrophone>,
    devices: Arc<FakeDevices>,
    vision: Arc<SceneVision>,
    sink: Arc<MemorySink>,
}

impl Rig {
    fn new() -> Self {
        let camera = Arc::new(StaticCamera::ready());
        let microphone = Arc::new(StaticMicrophone::silent());
        Self {
            devices: Arc::new(FakeDevices::new(camera.clone(), microphone.clone())),
            camera,
            microphone,
            vision: Arc::new(SceneVision::single_face()),
            sink: Arc::new(MemorySink::new()),
        }
    }

    fn config() -> ProctorConfig {
        let mut config = ProctorConfig::default();
        config.session.answer_time_secs = 3600;
        config
    }

    fn session(&self, config: ProctorConfig) -> ProctorSession {
        ProctorSession::builder(
            config,
            SubjectId::new("runtime"),
            self.devices.clone(),
            self.vision.clone(),
        )
        .plan(QuestionPlan::new(2, Duration::from_secs(3600)))
        .sink(self.sink.clone())
        .build()
        .unwrap()
    }

    async fn start(&self, config: ProctorConfig) -> SessionHandle {
        let mut session = self.session(config);
        session.check_environment().await.unwrap();
        assert_eq!(session.status(), SessionStatus::EnvironmentCheck);
        session.start().await.unwrap()
    }
}

async fn wait_until_active(handle: &SessionHandle) {
    let mut status = handle.watch_status();
    status.wait_for(|s| *s == SessionStatus::Active).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_termination_releases_media_and_tasks() {
    let rig = Rig::new();
    let handle = rig.start(Rig::config()).await;
    wait_until_active(&handle).await;

    handle.terminate("proctor ended the session").await.unwrap();
    let report = handle.finished().await.unwrap();

    assert_eq!(
        report.outcome,
        SessionOutcome::Terminated {
            reason: TerminationReason::Manual {
                reason: "proctor ended the session".into()
            }
        }
    );
    assert!(rig.camera.is_stopped());
    assert!(rig.microphone.is_stopped());

    // aborted detector tasks drop their track handles
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(Arc::strong_count(&rig.camera), 2);
    assert_eq!(rig.sink.count_of(ActivityKind::SessionTerminated), 1);
}

#[tokio::test(start_paused = true)]
async fn test_denied_camera_keeps_session_unstarted() {
    let rig = Rig::new();
    rig.devices.deny_camera();
    let mut session = rig.session(Rig::config());

    let err = session.check_environment().await.unwrap_err();
    assert!(matches!(err, ProctorError::DeviceUnavailable { .. }));
    assert_eq!(session.status(), SessionStatus::NotStarted);
    assert!(rig.microphone.is_stopped());

    let replacement = Arc::new(StaticCamera::ready());
    rig.devices.grant_camera(replacement.clone());
    session.check_environment().await.unwrap();
    assert_eq!(session.status(), SessionStatus::EnvironmentCheck);
    assert!(!replacement.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_start_requires_environment_check() {
    let rig = Rig::new();
    let session = rig.session(Rig::config());

    let err = session.start().await.unwrap_err();
    assert!(matches!(
        err,
        ProctorError::InvalidState {
            status: SessionStatus::NotStarted,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_missing_face_terminates_after_grace_period() {
    let rig = Rig::new();
    let mut config = Rig::config();
    config.session.warning_cutoff = 100;
    let handle = rig.start(config).await;
    wait_until_active(&handle).await;

    rig.vision.set_scene(vec![]);
    let report = handle.finished().await.unwrap();

    match report.outcome {
        SessionOutcome::Terminated {
            reason: TerminationReason::NoFaceGracePeriod { elapsed_secs },
        } => assert!((60..=62).contains(&elapsed_secs)),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(rig.camera.is_stopped());
    assert!(report.warning_count(MalpracticeCategory::NoFace) >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_complete_through_handle() {
    let rig = Rig::new();
    let handle = rig.start(Rig::config()).await;
    wait_until_active(&handle).await;

    handle.submit_answer("ownership moves values").await.unwrap();
    handle.complete().await.unwrap();
    let mut status = handle.watch_status();
    status.wait_for(|s| s.is_terminal()).await.unwrap();
    assert_eq!(handle.status(), SessionStatus::Completed);

    let report = handle.finished().await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.answers.len(), 1);
    assert_eq!(report.answers[0].answer, "ownership moves values");
    assert_eq!(rig.sink.count_of(ActivityKind::SessionCompleted), 1);
}

#[tokio::test(start_paused = true)]
async fn test_commands_after_end_report_closed_session() {
    let rig = Rig::new();
    let handle = rig.start(Rig::config()).await;
    wait_until_active(&handle).await;

    handle.terminate("done").await.unwrap();
    let mut status = handle.watch_status();
    status.wait_for(|s| s.is_terminal()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = handle.pause("late").await.unwrap_err();
    assert!(matches!(err, ProctorError::SessionClosed));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_checked_session_releases_media() {
    let rig = Rig::new();
    let mut session = rig.session(Rig::config());
    session.check_environment().await.unwrap();
    assert!(!rig.camera.is_stopped());

    drop(session);
    assert!(rig.camera.is_stopped());
    assert!(rig.microphone.is_stopped());
}

#[test]
fn test_runtime_shutdown_releases_media() {
    let rig = Rig::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();
    let handle = runtime.block_on(async {
        let handle = rig.start(Rig::config()).await;
        wait_until_active(&handle).await;
        handle
    });
    assert!(!rig.camera.is_stopped());

    // shutting down the runtime drops the driver task mid-session
    drop(runtime);
    assert!(rig.camera.is_stopped());
    assert!(rig.microphone.is_stopped());
    drop(handle);
}
