// Integration tests for the session controller and event dispatch

use crossbeam::channel::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tether_camera::sdk::{
    CameraCommand, Capacity, ItemRef, ObjectEvent, SdkEvent, StateEvent, evf_output, save_to,
};
use tether_camera::{
    CameraError, EngineConfig, ExecutionEngine, Notification, PropertyId, PropertyValue,
    SdkStatus, SessionConfig, SessionController, SessionState, SimulatedCamera, tables,
};

fn setup(dir: &std::path::Path) -> (Arc<SimulatedCamera>, SessionController) {
    let camera = Arc::new(SimulatedCamera::new());
    let engine = ExecutionEngine::new(camera.clone(), EngineConfig::default());
    let config = SessionConfig {
        download_dir: dir.to_path_buf(),
        ..Default::default()
    };
    let controller = SessionController::new(engine, config).unwrap();
    (camera, controller)
}

fn wait_for<F>(rx: &Receiver<Notification>, timeout: Duration, matches: F) -> Option<Notification>
where
    F: Fn(&Notification) -> bool,
{
    let deadline = Instant::now() + timeout;
    while let Ok(notification) = rx.recv_deadline(deadline) {
        if matches(&notification) {
            return Some(notification);
        }
    }
    None
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_property_access_requires_open_session() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    assert_eq!(controller.state(), SessionState::Closed);

    let err = controller.get_u32(PropertyId::ISO_SPEED).unwrap_err();
    assert!(matches!(err, CameraError::SessionNotOpen));
    let err = controller.set_u32(PropertyId::ISO_SPEED, 0x50).unwrap_err();
    assert!(matches!(err, CameraError::SessionNotOpen));
    assert!(matches!(
        controller.start_live_view(),
        Err(CameraError::SessionNotOpen)
    ));

    let probe = camera.probe();
    assert_eq!(probe.count("get_property"), 0);
    assert_eq!(probe.count("set_property"), 0);
}

#[test]
fn test_oversized_text_is_rejected_before_device_call() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    controller.open_first().unwrap();

    let text = "x".repeat(33);
    let err = controller.set_text(PropertyId::ARTIST, &text).unwrap_err();
    assert!(matches!(err, CameraError::TextTooLong { len: 33, max: 32 }));
    let err = controller
        .set_property(PropertyId::ISO_SPEED, PropertyValue::Text("100".to_string()))
        .unwrap_err();
    assert!(err.is_precondition());
    let err = controller.get_u32(PropertyId::COPYRIGHT).unwrap_err();
    assert!(err.is_precondition());

    assert_eq!(camera.probe().count("set_property"), 0);
    assert_eq!(camera.probe().count("get_property"), 0);
}

#[test]
fn test_property_round_trip_notifies_with_symbolic_name() {
    let dir = tempfile::tempdir().unwrap();
    let (_camera, controller) = setup(dir.path());
    let rx = controller.subscribe();
    controller.open_first().unwrap();

    controller.set_text(PropertyId::ARTIST, "Jane Doe").unwrap();
    assert_eq!(controller.get_text(PropertyId::ARTIST).unwrap(), "Jane Doe");
    controller.set_u32(PropertyId::ISO_SPEED, 0x58).unwrap();
    assert_eq!(controller.get_u32(PropertyId::ISO_SPEED).unwrap(), 0x58);

    let changed = wait_for(&rx, Duration::from_secs(2), |n| {
        matches!(n, Notification::PropertyChanged { property, .. } if *property == PropertyId::ARTIST)
    });
    match changed {
        Some(Notification::PropertyChanged { name, .. }) => {
            assert_eq!(name, tables::property_name(PropertyId::ARTIST.0));
            assert_eq!(name, "Artist");
        }
        other => panic!("expected property change, got {:?}", other),
    }
}

#[test]
fn test_open_closes_previous_session() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    let second = camera.attach_camera("Second Body");

    controller.open_first().unwrap();
    controller.open(second.id).unwrap();

    assert_eq!(controller.state(), SessionState::Open);
    assert_eq!(controller.device().unwrap().name, "Second Body");
    let probe = camera.probe();
    assert_eq!(probe.count("open_session"), 2);
    assert_eq!(probe.count("close_session"), 1);
    // register + unregister for the first, register for the second
    assert_eq!(probe.count("set_event_handler"), 3);
    assert!(camera.has_event_handler());

    controller.close().unwrap();
    assert_eq!(controller.state(), SessionState::Closed);
    assert!(!camera.has_event_handler());
    controller.close().unwrap();
}

#[test]
fn test_open_unknown_device_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_camera, controller) = setup(dir.path());
    let err = controller.open(42).unwrap_err();
    assert_eq!(err.status(), Some(SdkStatus::DEVICE_NOT_FOUND));
    assert_eq!(controller.state(), SessionState::Closed);
}

#[test]
fn test_open_unknown_device_keeps_current_session() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    controller.open_first().unwrap();

    let err = controller.open(42).unwrap_err();
    assert_eq!(err.status(), Some(SdkStatus::DEVICE_NOT_FOUND));
    assert_eq!(controller.state(), SessionState::Open);
    assert_eq!(camera.probe().count("close_session"), 0);
    assert!(controller.get_u32(PropertyId::ISO_SPEED).is_ok());
}

#[test]
fn test_missing_item_is_reported_as_informational() {
    let dir = tempfile::tempdir().unwrap();
    let (_camera, controller) = setup(dir.path());
    let rx = controller.subscribe();
    controller.open_first().unwrap();

    controller.download(ItemRef(9999)).unwrap();
    let record = match wait_for(&rx, Duration::from_secs(5), |n| {
        matches!(n, Notification::SdkError(_))
    }) {
        Some(Notification::SdkError(record)) => record,
        other => panic!("expected an error record, got {:?}", other),
    };
    assert_eq!(record.name, "INVALID_HANDLE");
    assert!(!record.is_critical());
    assert_eq!(controller.state(), SessionState::Open);
}

#[test]
fn test_shutdown_event_closes_session_once() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    let rx = controller.subscribe();
    controller.open_first().unwrap();
    controller.start_live_view().unwrap();
    assert!(controller.is_live_view());

    // a second shutdown races the one fired by the disconnect
    camera.disconnect();
    let racer = camera.clone();
    let second = thread::spawn(move || {
        racer.emit(SdkEvent::State {
            event: StateEvent::Shutdown,
            param: 0,
        })
    });
    second.join().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        controller.state() == SessionState::Closed && !controller.is_live_view()
    }));
    thread::sleep(Duration::from_millis(100));

    let seen: Vec<_> = rx.try_iter().collect();
    let shutdowns = seen
        .iter()
        .filter(|n| matches!(n, Notification::CameraShutDown))
        .count();
    let closed = seen
        .iter()
        .filter(|n| matches!(n, Notification::SessionStateChanged(SessionState::Closed)))
        .count();
    assert_eq!(shutdowns, 1);
    assert_eq!(closed, 1);
    assert_eq!(controller.state(), SessionState::Closed);
    assert!(matches!(
        controller.get_u32(PropertyId::AV),
        Err(CameraError::SessionNotOpen)
    ));
}

#[test]
fn test_close_stops_live_view_and_restores_output() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    controller.open_first().unwrap();
    controller.start_live_view().unwrap();
    assert_eq!(
        camera.property(PropertyId::EVF_OUTPUT_DEVICE),
        Some(PropertyValue::UInt32(evf_output::TFT | evf_output::PC))
    );

    controller.close().unwrap();
    assert!(!controller.is_live_view());
    assert_eq!(controller.state(), SessionState::Closed);
    assert_eq!(
        camera.property(PropertyId::EVF_OUTPUT_DEVICE),
        Some(PropertyValue::UInt32(evf_output::TFT))
    );
}

#[test]
fn test_save_to_host_declares_capacity_and_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    let rx = controller.subscribe();
    controller.open_first().unwrap();

    let shots = dir.path().join("shots");
    controller.set_save_to_host(&shots).unwrap();
    assert_eq!(camera.capacity(), Some(Capacity::host_default()));
    assert_eq!(
        camera.property(PropertyId::SAVE_TO),
        Some(PropertyValue::UInt32(save_to::HOST))
    );

    controller.take_picture().unwrap();
    let downloaded = wait_for(&rx, Duration::from_secs(5), |n| {
        matches!(n, Notification::ImageDownloaded(_))
    });
    match downloaded {
        Some(Notification::ImageDownloaded(image)) => {
            assert!(image.path.starts_with(&shots));
            assert!(image.path.exists());
            assert_eq!(image.image.channels, 3);
        }
        other => panic!("expected a download, got {:?}", other),
    }
    assert!(camera.commands().contains(&CameraCommand::PressShutter(
        tether_camera::sdk::ShutterButton::Off
    )));
}

#[test]
fn test_stop_filming_downloads_the_movie() {
    let dir = tempfile::tempdir().unwrap();
    let (_camera, controller) = setup(dir.path());
    let rx = controller.subscribe();
    controller.open_first().unwrap();

    assert!(controller.stop_filming().unwrap_err().is_precondition());
    controller.start_filming().unwrap();
    assert_eq!(controller.state(), SessionState::Filming);
    controller.stop_filming().unwrap();
    assert_eq!(controller.state(), SessionState::Open);

    let movie = wait_for(&rx, Duration::from_secs(5), |n| {
        matches!(n, Notification::FileDownloaded { .. })
    });
    match movie {
        Some(Notification::FileDownloaded { path }) => {
            assert!(path.to_string_lossy().ends_with(".MOV"));
            assert!(path.exists());
        }
        other => panic!("expected the movie, got {:?}", other),
    }
}

#[test]
fn test_created_item_without_pending_video_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    let rx = controller.subscribe();
    controller.open_first().unwrap();

    let item = camera.add_item("MVI_0099.MOV", vec![1, 2, 3]);
    camera.emit(SdkEvent::Object {
        event: ObjectEvent::DirItemCreated,
        item,
    });
    assert!(
        wait_for(&rx, Duration::from_millis(300), |n| {
            matches!(n, Notification::FileDownloaded { .. })
        })
        .is_none()
    );

    camera.emit(SdkEvent::Object {
        event: ObjectEvent::DirItemRequestTransfer,
        item,
    });
    assert!(
        wait_for(&rx, Duration::from_secs(5), |n| {
            matches!(n, Notification::FileDownloaded { .. })
        })
        .is_some()
    );
}

#[test]
fn test_background_failure_is_published() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    let rx = controller.subscribe();
    controller.open_first().unwrap();

    camera.fail_next("send_command", SdkStatus::TAKE_PICTURE_AF_NG);
    controller.take_picture().unwrap();
    let error = wait_for(&rx, Duration::from_secs(5), |n| {
        matches!(n, Notification::SdkError(_))
    });
    match error {
        Some(Notification::SdkError(record)) => {
            assert_eq!(record.name, "TAKE_PICTURE_AF_NG");
            assert!(!record.is_critical());
        }
        other => panic!("expected an error, got {:?}", other),
    }
}

#[test]
fn test_keep_alive_extends_shutdown_timer() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    controller.open_first().unwrap();
    let warning = SdkEvent::State {
        event: StateEvent::WillSoonShutDown,
        param: 30,
    };

    camera.emit(warning);
    thread::sleep(Duration::from_millis(100));
    assert!(!camera.commands().contains(&CameraCommand::ExtendShutDownTimer));

    controller.set_keep_alive(true);
    camera.emit(warning);
    assert!(wait_until(Duration::from_secs(5), || {
        camera.commands().contains(&CameraCommand::ExtendShutDownTimer)
    }));
}

#[test]
fn test_bulb_exposure_opens_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    controller.open_first().unwrap();

    controller.bulb_exposure(Duration::from_millis(30)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        camera.commands().contains(&CameraCommand::BulbEnd)
    }));
    let commands = camera.commands();
    let start = commands.iter().position(|c| *c == CameraCommand::BulbStart);
    let end = commands.iter().position(|c| *c == CameraCommand::BulbEnd);
    assert!(start.is_some());
    assert!(start < end);
}

#[test]
fn test_camera_added_is_published() {
    let dir = tempfile::tempdir().unwrap();
    let (camera, controller) = setup(dir.path());
    let rx = controller.subscribe();
    camera.attach_camera("Spare");
    assert!(
        wait_for(&rx, Duration::from_secs(1), |n| matches!(n, Notification::CameraAdded)).is_some()
    );
    assert_eq!(controller.devices().unwrap().len(), 2);
}

#[test]
fn test_volumes_and_format() {
    let dir = tempfile::tempdir().unwrap();
    let (_camera, controller) = setup(dir.path());
    controller.open_first().unwrap();

    let volumes = controller.volumes().unwrap();
    assert_eq!(volumes.len(), 1);
    controller.format_volume(volumes[0].index).unwrap();
    let err = controller.format_volume(9).unwrap_err();
    assert_eq!(err.status(), Some(SdkStatus::INVALID_PARAMETER));
}
