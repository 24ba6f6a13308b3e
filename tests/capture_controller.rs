use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use object_capture::capture::{
    CaptureAction, CaptureController, CaptureStore, FrameOutcome, TargetSpec, VideoWriter,
};
use object_capture::detect::{BoundingBox, Detection, DetectionEvent};
use object_capture::frame::Frame;

#[derive(Default)]
struct Ledger {
    screenshots: Vec<PathBuf>,
    videos_opened: usize,
    videos_finished: usize,
    dropped_unfinished: usize,
    open_now: usize,
    max_open: usize,
    frames_per_video: Vec<u64>,
    fail_writes: bool,
}

#[derive(Clone, Default)]
struct MemoryStore {
    ledger: Rc<RefCell<Ledger>>,
}

struct MemoryWriter {
    ledger: Rc<RefCell<Ledger>>,
    video: usize,
    finished: bool,
}

impl CaptureStore for MemoryStore {
    fn save_screenshot(&mut self, label: &str, _frame: &Frame) -> Result<PathBuf> {
        let mut ledger = self.ledger.borrow_mut();
        let path = PathBuf::from(format!(
            "saved_screenshot/screenshot_{}_{}.jpg",
            label,
            ledger.screenshots.len()
        ));
        ledger.screenshots.push(path.clone());
        Ok(path)
    }

    fn open_video(
        &mut self,
        label: &str,
        _width: u32,
        _height: u32,
        fps: u32,
    ) -> Result<(PathBuf, Box<dyn VideoWriter>)> {
        assert_eq!(fps, 20);
        let mut ledger = self.ledger.borrow_mut();
        let video = ledger.videos_opened;
        ledger.videos_opened += 1;
        ledger.open_now += 1;
        ledger.max_open = ledger.max_open.max(ledger.open_now);
        ledger.frames_per_video.push(0);
        let path = PathBuf::from(format!("saved_video/video_{}_{}.mp4", label, video));
        let writer = MemoryWriter {
            ledger: self.ledger.clone(),
            video,
            finished: false,
        };
        Ok((path, Box::new(writer)))
    }
}

impl VideoWriter for MemoryWriter {
    fn write_frame(&mut self, _frame: &Frame) -> Result<()> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.fail_writes {
            return Err(anyhow!("write failed"));
        }
        ledger.frames_per_video[self.video] += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<u64> {
        self.finished = true;
        let mut ledger = self.ledger.borrow_mut();
        ledger.videos_finished += 1;
        ledger.open_now -= 1;
        Ok(ledger.frames_per_video[self.video])
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if !self.finished {
            let mut ledger = self.ledger.borrow_mut();
            ledger.dropped_unfinished += 1;
            ledger.open_now -= 1;
        }
    }
}

fn controller(label: &str, action: CaptureAction) -> (CaptureController<MemoryStore>, MemoryStore) {
    let store = MemoryStore::default();
    let target = TargetSpec::new(label).unwrap();
    (CaptureController::new(target, action, store.clone()), store)
}

fn event(label: &str, confidence: f32) -> DetectionEvent {
    DetectionEvent::new(vec![Detection::new(
        label,
        confidence,
        BoundingBox::new(0.1, 0.1, 0.2, 0.2),
    )])
}

fn present(label: &str, yes: bool) -> DetectionEvent {
    if yes {
        event(label, 0.9)
    } else {
        DetectionEvent::default()
    }
}

fn frame() -> Frame {
    Frame::filled(8, 6, [0, 0, 0])
}

#[test]
fn screenshot_once_per_contiguous_presence() {
    let (mut controller, store) = controller("person", CaptureAction::Screenshot);
    let mut session = controller.initialize();
    let t0 = Instant::now();

    let pattern = [true, true, true, false, false, true, true];
    let outcomes: Vec<FrameOutcome> = pattern
        .iter()
        .enumerate()
        .map(|(i, &seen)| {
            controller.process_frame(
                &mut session,
                &frame(),
                &present("person", seen),
                t0 + Duration::from_millis(50 * i as u64),
            )
        })
        .collect();

    assert_eq!(
        outcomes,
        vec![
            FrameOutcome::ScreenshotWritten(PathBuf::from(
                "saved_screenshot/screenshot_person_0.jpg"
            )),
            FrameOutcome::Idle,
            FrameOutcome::Idle,
            FrameOutcome::Idle,
            FrameOutcome::Idle,
            FrameOutcome::ScreenshotWritten(PathBuf::from(
                "saved_screenshot/screenshot_person_1.jpg"
            )),
            FrameOutcome::Idle,
        ]
    );
    assert_eq!(store.ledger.borrow().screenshots.len(), 2);
    assert_eq!(store.ledger.borrow().videos_opened, 0);
    assert!(session.object_in_frame());
}

#[test]
fn screenshot_ignores_other_labels_and_low_confidence() {
    let (mut controller, store) = controller("Person", CaptureAction::Screenshot);
    let mut session = controller.initialize();
    let now = Instant::now();

    assert_eq!(
        controller.process_frame(&mut session, &frame(), &event("dog", 0.99), now),
        FrameOutcome::Idle
    );
    assert_eq!(
        controller.process_frame(&mut session, &frame(), &event("person", 0.6), now),
        FrameOutcome::Idle
    );
    assert!(!session.object_in_frame());

    // label match is case-insensitive
    let outcome = controller.process_frame(&mut session, &frame(), &event("PERSON", 0.61), now);
    assert!(matches!(outcome, FrameOutcome::ScreenshotWritten(_)));
    assert_eq!(store.ledger.borrow().screenshots.len(), 1);
}

#[test]
fn video_runs_five_seconds_then_restarts() {
    let (mut controller, store) = controller("cat", CaptureAction::Video);
    let mut session = controller.initialize();
    let t0 = Instant::now();

    let outcomes: Vec<FrameOutcome> = (0..=6)
        .map(|s| {
            controller.process_frame(
                &mut session,
                &frame(),
                &present("cat", true),
                t0 + Duration::from_secs(s),
            )
        })
        .collect();

    let first = PathBuf::from("saved_video/video_cat_0.mp4");
    let second = PathBuf::from("saved_video/video_cat_1.mp4");
    assert_eq!(outcomes[0], FrameOutcome::RecordingStarted(first.clone()));
    for outcome in &outcomes[1..5] {
        assert_eq!(*outcome, FrameOutcome::RecordingContinuing);
    }
    assert_eq!(outcomes[5], FrameOutcome::RecordingStopped(first));
    assert_eq!(outcomes[6], FrameOutcome::RecordingStarted(second));

    let ledger = store.ledger.borrow();
    assert_eq!(ledger.videos_opened, 2);
    assert_eq!(ledger.videos_finished, 1);
    assert_eq!(ledger.frames_per_video[0], 6);
    assert_eq!(ledger.max_open, 1);
    drop(ledger);
    assert!(session.is_recording());
}

#[test]
fn recording_keeps_writing_after_target_leaves() {
    let (mut controller, store) = controller("cat", CaptureAction::Video);
    let mut session = controller.initialize();
    let t0 = Instant::now();

    let started = controller.process_frame(&mut session, &frame(), &present("cat", true), t0);
    assert!(matches!(started, FrameOutcome::RecordingStarted(_)));
    assert_eq!(
        session.recording_deadline(),
        Some(t0 + Duration::from_secs(5))
    );

    for s in 1..5 {
        let outcome = controller.process_frame(
            &mut session,
            &frame(),
            &present("cat", false),
            t0 + Duration::from_secs(s),
        );
        assert_eq!(outcome, FrameOutcome::RecordingContinuing);
    }
    assert!(!session.object_in_frame());
    assert_eq!(store.ledger.borrow().frames_per_video[0], 5);

    let stopped = controller.process_frame(
        &mut session,
        &frame(),
        &present("cat", false),
        t0 + Duration::from_secs(5),
    );
    assert!(matches!(stopped, FrameOutcome::RecordingStopped(_)));

    let idle = controller.process_frame(
        &mut session,
        &frame(),
        &present("cat", false),
        t0 + Duration::from_secs(6),
    );
    assert_eq!(idle, FrameOutcome::Idle);
    assert_eq!(store.ledger.borrow().videos_finished, 1);
}

#[test]
fn continuous_detection_never_opens_two_writers() {
    let (mut controller, store) = controller("cat", CaptureAction::Video);
    let mut session = controller.initialize();
    let t0 = Instant::now();

    let mut started_at = None;
    for i in 0..60u64 {
        let now = t0 + Duration::from_millis(250 * i);
        match controller.process_frame(&mut session, &frame(), &present("cat", true), now) {
            FrameOutcome::RecordingStarted(_) => started_at = Some(now),
            FrameOutcome::RecordingStopped(_) => {
                let start = started_at.take().unwrap();
                assert!(now - start >= Duration::from_secs(5));
            }
            FrameOutcome::RecordingContinuing => assert!(started_at.is_some()),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    let ledger = store.ledger.borrow();
    assert_eq!(ledger.max_open, 1);
    assert!(ledger.videos_opened >= 2);
    assert_eq!(ledger.dropped_unfinished, 0);
}

#[test]
fn late_frame_stops_recording_immediately() {
    let (mut controller, store) = controller("cat", CaptureAction::Video);
    let mut session = controller.initialize();
    let t0 = Instant::now();

    controller.process_frame(&mut session, &frame(), &present("cat", true), t0);
    let outcome = controller.process_frame(
        &mut session,
        &frame(),
        &present("cat", false),
        t0 + Duration::from_secs(7),
    );
    assert!(matches!(outcome, FrameOutcome::RecordingStopped(_)));
    assert_eq!(store.ledger.borrow().frames_per_video[0], 2);
}

#[test]
fn write_failures_drop_frames_but_keep_recording() {
    let (mut controller, store) = controller("cat", CaptureAction::Video);
    let mut session = controller.initialize();
    let t0 = Instant::now();
    store.ledger.borrow_mut().fail_writes = true;

    let started = controller.process_frame(&mut session, &frame(), &present("cat", true), t0);
    assert!(matches!(started, FrameOutcome::RecordingStarted(_)));
    let next = controller.process_frame(
        &mut session,
        &frame(),
        &present("cat", true),
        t0 + Duration::from_secs(1),
    );
    assert_eq!(next, FrameOutcome::RecordingContinuing);
    assert!(session.is_recording());
    assert_eq!(store.ledger.borrow().frames_per_video[0], 0);

    // nothing reached the file, so the stop is reported as a failure
    let end = controller.process_frame(
        &mut session,
        &frame(),
        &present("cat", true),
        t0 + Duration::from_secs(5),
    );
    assert!(matches!(end, FrameOutcome::CaptureFailed(_)));
    assert_eq!(store.ledger.borrow().videos_finished, 1);
}

#[test]
fn shutdown_closes_writer_exactly_once() {
    let (mut controller, store) = controller("cat", CaptureAction::Video);
    let mut session = controller.initialize();
    let t0 = Instant::now();

    controller.process_frame(&mut session, &frame(), &present("cat", true), t0);
    assert!(session.is_recording());
    let path = PathBuf::from("saved_video/video_cat_0.mp4");
    assert_eq!(session.recording_path(), Some(path.as_path()));

    let closed = controller.shutdown(&mut session);
    assert_eq!(closed, Some(FrameOutcome::RecordingStopped(path)));
    assert!(!session.is_recording());
    assert_eq!(controller.shutdown(&mut session), None);

    let ledger = store.ledger.borrow();
    assert_eq!(ledger.videos_finished, 1);
    assert_eq!(ledger.open_now, 0);
    assert_eq!(ledger.dropped_unfinished, 0);
}

#[test]
fn shutdown_without_recording_is_a_no_op() {
    let (mut controller, store) = controller("cat", CaptureAction::Screenshot);
    let mut session = controller.initialize();
    assert_eq!(controller.shutdown(&mut session), None);
    assert_eq!(store.ledger.borrow().videos_finished, 0);
}

#[test]
fn dropping_session_closes_open_recording() {
    let (mut controller, store) = controller("cat", CaptureAction::Video);
    {
        let mut session = controller.initialize();
        controller.process_frame(&mut session, &frame(), &present("cat", true), Instant::now());
    }
    let ledger = store.ledger.borrow();
    assert_eq!(ledger.videos_finished, 1);
    assert_eq!(ledger.open_now, 0);
}

#[test]
fn empty_target_is_rejected() {
    assert!(TargetSpec::new("   ").is_err());
    let target = TargetSpec::new("  cell phone ").unwrap();
    assert_eq!(target.label(), "cell phone");
}
