use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::NaiveDate;

use zonewatch::detect::{RawDetection, ScriptedBackend, ScriptedReply};
use zonewatch::sink::{MemoryLogSink, MemoryNotifier, SqliteLogSink};
use zonewatch::{
    ClassFilter, ClassVocabulary, DetectionFilterPipeline, DetectorError, Frame, ManualClock,
    PipelineOutcome, PipelineSettings, Point, Rect, RegionOfInterest, TimedDetector,
};

fn coco() -> ClassVocabulary {
    ClassVocabulary::load(std::path::Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/assets/coco.txt"
    )))
    .expect("bundled vocabulary")
}

fn clock() -> ManualClock {
    ManualClock::starting_at(
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap(),
    )
}

fn frame(seq: u64) -> Frame {
    Frame::from_rgb(seq, 1020, 500, vec![90u8; 1020 * 500 * 3]).unwrap()
}

fn car() -> RawDetection {
    RawDetection::new(150.0, 150.0, 300.0, 300.0, 2, 0.91)
}

fn person() -> RawDetection {
    RawDetection::new(160.0, 120.0, 220.0, 340.0, 0, 0.88)
}

struct Harness {
    pipeline: DetectionFilterPipeline,
    log: MemoryLogSink,
    notify: MemoryNotifier,
    clock: ManualClock,
}

fn harness(backend: ScriptedBackend, settings: PipelineSettings) -> Harness {
    let log = MemoryLogSink::new();
    let notify = MemoryNotifier::new();
    let clock = clock();
    let detector = TimedDetector::new(backend, Duration::from_millis(500)).unwrap();
    let pipeline = DetectionFilterPipeline::new(
        settings,
        detector,
        coco(),
        Box::new(log.clone()),
        Box::new(notify.clone()),
    )
    .with_clock(clock.clone());
    Harness {
        pipeline,
        log,
        notify,
        clock,
    }
}

fn every_frame() -> PipelineSettings {
    PipelineSettings {
        skip_threshold: 1,
        ..PipelineSettings::default()
    }
}

#[test]
fn class_filter_keeps_only_selected_class() {
    let mut h = harness(ScriptedBackend::always(vec![car(), person()]), every_frame());
    let filter = ClassFilter::parse("car");
    let region = RegionOfInterest::new();

    let PipelineOutcome::Processed(out) = h.pipeline.process_tick(Some(frame(0)), &filter, &region)
    else {
        panic!("expected processed frame");
    };
    assert_eq!(out.accepted.len(), 1);
    assert_eq!(out.accepted[0].label, "car");

    let records = h.log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, "2024-05-01 08:30:00");
    assert_eq!(records[0].class_name, "car");

    let sent = h.notify.sent();
    assert_eq!(sent[0].title, "Object Detected: car");
    assert_eq!(sent[0].body, "At 2024-05-01 08:30:00, car was detected.");

    h.clock.advance(Duration::from_secs(1));
    h.pipeline.process_tick(Some(frame(1)), &filter, &region);
    assert_eq!(h.log.records().len(), 1, "log cooldown has not elapsed");
    assert_eq!(h.notify.sent().len(), 1);
}

#[test]
fn skipped_frames_never_reach_detector_or_sinks() {
    let backend = ScriptedBackend::always(vec![car()]);
    let calls = backend.call_counter();
    let mut h = harness(backend, PipelineSettings::default());
    let region = RegionOfInterest::new();

    let mut skipped = 0;
    for seq in 0..30 {
        h.clock.advance(Duration::from_secs(10));
        match h.pipeline.process_tick(Some(frame(seq)), &ClassFilter::All, &region) {
            PipelineOutcome::Skipped { .. } => skipped += 1,
            PipelineOutcome::Processed(_) => {}
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(skipped, 20);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(h.log.records().len(), 10);
    assert_eq!(h.notify.sent().len(), 10);
}

#[test]
fn partial_overlap_with_region_is_rejected() {
    let backend = ScriptedBackend::always(vec![
        RawDetection::new(200.0, 200.0, 450.0, 350.0, 2, 0.9),
        RawDetection::new(150.0, 150.0, 300.0, 300.0, 7, 0.9),
        RawDetection::new(100.0, 150.0, 300.0, 300.0, 5, 0.9),
    ]);
    let mut h = harness(backend, every_frame());
    let region = RegionOfInterest::with_rect(Rect::from_corners(
        Point::new(100, 100),
        Point::new(400, 400),
    ));

    let PipelineOutcome::Processed(out) =
        h.pipeline.process_tick(Some(frame(0)), &ClassFilter::All, &region)
    else {
        panic!("expected processed frame");
    };
    let labels: Vec<&str> = out.accepted.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["truck"], "boundary and overlapping boxes are excluded");
}

#[test]
fn disabled_region_passes_everything() {
    let backend = ScriptedBackend::always(vec![RawDetection::new(600.0, 300.0, 700.0, 400.0, 2, 0.9)]);
    let mut h = harness(backend, every_frame());
    let mut region = RegionOfInterest::with_rect(Rect::from_corners(
        Point::new(100, 100),
        Point::new(400, 400),
    ));

    let PipelineOutcome::Processed(out) =
        h.pipeline.process_tick(Some(frame(0)), &ClassFilter::All, &region)
    else {
        panic!("expected processed frame");
    };
    assert!(out.accepted.is_empty());

    assert!(!region.toggle());
    let PipelineOutcome::Processed(out) =
        h.pipeline.process_tick(Some(frame(1)), &ClassFilter::All, &region)
    else {
        panic!("expected processed frame");
    };
    assert_eq!(out.accepted.len(), 1);
}

#[test]
fn slow_detector_times_out_then_reports_busy() {
    let backend = ScriptedBackend::new()
        .then(ScriptedReply::Slow(Duration::from_millis(1_500), vec![car()]))
        .then_boxes(vec![car()]);
    let mut h = harness(backend, every_frame());
    let region = RegionOfInterest::new();

    let first = h.pipeline.process_tick(Some(frame(0)), &ClassFilter::All, &region);
    assert!(matches!(
        first,
        PipelineOutcome::Failed { seq: 0, error: DetectorError::Timeout(_) }
    ));
    let second = h.pipeline.process_tick(Some(frame(1)), &ClassFilter::All, &region);
    assert!(matches!(
        second,
        PipelineOutcome::Failed { seq: 1, error: DetectorError::Busy }
    ));
    assert!(h.log.records().is_empty());

    std::thread::sleep(Duration::from_millis(1_500));
    let third = h.pipeline.process_tick(Some(frame(2)), &ClassFilter::All, &region);
    assert!(matches!(third, PipelineOutcome::Processed(_)));
    assert_eq!(h.log.records().len(), 1);
}

#[test]
fn records_land_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("detections.db");
    let detector = TimedDetector::new(
        ScriptedBackend::always(vec![car()]),
        Duration::from_millis(500),
    )
    .unwrap();
    let clock = clock();
    let mut pipeline = DetectionFilterPipeline::new(
        every_frame(),
        detector,
        coco(),
        Box::new(SqliteLogSink::open(&db).unwrap()),
        Box::new(MemoryNotifier::new()),
    )
    .with_clock(clock.clone());

    for seq in 0..3 {
        pipeline.process_tick(Some(frame(seq)), &ClassFilter::All, &RegionOfInterest::new());
        clock.advance(Duration::from_secs(5));
    }
    drop(pipeline);

    let store = SqliteLogSink::open(&db).unwrap();
    let recent = store.recent(10).unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].timestamp, "2024-05-01 08:30:10");
    assert_eq!(recent[2].timestamp, "2024-05-01 08:30:00");
}

#[test]
fn detector_panic_loses_only_that_frame() {
    let backend = ScriptedBackend::always(vec![car()])
        .then(ScriptedReply::Panic("tensor index out of bounds".into()));
    let mut h = harness(backend, every_frame());
    let region = RegionOfInterest::new();

    let first = h.pipeline.process_tick(Some(frame(0)), &ClassFilter::All, &region);
    assert!(matches!(
        first,
        PipelineOutcome::Failed { seq: 0, error: DetectorError::Backend(_) }
    ));

    for seq in 1..4 {
        h.clock.advance(Duration::from_secs(5));
        let outcome = h.pipeline.process_tick(Some(frame(seq)), &ClassFilter::All, &region);
        assert!(
            matches!(outcome, PipelineOutcome::Processed(_)),
            "frame {} was {:?}",
            seq,
            outcome
        );
    }
    assert_eq!(h.log.records().len(), 3);
}

fn cooldowns(log: u64, notify: u64) -> PipelineSettings {
    PipelineSettings {
        skip_threshold: 1,
        log_cooldown: Duration::from_secs(log),
        notify_cooldown: Duration::from_secs(notify),
        ..PipelineSettings::default()
    }
}

#[test]
fn log_can_fire_while_notification_cools_down() {
    let mut h = harness(ScriptedBackend::always(vec![car()]), cooldowns(1, 5));
    let region = RegionOfInterest::new();

    h.pipeline.process_tick(Some(frame(0)), &ClassFilter::All, &region);
    h.clock.advance(Duration::from_secs(2));
    let PipelineOutcome::Processed(out) =
        h.pipeline.process_tick(Some(frame(1)), &ClassFilter::All, &region)
    else {
        panic!("expected processed frame");
    };
    assert_eq!(out.logged.len(), 1);
    assert!(out.notified.is_empty());

    let records = h.log.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].timestamp, "2024-05-01 08:30:02");
    assert_eq!(h.notify.sent().len(), 1);
}

#[test]
fn notification_can_fire_while_log_cools_down() {
    let mut h = harness(ScriptedBackend::always(vec![car()]), cooldowns(5, 1));
    let region = RegionOfInterest::new();

    h.pipeline.process_tick(Some(frame(0)), &ClassFilter::All, &region);
    h.clock.advance(Duration::from_secs(2));
    let PipelineOutcome::Processed(out) =
        h.pipeline.process_tick(Some(frame(1)), &ClassFilter::All, &region)
    else {
        panic!("expected processed frame");
    };
    assert!(out.logged.is_empty());
    assert_eq!(out.notified.len(), 1);

    assert_eq!(h.log.records().len(), 1);
    let sent = h.notify.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].body, "At 2024-05-01 08:30:02, car was detected.");
}
