use std::path::PathBuf;
use std::time::Duration;

use zonewatch::detect::ScriptedBackend;
use zonewatch::ingest::SourceSettings;
use zonewatch::sink::{MemoryLogSink, MemoryNotifier};
use zonewatch::{
    CaptureSession, ClassVocabulary, Controller, DetectionFilterPipeline, LoadedRegion,
    PipelineSettings, Point, Rect, RegionError, RegionOfInterest, SessionCommand, TimedDetector,
};

fn controller(region_path: PathBuf) -> Controller {
    let pipeline = DetectionFilterPipeline::new(
        PipelineSettings::default(),
        TimedDetector::new(ScriptedBackend::default(), Duration::from_secs(1)).unwrap(),
        ClassVocabulary::from_names(["person"]),
        Box::new(MemoryLogSink::new()),
        Box::new(MemoryNotifier::new()),
    );
    Controller::new(
        CaptureSession::new(SourceSettings::default()),
        pipeline,
        "stub://camera",
        region_path,
    )
}

#[test]
fn saved_region_reloads_with_same_corners() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restricted_area.txt");

    let region = RegionOfInterest::with_rect(Rect::from_corners(
        Point::new(10, 20),
        Point::new(300, 250),
    ));
    region.save(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "10,20\n300,250\n");

    let LoadedRegion::Loaded(loaded) = RegionOfInterest::load(&path).unwrap() else {
        panic!("expected a loaded region");
    };
    let rect = loaded.rect().unwrap();
    assert_eq!(rect.top_left, Point::new(10, 20));
    assert_eq!(rect.bottom_right, Point::new(300, 250));
    assert!(loaded.is_enabled());
}

#[test]
fn drawn_region_round_trips_through_commands() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restricted_area.txt");
    let mut first = controller(path.clone());

    assert_eq!(first.apply(SessionCommand::SaveRegion), "Error: no region defined");
    first.apply(SessionCommand::BeginRegion);
    first.apply(SessionCommand::Anchor(Point::new(300, 250)));
    first.apply(SessionCommand::Opposite(Point::new(10, 20)));
    assert_eq!(first.apply(SessionCommand::EndRegion), "Restricted Area Defined");
    assert_eq!(first.apply(SessionCommand::SaveRegion), "Restricted Area Saved");

    let mut second = controller(path);
    assert_eq!(second.apply(SessionCommand::LoadRegion), "Restricted Area Loaded");
    assert_eq!(second.region().rect(), first.region().rect());
    assert!(second.region().contains(Point::new(11, 21)));
    assert!(!second.region().contains(Point::new(10, 21)));
}

#[test]
fn missing_region_file_resets_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path().join("absent.txt"));
    *controller.region_mut() =
        RegionOfInterest::with_rect(Rect::from_corners(Point::new(0, 0), Point::new(5, 5)));

    assert_eq!(
        controller.apply(SessionCommand::LoadRegion),
        "No saved restricted area."
    );
    assert!(controller.region().rect().is_none());
    assert!(controller.region().contains(Point::new(1_000, 1_000)));
}

#[test]
fn malformed_region_file_leaves_region_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restricted_area.txt");
    std::fs::write(&path, "10,20\nthree hundred,250\n").unwrap();

    assert!(matches!(
        RegionOfInterest::load(&path),
        Err(RegionError::Malformed { line: 2, .. })
    ));

    let mut controller = controller(path);
    let existing = Rect::from_corners(Point::new(1, 1), Point::new(50, 50));
    *controller.region_mut() = RegionOfInterest::with_rect(existing);
    assert!(controller
        .apply(SessionCommand::LoadRegion)
        .starts_with("Error: region file"));
    assert_eq!(controller.region().rect(), Some(existing));
}
