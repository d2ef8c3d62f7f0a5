use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use zonewatch::config::{DetectorKind, LogKind, NotifyKind, WatchConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ZONEWATCH_CONFIG",
        "ZONEWATCH_CLASSES",
        "ZONEWATCH_REGION_FILE",
        "ZONEWATCH_LOG_PATH",
        "ZONEWATCH_LOG_COOLDOWN_SECS",
        "ZONEWATCH_NOTIFY_COOLDOWN_SECS",
        "ZONEWATCH_FRAME_SKIP",
        "ZONEWATCH_DETECTOR",
        "PUSHBULLET_API_KEY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = WatchConfig::load().expect("load defaults");

    assert_eq!(cfg.classes_path.to_str(), Some("assets/coco.txt"));
    assert_eq!(cfg.region_path.to_str(), Some("restricted_area.txt"));
    assert_eq!(cfg.capture.frame_skip, 3);
    assert_eq!((cfg.capture.width, cfg.capture.height), (1020, 500));
    assert_eq!(cfg.capture.tick, Duration::from_millis(10));
    assert_eq!(cfg.capture.camera_device, "/dev/video0");
    assert_eq!(cfg.detector.backend, DetectorKind::Stub);
    assert_eq!(cfg.detector.timeout, Duration::from_millis(2000));
    assert_eq!(cfg.log.kind, LogKind::Csv);
    assert_eq!(cfg.log.path.to_str(), Some("detection_log.csv"));
    assert_eq!(cfg.log.cooldown, Duration::from_secs(5));
    assert_eq!(cfg.notify.kind, NotifyKind::Log);
    assert_eq!(cfg.notify.cooldown, Duration::from_secs(5));

    clear_env();
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "classes_path": "/etc/zonewatch/classes.txt",
        "capture": { "frame_skip": 5, "tick_ms": 40, "camera_device": "/dev/video2" },
        "detector": { "timeout_ms": 750, "confidence": 0.4 },
        "log": { "kind": "sqlite", "path": "/var/lib/zonewatch/log.db", "cooldown_secs": 30 },
        "notify": { "kind": "mqtt", "topic": "yard/alerts" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("ZONEWATCH_CONFIG", file.path());
    std::env::set_var("ZONEWATCH_LOG_COOLDOWN_SECS", "12");
    std::env::set_var("ZONEWATCH_REGION_FILE", "/tmp/area.txt");

    let cfg = WatchConfig::load().expect("load config");

    assert_eq!(cfg.classes_path.to_str(), Some("/etc/zonewatch/classes.txt"));
    assert_eq!(cfg.region_path.to_str(), Some("/tmp/area.txt"));
    assert_eq!(cfg.capture.frame_skip, 5);
    assert_eq!(cfg.capture.tick, Duration::from_millis(40));
    assert_eq!(cfg.capture.camera_device, "/dev/video2");
    assert_eq!(cfg.detector.timeout, Duration::from_millis(750));
    assert!((cfg.detector.confidence - 0.4).abs() < f32::EPSILON);
    assert_eq!(cfg.log.kind, LogKind::Sqlite);
    assert_eq!(cfg.log.cooldown, Duration::from_secs(12));
    assert_eq!(cfg.notify.kind, NotifyKind::Mqtt);
    assert_eq!(cfg.notify.topic, "yard/alerts");
    assert_eq!(cfg.notify.broker, "127.0.0.1:1883");

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    std::fs::write(
        file.path(),
        "region_path = \"zones/gate.txt\"\n\n[notify]\nkind = \"none\"\ncooldown_secs = 60\n",
    )
    .expect("write config");
    std::env::set_var("ZONEWATCH_CONFIG", file.path());

    let cfg = WatchConfig::load().expect("load config");
    assert_eq!(cfg.region_path.to_str(), Some("zones/gate.txt"));
    assert_eq!(cfg.notify.kind, NotifyKind::None);
    assert_eq!(cfg.notify.cooldown, Duration::from_secs(60));

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ZONEWATCH_FRAME_SKIP", "0");
    assert!(WatchConfig::load().is_err());
    std::env::set_var("ZONEWATCH_FRAME_SKIP", "three");
    assert!(WatchConfig::load().is_err());
    clear_env();

    std::env::set_var("ZONEWATCH_DETECTOR", "magic");
    assert!(WatchConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "notify": { "kind": "pushbullet" } }"#)
        .expect("write config");
    std::env::set_var("ZONEWATCH_CONFIG", file.path());
    let err = WatchConfig::load().unwrap_err();
    assert!(err.to_string().contains("PUSHBULLET_API_KEY"));

    std::env::set_var("PUSHBULLET_API_KEY", "o.test-key");
    let cfg = WatchConfig::load().expect("key from env");
    assert_eq!(cfg.notify.pushbullet_api_key.as_deref(), Some("o.test-key"));

    clear_env();
}
