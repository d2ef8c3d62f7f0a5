use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::frame::{WORKING_HEIGHT, WORKING_WIDTH};
use crate::ingest::SourceSettings;

const DEFAULT_CLASSES_PATH: &str = "assets/coco.txt";
const DEFAULT_REGION_PATH: &str = "restricted_area.txt";
const DEFAULT_LOG_PATH: &str = "detection_log.csv";
const DEFAULT_COOLDOWN_SECS: u64 = 5;
const DEFAULT_FRAME_SKIP: u64 = 3;
const DEFAULT_TICK_MS: u64 = 10;
const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_DETECT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_MQTT_BROKER: &str = "127.0.0.1:1883";
const DEFAULT_MQTT_TOPIC: &str = "zonewatch/detections";
const DEFAULT_MQTT_CLIENT_ID: &str = "zonewatchd";

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    classes_path: Option<PathBuf>,
    region_path: Option<PathBuf>,
    capture: Option<CaptureConfigFile>,
    detector: Option<DetectorConfigFile>,
    log: Option<LogConfigFile>,
    notify: Option<NotifyConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    frame_skip: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
    tick_ms: Option<u64>,
    camera_device: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<DetectorKind>,
    model_path: Option<PathBuf>,
    timeout_ms: Option<u64>,
    confidence: Option<f32>,
    iou: Option<f32>,
    input_size: Option<u32>,
    stub_class_id: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct LogConfigFile {
    kind: Option<LogKind>,
    path: Option<PathBuf>,
    cooldown_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct NotifyConfigFile {
    kind: Option<NotifyKind>,
    cooldown_secs: Option<u64>,
    broker: Option<String>,
    topic: Option<String>,
    client_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub classes_path: PathBuf,
    pub region_path: PathBuf,
    pub capture: CaptureSettings,
    pub detector: DetectorSettings,
    pub log: LogSettings,
    pub notify: NotifySettings,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Every `frame_skip`-th frame reaches the detector.
    pub frame_skip: u64,
    /// Working resolution frames are normalized to.
    pub width: u32,
    pub height: u32,
    /// Tick period of the control loop.
    pub tick: Duration,
    pub camera_device: String,
    pub target_fps: u32,
}

impl CaptureSettings {
    /// Capture parameters handed to frame sources.
    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            target_fps: self.target_fps,
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frame_skip: DEFAULT_FRAME_SKIP,
            width: WORKING_WIDTH,
            height: WORKING_HEIGHT,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            camera_device: DEFAULT_CAMERA_DEVICE.to_string(),
            target_fps: DEFAULT_CAMERA_FPS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Stub,
    Tract,
}

impl FromStr for DetectorKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(DetectorKind::Stub),
            "tract" => Ok(DetectorKind::Tract),
            other => Err(anyhow!("unknown detector backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: DetectorKind,
    pub model_path: Option<PathBuf>,
    pub timeout: Duration,
    pub confidence: f32,
    pub iou: f32,
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Class the stub backend reports.
    pub stub_class_id: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DetectorKind::Stub,
            model_path: None,
            timeout: Duration::from_millis(DEFAULT_DETECT_TIMEOUT_MS),
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_IOU,
            input_size: DEFAULT_INPUT_SIZE,
            stub_class_id: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Csv,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub kind: LogKind,
    pub path: PathBuf,
    pub cooldown: Duration,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            kind: LogKind::Csv,
            path: PathBuf::from(DEFAULT_LOG_PATH),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    None,
    Log,
    Pushbullet,
    Mqtt,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub kind: NotifyKind,
    pub cooldown: Duration,
    /// From `PUSHBULLET_API_KEY` only.
    pub pushbullet_api_key: Option<String>,
    pub broker: String,
    pub topic: String,
    pub client_id: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            kind: NotifyKind::Log,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            pushbullet_api_key: None,
            broker: DEFAULT_MQTT_BROKER.to_string(),
            topic: DEFAULT_MQTT_TOPIC.to_string(),
            client_id: DEFAULT_MQTT_CLIENT_ID.to_string(),
        }
    }
}

impl WatchConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ZONEWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Self {
        let capture = file.capture.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let log = file.log.unwrap_or_default();
        let notify = file.notify.unwrap_or_default();

        let capture_defaults = CaptureSettings::default();
        let detector_defaults = DetectorSettings::default();
        let log_defaults = LogSettings::default();
        let notify_defaults = NotifySettings::default();

        Self {
            classes_path: file
                .classes_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLASSES_PATH)),
            region_path: file
                .region_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REGION_PATH)),
            capture: CaptureSettings {
                frame_skip: capture.frame_skip.unwrap_or(capture_defaults.frame_skip),
                width: capture.width.unwrap_or(capture_defaults.width),
                height: capture.height.unwrap_or(capture_defaults.height),
                tick: capture
                    .tick_ms
                    .map(Duration::from_millis)
                    .unwrap_or(capture_defaults.tick),
                camera_device: capture
                    .camera_device
                    .unwrap_or(capture_defaults.camera_device),
                target_fps: capture.target_fps.unwrap_or(capture_defaults.target_fps),
            },
            detector: DetectorSettings {
                backend: detector.backend.unwrap_or(detector_defaults.backend),
                model_path: detector.model_path,
                timeout: detector
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(detector_defaults.timeout),
                confidence: detector.confidence.unwrap_or(detector_defaults.confidence),
                iou: detector.iou.unwrap_or(detector_defaults.iou),
                input_size: detector.input_size.unwrap_or(detector_defaults.input_size),
                stub_class_id: detector
                    .stub_class_id
                    .unwrap_or(detector_defaults.stub_class_id),
            },
            log: LogSettings {
                kind: log.kind.unwrap_or(log_defaults.kind),
                path: log.path.unwrap_or(log_defaults.path),
                cooldown: log
                    .cooldown_secs
                    .map(Duration::from_secs)
                    .unwrap_or(log_defaults.cooldown),
            },
            notify: NotifySettings {
                kind: notify.kind.unwrap_or(notify_defaults.kind),
                cooldown: notify
                    .cooldown_secs
                    .map(Duration::from_secs)
                    .unwrap_or(notify_defaults.cooldown),
                pushbullet_api_key: None,
                broker: notify.broker.unwrap_or(notify_defaults.broker),
                topic: notify.topic.unwrap_or(notify_defaults.topic),
                client_id: notify.client_id.unwrap_or(notify_defaults.client_id),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_nonempty("ZONEWATCH_CLASSES") {
            self.classes_path = PathBuf::from(path);
        }
        if let Some(path) = env_nonempty("ZONEWATCH_REGION_FILE") {
            self.region_path = PathBuf::from(path);
        }
        if let Some(path) = env_nonempty("ZONEWATCH_LOG_PATH") {
            self.log.path = PathBuf::from(path);
        }
        if let Some(secs) = env_nonempty("ZONEWATCH_LOG_COOLDOWN_SECS") {
            let seconds: u64 = secs.parse().map_err(|_| {
                anyhow!("ZONEWATCH_LOG_COOLDOWN_SECS must be an integer number of seconds")
            })?;
            self.log.cooldown = Duration::from_secs(seconds);
        }
        if let Some(secs) = env_nonempty("ZONEWATCH_NOTIFY_COOLDOWN_SECS") {
            let seconds: u64 = secs.parse().map_err(|_| {
                anyhow!("ZONEWATCH_NOTIFY_COOLDOWN_SECS must be an integer number of seconds")
            })?;
            self.notify.cooldown = Duration::from_secs(seconds);
        }
        if let Some(skip) = env_nonempty("ZONEWATCH_FRAME_SKIP") {
            self.capture.frame_skip = skip
                .parse()
                .map_err(|_| anyhow!("ZONEWATCH_FRAME_SKIP must be a positive integer"))?;
        }
        if let Some(backend) = env_nonempty("ZONEWATCH_DETECTOR") {
            self.detector.backend = backend.parse()?;
        }
        if let Some(key) = env_nonempty("PUSHBULLET_API_KEY") {
            self.notify.pushbullet_api_key = Some(key);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.capture.frame_skip == 0 {
            return Err(anyhow!("capture.frame_skip must be at least 1"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture width and height must be greater than zero"));
        }
        if self.detector.timeout.is_zero() {
            return Err(anyhow!("detector.timeout_ms must be greater than zero"));
        }
        if self.detector.backend == DetectorKind::Tract && self.detector.model_path.is_none() {
            return Err(anyhow!("tract detector requires detector.model_path"));
        }
        if self.notify.kind == NotifyKind::Pushbullet && self.notify.pushbullet_api_key.is_none() {
            return Err(anyhow!(
                "pushbullet notifications require the PUSHBULLET_API_KEY environment variable"
            ));
        }
        Ok(())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
