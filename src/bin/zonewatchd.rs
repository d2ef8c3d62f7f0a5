//! zonewatchd - restricted-area detection daemon
//!
//! This daemon:
//! 1. Captures frames from a camera or a local video file
//! 2. Runs every third frame through the configured detector
//! 3. Keeps detections of the selected class fully inside the restricted area
//! 4. Appends rate-limited records to the detection log
//! 5. Sends rate-limited notifications
//!
//! Control commands are read from stdin, one per line (`camera`, `file <path>`,
//! `stop`, `pause`, `resume`, `define`, `anchor x,y`, `opposite x,y`, `done`,
//! `toggle`, `save`, `load`, `class <name>`, `quit`).

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use zonewatch::detect::build_backend;
use zonewatch::sink::{open_log_sink, open_notifier};
use zonewatch::{
    run_loop, CaptureSession, ClassVocabulary, Controller, DetectionFilterPipeline,
    IntervalTicker, PipelineOutcome, PipelineSettings, Point, SessionCommand, TimedDetector,
    WatchConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Restricted-area object detection daemon")]
struct Args {
    /// Start capturing from the configured camera.
    #[arg(long, conflicts_with = "file")]
    camera: bool,

    /// Start processing a local video file.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Only count detections of this class ("All" for every class).
    #[arg(long, env = "ZONEWATCH_CLASS", value_name = "NAME")]
    class: Option<String>,

    /// Restricted area as two corners: x1,y1,x2,y2.
    #[arg(long, value_name = "X1,Y1,X2,Y2", value_parser = parse_region, conflicts_with = "load_region")]
    region: Option<(Point, Point)>,

    /// Restore the restricted area saved in the region file.
    #[arg(long)]
    load_region: bool,

    /// Stop after this many ticks.
    #[arg(long, value_name = "N")]
    max_ticks: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = WatchConfig::load()?;

    let vocabulary = ClassVocabulary::load(&cfg.classes_path)?;
    let backend = build_backend(&cfg.detector)?;
    let detector = TimedDetector::new(backend, cfg.detector.timeout)
        .context("failed to start detector worker")?;
    let pipeline = DetectionFilterPipeline::new(
        PipelineSettings::from_config(&cfg),
        detector,
        vocabulary,
        open_log_sink(&cfg.log)?,
        open_notifier(&cfg.notify)?,
    );
    let session = CaptureSession::new(cfg.capture.source_settings());
    let mut controller = Controller::new(
        session,
        pipeline,
        cfg.capture.camera_device.clone(),
        cfg.region_path.clone(),
    );

    if let Some((a, b)) = args.region {
        for cmd in [
            SessionCommand::BeginRegion,
            SessionCommand::Anchor(a),
            SessionCommand::Opposite(b),
            SessionCommand::EndRegion,
        ] {
            controller.apply(cmd);
        }
    }
    if args.load_region {
        controller.apply(SessionCommand::LoadRegion);
    }
    if let Some(class) = args.class {
        controller.apply(SessionCommand::SetClassFilter(class));
    }
    if args.camera {
        controller.apply(SessionCommand::StartCamera);
    } else if let Some(path) = args.file {
        controller.apply(SessionCommand::SelectFile(path));
    }

    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(SessionCommand::Quit);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    spawn_stdin_reader(tx)?;

    let mut ticker = IntervalTicker::new(cfg.capture.tick);
    if let Some(limit) = args.max_ticks {
        ticker = ticker.with_limit(limit);
    }

    let exit = run_loop(&mut controller, &mut ticker, &rx, true, |_, outcome| {
        if let PipelineOutcome::Processed(out) = outcome {
            for b in &out.accepted {
                log::debug!(
                    "frame {}: {} ({:.2}) at {} - {}",
                    out.frame.seq(),
                    b.label,
                    b.confidence,
                    b.top_left,
                    b.bottom_right
                );
            }
        }
    });
    log::info!("zonewatchd exiting ({:?})", exit);
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<SessionCommand>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<SessionCommand>() {
                    Ok(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("ignoring command: {}", e),
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(())
}

fn parse_region(value: &str) -> Result<(Point, Point), String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [x1, y1, x2, y2] = parts[..] else {
        return Err(format!("expected x1,y1,x2,y2, got {:?}", value));
    };
    let a: Point = format!("{},{}", x1, y1).parse()?;
    let b: Point = format!("{},{}", x2, y2).parse()?;
    Ok((a, b))
}
