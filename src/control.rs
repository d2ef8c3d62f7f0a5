//! Command-driven control surface.
//!
//! Front-ends send `SessionCommand`s; the `Controller` applies them between
//! ticks so a command never interleaves with pipeline work. `run_loop` drives
//! the controller from a `TickSource`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::classes::ClassFilter;
use crate::ingest::SourceSpec;
use crate::pipeline::{DetectionFilterPipeline, PipelineOutcome};
use crate::region::{LoadedRegion, Point, RegionOfInterest};
use crate::session::{CaptureSession, SessionState};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    StartCamera,
    SelectFile(PathBuf),
    Stop,
    Pause,
    Resume,
    TogglePause,
    BeginRegion,
    Anchor(Point),
    Opposite(Point),
    EndRegion,
    ToggleRegion,
    SaveRegion,
    LoadRegion,
    SetClassFilter(String),
    Quit,
}

impl FromStr for SessionCommand {
    type Err = String;

    /// Parses one control line, e.g. `file clip.mp4` or `anchor 10,20`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let needs_arg = |what: &str| {
            if rest.is_empty() {
                Err(format!("{} needs {}", word, what))
            } else {
                Ok(rest)
            }
        };
        let cmd = match word.to_ascii_lowercase().as_str() {
            "camera" => SessionCommand::StartCamera,
            "file" => SessionCommand::SelectFile(PathBuf::from(needs_arg("a path")?)),
            "stop" => SessionCommand::Stop,
            "pause" => SessionCommand::Pause,
            "resume" => SessionCommand::Resume,
            "playpause" => SessionCommand::TogglePause,
            "define" => SessionCommand::BeginRegion,
            "anchor" => SessionCommand::Anchor(needs_arg("x,y")?.parse()?),
            "opposite" => SessionCommand::Opposite(needs_arg("x,y")?.parse()?),
            "done" => SessionCommand::EndRegion,
            "toggle" => SessionCommand::ToggleRegion,
            "save" => SessionCommand::SaveRegion,
            "load" => SessionCommand::LoadRegion,
            "class" => SessionCommand::SetClassFilter(needs_arg("a class name")?.to_string()),
            "quit" | "exit" => SessionCommand::Quit,
            "" => return Err("empty command".to_string()),
            other => return Err(format!("unknown command {:?}", other)),
        };
        Ok(cmd)
    }
}

pub struct Controller {
    session: CaptureSession,
    pipeline: DetectionFilterPipeline,
    region: RegionOfInterest,
    class_filter: ClassFilter,
    camera_device: String,
    region_path: PathBuf,
    status: String,
    quit: bool,
}

impl Controller {
    pub fn new(
        session: CaptureSession,
        pipeline: DetectionFilterPipeline,
        camera_device: impl Into<String>,
        region_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            session,
            pipeline,
            region: RegionOfInterest::new(),
            class_filter: ClassFilter::All,
            camera_device: camera_device.into(),
            region_path: region_path.into(),
            status: String::new(),
            quit: false,
        }
    }

    /// Apply one command and return the resulting status message.
    pub fn apply(&mut self, cmd: SessionCommand) -> &str {
        let status = match cmd {
            SessionCommand::StartCamera => {
                self.start(SourceSpec::Camera(self.camera_device.clone()), "Webcam Started".into())
            }
            SessionCommand::SelectFile(path) => {
                let status = format!("Video Selected: {}", path.display());
                self.start(SourceSpec::File(path), status)
            }
            SessionCommand::Stop => {
                self.session.stop();
                "Webcam Stopped".to_string()
            }
            SessionCommand::Pause => {
                let changed = self.session.pause();
                self.pause_status(changed)
            }
            SessionCommand::Resume => {
                let changed = self.session.resume();
                self.resume_status(changed)
            }
            SessionCommand::TogglePause => {
                if self.session.state() == SessionState::Running {
                    let changed = self.session.pause();
                    self.pause_status(changed)
                } else {
                    let changed = self.session.resume();
                    self.resume_status(changed)
                }
            }
            SessionCommand::BeginRegion => {
                self.region.begin_definition();
                "Draw the restricted area".to_string()
            }
            SessionCommand::Anchor(p) => {
                if self.region.set_anchor(p) {
                    format!("Anchor at {}", p)
                } else {
                    "Not defining a restricted area".to_string()
                }
            }
            SessionCommand::Opposite(p) => {
                if self.region.set_opposite(p) {
                    match self.region.rect() {
                        Some(rect) => format!(
                            "Restricted Area Set: {} - {}",
                            rect.top_left, rect.bottom_right
                        ),
                        None => "Restricted Area Set".to_string(),
                    }
                } else {
                    "Set an anchor first".to_string()
                }
            }
            SessionCommand::EndRegion => {
                if self.region.end_definition() {
                    "Restricted Area Defined".to_string()
                } else {
                    "No restricted area defined".to_string()
                }
            }
            SessionCommand::ToggleRegion => {
                if self.region.toggle() {
                    "Restricted Area Enabled".to_string()
                } else {
                    "Restricted Area Disabled".to_string()
                }
            }
            SessionCommand::SaveRegion => match self.region.save(&self.region_path) {
                Ok(()) => {
                    log::info!("region saved to {}", self.region_path.display());
                    "Restricted Area Saved".to_string()
                }
                Err(err) => {
                    log::warn!("{}", err);
                    format!("Error: {}", err)
                }
            },
            SessionCommand::LoadRegion => self.load_region(),
            SessionCommand::SetClassFilter(name) => {
                let filter = ClassFilter::parse(&name);
                let known = match &filter {
                    ClassFilter::All => true,
                    ClassFilter::Only(label) => self.pipeline.vocabulary().id_of(label).is_some(),
                };
                if known {
                    self.class_filter = filter;
                    format!("Class Filter: {}", self.class_filter)
                } else {
                    format!("Unknown class: {}", filter)
                }
            }
            SessionCommand::Quit => {
                self.session.stop();
                self.quit = true;
                "Quitting".to_string()
            }
        };
        log::info!("{}", status);
        self.status = status;
        &self.status
    }

    /// Read at most one frame and run it through the pipeline.
    pub fn tick(&mut self) -> PipelineOutcome {
        let frame = self.session.next_frame();
        if let Some(err) = self.session.take_read_error() {
            self.status = format!("Error: {}", err);
        }
        let outcome = self
            .pipeline
            .process_tick(frame, &self.class_filter, &self.region);
        if let PipelineOutcome::Failed { error, .. } = &outcome {
            self.status = format!("Error: {}", error);
        }
        outcome
    }

    /// Restore the saved region. A missing file clears the region.
    pub fn load_region(&mut self) -> String {
        match RegionOfInterest::load(&self.region_path) {
            Ok(LoadedRegion::Loaded(region)) => {
                self.region = region;
                log::info!("region loaded from {}", self.region_path.display());
                "Restricted Area Loaded".to_string()
            }
            Ok(LoadedRegion::NotFound) => {
                self.region = RegionOfInterest::new();
                "No saved restricted area.".to_string()
            }
            Err(err) => {
                log::warn!("{}", err);
                format!("Error: {}", err)
            }
        }
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn region(&self) -> &RegionOfInterest {
        &self.region
    }

    pub fn region_mut(&mut self) -> &mut RegionOfInterest {
        &mut self.region
    }

    pub fn class_filter(&self) -> &ClassFilter {
        &self.class_filter
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    fn start(&mut self, spec: SourceSpec, ok_status: String) -> String {
        match self.session.start(spec) {
            Ok(()) => ok_status,
            Err(err) => {
                log::warn!("{}", err);
                format!("Error: {}", err)
            }
        }
    }

    fn pause_status(&self, changed: bool) -> String {
        if changed {
            "Video Paused".to_string()
        } else {
            format!("Cannot pause: session {}", self.session.state())
        }
    }

    fn resume_status(&self, changed: bool) -> String {
        if changed {
            "Video Resumed".to_string()
        } else {
            format!("Cannot resume: session {}", self.session.state())
        }
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.session.state())
            .field("class_filter", &self.class_filter)
            .field("region", &self.region)
            .field("status", &self.status)
            .finish()
    }
}

/// Paces the control loop.
pub trait TickSource {
    /// Block until the next tick. `false` ends the loop.
    fn wait(&mut self) -> bool;
}

/// Real-time ticker with a fixed period and an optional tick budget.
pub struct IntervalTicker {
    period: Duration,
    next: Option<Instant>,
    remaining: Option<u64>,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: None,
            remaining: None,
        }
    }

    pub fn with_limit(mut self, ticks: u64) -> Self {
        self.remaining = Some(ticks);
        self
    }
}

impl TickSource for IntervalTicker {
    fn wait(&mut self) -> bool {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return false;
            }
            *remaining -= 1;
        }
        let now = Instant::now();
        let due = self.next.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        // Late ticks are not made up for.
        self.next = Some(due.max(now) + self.period);
        true
    }
}

/// Ticks immediately, a fixed number of times.
#[derive(Clone, Debug)]
pub struct ManualTicker {
    remaining: u64,
}

impl ManualTicker {
    pub fn new(ticks: u64) -> Self {
        Self { remaining: ticks }
    }
}

impl TickSource for ManualTicker {
    fn wait(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Quit,
    TicksElapsed,
    SourceExhausted,
}

/// Drive the controller until quit, the ticker runs out, or (with
/// `exit_when_exhausted`) a file source reaches its end. Pending commands are
/// applied before each tick. The session is stopped on every exit path.
pub fn run_loop<T, F>(
    controller: &mut Controller,
    ticker: &mut T,
    commands: &Receiver<SessionCommand>,
    exit_when_exhausted: bool,
    mut on_outcome: F,
) -> LoopExit
where
    T: TickSource + ?Sized,
    F: FnMut(&Controller, &PipelineOutcome),
{
    let exit = loop {
        if !ticker.wait() {
            break LoopExit::TicksElapsed;
        }
        while let Ok(cmd) = commands.try_recv() {
            controller.apply(cmd);
            if controller.should_quit() {
                break;
            }
        }
        if controller.should_quit() {
            break LoopExit::Quit;
        }

        let outcome = controller.tick();
        on_outcome(controller, &outcome);

        if exit_when_exhausted
            && controller.session.is_exhausted()
            && !controller.session.is_camera()
        {
            break LoopExit::SourceExhausted;
        }
    };
    controller.session.stop();
    log::info!("control loop finished: {:?}", exit);
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ALL_CLASSES;

    #[test]
    fn parses_control_lines() {
        assert_eq!("camera".parse::<SessionCommand>(), Ok(SessionCommand::StartCamera));
        assert_eq!(
            "file  /tmp/my clip.mp4 ".parse::<SessionCommand>(),
            Ok(SessionCommand::SelectFile(PathBuf::from("/tmp/my clip.mp4")))
        );
        assert_eq!(
            "anchor 10,20".parse::<SessionCommand>(),
            Ok(SessionCommand::Anchor(Point::new(10, 20)))
        );
        assert_eq!(
            "class traffic light".parse::<SessionCommand>(),
            Ok(SessionCommand::SetClassFilter("traffic light".to_string()))
        );
        assert_eq!("QUIT".parse::<SessionCommand>(), Ok(SessionCommand::Quit));
        assert!("file".parse::<SessionCommand>().is_err());
        assert!("anchor 10".parse::<SessionCommand>().is_err());
        assert!("dance".parse::<SessionCommand>().is_err());
    }

    #[test]
    fn manual_ticker_counts_down() {
        let mut ticker = ManualTicker::new(2);
        assert!(ticker.wait());
        assert!(ticker.wait());
        assert!(!ticker.wait());
    }

    #[test]
    fn interval_ticker_respects_limit() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(1)).with_limit(2);
        assert!(ticker.wait());
        assert!(ticker.wait());
        assert!(!ticker.wait());
    }

    #[test]
    fn all_is_always_a_valid_filter() {
        assert_eq!(ClassFilter::parse(ALL_CLASSES), ClassFilter::All);
    }
}
