//! Region of interest: the rectangle detections must fall inside.
//!
//! The region is defined by a drag gesture (anchor corner, then opposite
//! corner) while definition mode is active. Outside definition mode the region
//! is read-only; the pipeline only ever calls `contains` / `contains_box`.
//!
//! Corners are normalized to top-left / bottom-right when the gesture commits
//! and when a region is loaded, so the drag direction does not matter.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Point {
    type Err = String;

    /// Parses `"x,y"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .trim()
            .split_once(',')
            .ok_or_else(|| format!("expected \"x,y\", got {:?}", s.trim()))?;
        let x = x
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("bad x coordinate {:?}: {}", x.trim(), e))?;
        let y = y
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("bad y coordinate {:?}: {}", y.trim(), e))?;
        Ok(Point { x, y })
    }
}

/// Axis-aligned rectangle with `top_left <= bottom_right` on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl Rect {
    /// Build from any two opposite corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            top_left: Point::new(a.x.min(b.x), a.y.min(b.y)),
            bottom_right: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Open-interval containment: points on any edge are outside.
    pub fn contains(&self, p: Point) -> bool {
        self.top_left.x < p.x
            && p.x < self.bottom_right.x
            && self.top_left.y < p.y
            && p.y < self.bottom_right.y
    }

    pub fn width(&self) -> i32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> i32 {
        self.bottom_right.y - self.top_left.y
    }
}

/// Outcome of loading a region file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadedRegion {
    Loaded(RegionOfInterest),
    /// No file at the path. Not an error: callers reset to an empty region.
    NotFound,
}

impl LoadedRegion {
    pub fn into_region(self) -> RegionOfInterest {
        match self {
            LoadedRegion::Loaded(region) => region,
            LoadedRegion::NotFound => RegionOfInterest::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionOfInterest {
    rect: Option<Rect>,
    enabled: bool,
    defining: bool,
    anchor: Option<Point>,
}

impl RegionOfInterest {
    pub fn new() -> Self {
        Self::default()
    }

    /// An enabled region with the given rectangle.
    pub fn with_rect(rect: Rect) -> Self {
        Self {
            rect: Some(rect),
            enabled: true,
            ..Self::default()
        }
    }

    /// Enter definition mode. Any half-finished gesture is discarded.
    pub fn begin_definition(&mut self) {
        self.defining = true;
        self.anchor = None;
    }

    /// First corner of the drag. Ignored outside definition mode.
    pub fn set_anchor(&mut self, p: Point) -> bool {
        if !self.defining {
            return false;
        }
        self.anchor = Some(p);
        true
    }

    /// Opposite corner of the drag. Commits the rectangle, replacing any
    /// previous one, and enables filtering. Ignored without an anchor.
    pub fn set_opposite(&mut self, p: Point) -> bool {
        if !self.defining {
            return false;
        }
        let Some(anchor) = self.anchor.take() else {
            return false;
        };
        self.rect = Some(Rect::from_corners(anchor, p));
        self.enabled = true;
        true
    }

    /// Leave definition mode. Returns whether a rectangle is defined.
    pub fn end_definition(&mut self) -> bool {
        self.defining = false;
        self.anchor = None;
        self.rect.is_some()
    }

    pub fn is_defining(&self) -> bool {
        self.defining
    }

    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Flip the enabled flag and return the new value.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True when filtering actually applies.
    pub fn is_active(&self) -> bool {
        self.enabled && self.rect.is_some()
    }

    /// Point containment. With no active region every point is inside.
    pub fn contains(&self, p: Point) -> bool {
        match self.rect {
            Some(rect) if self.enabled => rect.contains(p),
            _ => true,
        }
    }

    /// Full containment: both corners must be strictly inside.
    pub fn contains_box(&self, top_left: Point, bottom_right: Point) -> bool {
        self.contains(top_left) && self.contains(bottom_right)
    }

    /// Write the two corners, one `x,y` pair per line.
    pub fn save(&self, path: &Path) -> Result<(), RegionError> {
        let rect = self.rect.ok_or(RegionError::Undefined)?;
        let body = format!("{}\n{}\n", rect.top_left, rect.bottom_right);
        std::fs::write(path, body).map_err(|source| RegionError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a region written by `save`. The loaded region is enabled.
    pub fn load(path: &Path) -> Result<LoadedRegion, RegionError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LoadedRegion::NotFound)
            }
            Err(source) => {
                return Err(RegionError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut corners = Vec::with_capacity(2);
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let point = line
                .parse::<Point>()
                .map_err(|reason| malformed(path, idx + 1, reason))?;
            if corners.len() == 2 {
                return Err(malformed(path, idx + 1, "more than two corners".to_string()));
            }
            corners.push(point);
        }
        let [a, b] = corners[..] else {
            return Err(malformed(
                path,
                raw.lines().count(),
                format!("expected two corners, found {}", corners.len()),
            ));
        };
        Ok(LoadedRegion::Loaded(Self::with_rect(Rect::from_corners(a, b))))
    }
}

fn malformed(path: &Path, line: usize, reason: String) -> RegionError {
    RegionError::Malformed {
        path: PathBuf::from(path),
        line,
        reason,
    }
}
