use crate::classes::ClassVocabulary;
use crate::error::DetectorError;
use crate::region::Point;

/// One raw detector output tuple, before vocabulary resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: usize,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, class_id: usize, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            class_id,
            confidence,
        }
    }
}

/// A detection with integer corners and a resolved label.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedBox {
    pub top_left: Point,
    pub bottom_right: Point,
    pub class_id: usize,
    pub label: String,
    /// Carried for reporting only; filtering ignores it.
    pub confidence: f32,
}

/// Resolve raw tuples into boxes.
///
/// Any inconsistent tuple fails the whole frame: a detector that produced one
/// garbage box cannot be trusted for the others.
pub fn resolve(
    raw: &[RawDetection],
    vocabulary: &ClassVocabulary,
) -> Result<Vec<DetectedBox>, DetectorError> {
    raw.iter()
        .enumerate()
        .map(|(idx, det)| resolve_one(idx, det, vocabulary))
        .collect()
}

fn resolve_one(
    idx: usize,
    det: &RawDetection,
    vocabulary: &ClassVocabulary,
) -> Result<DetectedBox, DetectorError> {
    let coords = [det.x1, det.y1, det.x2, det.y2];
    if coords.iter().any(|c| !c.is_finite() || c.abs() > i32::MAX as f32) {
        return Err(DetectorError::Malformed(format!(
            "box {} has non-finite or out of range coordinates {:?}",
            idx, coords
        )));
    }
    if det.x2 < det.x1 || det.y2 < det.y1 {
        return Err(DetectorError::Malformed(format!(
            "box {} is inverted: ({}, {}) - ({}, {})",
            idx, det.x1, det.y1, det.x2, det.y2
        )));
    }
    let label = vocabulary.name(det.class_id).ok_or_else(|| {
        DetectorError::Malformed(format!(
            "box {} has class id {} outside a vocabulary of {}",
            idx,
            det.class_id,
            vocabulary.len()
        ))
    })?;

    // Truncate toward zero, like the integer cast the coordinates go through
    // everywhere else.
    Ok(DetectedBox {
        top_left: Point::new(det.x1 as i32, det.y1 as i32),
        bottom_right: Point::new(det.x2 as i32, det.y2 as i32),
        class_id: det.class_id,
        label: label.to_string(),
        confidence: det.confidence,
    })
}
