use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::detection::domain::person_detector::{DetectionError, PersonDetector};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Replays pre-computed detections by frame index.
///
/// Lets the controller run end-to-end against a recorded session (frames
/// plus a JSON detections file) without a neural network in the loop.
/// Frames missing from the recording have no detections.
pub struct ReplayDetector {
    recording: HashMap<usize, Vec<Detection>>,
}

impl ReplayDetector {
    pub fn new(recording: HashMap<usize, Vec<Detection>>) -> Self {
        Self { recording }
    }

    /// Loads a JSON object mapping frame index to a list of detections:
    /// `{"0": [{"confidence": 0.9, "bbox": {"x1": 0, "y1": 0, "x2": 10, "y2": 10}}]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, DetectionError> {
        let json = fs::read_to_string(path).map_err(|source| DetectionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let recording = serde_json::from_str(&json).map_err(|source| DetectionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(recording))
    }

    pub fn len(&self) -> usize {
        self.recording.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recording.is_empty()
    }
}

impl PersonDetector for ReplayDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        confidence_floor: f64,
    ) -> Result<Vec<Detection>, DetectionError> {
        Ok(self
            .recording
            .get(&frame.index())
            .map(|d| Detection::above_floor(d, confidence_floor))
            .unwrap_or_default())
    }
}
