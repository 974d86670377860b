use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("detection timed out after {0:?}")]
    Timeout(Duration),
    #[error("detector is still busy with an earlier frame")]
    Busy,
    #[error("detector failed: {0}")]
    Backend(String),
    #[error("failed to read detections from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid detections file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Domain interface for person/face detection.
///
/// Implementations may keep state between calls (model sessions, replay
/// cursors), hence `&mut self`. Returned detections need not be filtered;
/// callers still apply their own confidence floor.
pub trait PersonDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        confidence_floor: f64,
    ) -> Result<Vec<Detection>, DetectionError>;
}
