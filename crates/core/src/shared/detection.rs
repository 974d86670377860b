use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, corners `(x1, y1)` and `(x2, y2)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Pixel area; inverted or degenerate boxes have area zero.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

/// One detector hit: a confidence score and its bounding box.
///
/// Detections are transient and only live for the sample that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(confidence: f64, bbox: BoundingBox) -> Self {
        Self { confidence, bbox }
    }

    /// Keeps only detections at or above the confidence floor.
    pub fn above_floor(detections: &[Detection], confidence_floor: f64) -> Vec<Detection> {
        detections
            .iter()
            .filter(|d| d.confidence >= confidence_floor)
            .copied()
            .collect()
    }
}
