use std::time::Instant;

/// Where a reading's `present` value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingSource {
    /// The detector ran on this frame.
    Detected,
    /// Skipped or failed detection; the previous classification was reused.
    Held,
    /// The camera kept failing; reported as absence.
    CaptureFault,
}

/// Debounce-free presence classification of one sampled frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceReading {
    pub present: bool,
    pub timestamp: Instant,
    /// Distance of the box that decided the reading, when one was measured.
    pub nearest_distance: Option<f64>,
    pub source: ReadingSource,
    /// Wall time spent in the detector for this frame.
    pub detect_ms: Option<f64>,
}

impl PresenceReading {
    pub fn detected(present: bool, timestamp: Instant, nearest_distance: Option<f64>) -> Self {
        Self {
            present,
            timestamp,
            nearest_distance,
            source: ReadingSource::Detected,
            detect_ms: None,
        }
    }

    pub fn held(present: bool, timestamp: Instant) -> Self {
        Self {
            present,
            timestamp,
            nearest_distance: None,
            source: ReadingSource::Held,
            detect_ms: None,
        }
    }

    pub fn capture_fault(timestamp: Instant) -> Self {
        Self {
            present: false,
            timestamp,
            nearest_distance: None,
            source: ReadingSource::CaptureFault,
            detect_ms: None,
        }
    }

    pub fn with_detect_ms(mut self, detect_ms: f64) -> Self {
        self.detect_ms = Some(detect_ms);
        self
    }
}
