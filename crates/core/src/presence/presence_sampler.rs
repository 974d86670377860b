use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::detection::domain::distance_model::DistanceModel;
use crate::detection::domain::person_detector::PersonDetector;
use crate::presence::presence_reading::PresenceReading;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// How detected boxes are reduced to a single presence decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityPolicy {
    /// Present as soon as one box is within range; later boxes are not measured.
    #[default]
    FirstMatch,
    /// Measure every box and decide on the nearest one.
    Closest,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    pub detection_stride: usize,
    pub confidence_floor: f64,
    pub proximity_threshold: f64,
    pub policy: ProximityPolicy,
}

/// Rate-limited presence classifier.
///
/// Runs the detector on every `detection_stride`-th frame and holds the last
/// classification in between. A failed detection is treated like a skipped
/// one. Debouncing is left to the supervisor.
pub struct PresenceSampler {
    detector: Box<dyn PersonDetector>,
    distance: Box<dyn DistanceModel>,
    config: SamplerConfig,
    frame_count: u64,
    last_present: bool,
}

impl PresenceSampler {
    /// The sampler starts out assuming someone is present, so a detector
    /// that fails from the first frame never triggers a takeover by itself.
    pub fn new(
        detector: Box<dyn PersonDetector>,
        distance: Box<dyn DistanceModel>,
        config: SamplerConfig,
    ) -> Result<Self, &'static str> {
        if config.detection_stride < 1 {
            return Err("detection_stride must be >= 1");
        }
        Ok(Self {
            detector,
            distance,
            config,
            frame_count: 0,
            last_present: true,
        })
    }

    pub fn sample(&mut self, frame: &Frame, now: Instant) -> PresenceReading {
        let due = self.frame_count % self.config.detection_stride as u64 == 0;
        self.frame_count += 1;

        if !due {
            return PresenceReading::held(self.last_present, now);
        }

        let started = Instant::now();
        let result = self.detector.detect(frame, self.config.confidence_floor);
        let detect_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(detections) => {
                let (present, nearest) = self.classify(&detections);
                self.last_present = present;
                PresenceReading::detected(present, now, nearest).with_detect_ms(detect_ms)
            }
            Err(e) => {
                log::warn!("Detection failed on frame {}: {e}", frame.index());
                PresenceReading::held(self.last_present, now).with_detect_ms(detect_ms)
            }
        }
    }

    /// Returns the presence decision and the distance that decided it.
    fn classify(&self, detections: &[Detection]) -> (bool, Option<f64>) {
        let threshold = self.config.proximity_threshold;
        let mut distances = detections
            .iter()
            .filter(|d| d.confidence >= self.config.confidence_floor)
            .map(|d| self.distance.distance(d.bbox.area()));

        match self.config.policy {
            ProximityPolicy::FirstMatch => match distances.find(|&d| d < threshold) {
                Some(d) => (true, Some(d)),
                None => (false, None),
            },
            ProximityPolicy::Closest => {
                let nearest = distances.fold(None, |acc: Option<f64>, d| {
                    Some(acc.map_or(d, |best| best.min(d)))
                });
                (nearest.is_some_and(|d| d < threshold), nearest)
            }
        }
    }
}
