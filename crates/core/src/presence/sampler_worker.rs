use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::domain::frame_source::FrameSource;
use crate::presence::presence_reading::PresenceReading;
use crate::presence::presence_sampler::PresenceSampler;
use crate::supervisor::control_loop::EventSender;

/// Decides when repeated capture faults turn into reported absence.
///
/// A kiosk with a dead camera should still fall back to its takeover
/// content, so after `retry_budget` consecutive faults every further fault
/// is reported as an absent reading. Any good frame resets the count.
#[derive(Debug, Clone)]
pub struct CapturePolicy {
    retry_budget: u32,
    retry_delay: Duration,
    consecutive_faults: u32,
}

impl CapturePolicy {
    pub fn new(retry_budget: u32, retry_delay: Duration) -> Self {
        Self {
            retry_budget,
            retry_delay,
            consecutive_faults: 0,
        }
    }

    pub fn on_success(&mut self) {
        if self.consecutive_faults > 0 {
            log::info!(
                "Camera recovered after {} failed captures",
                self.consecutive_faults
            );
        }
        self.consecutive_faults = 0;
    }

    /// Records a fault; returns true when it should be reported as absence.
    pub fn on_fault(&mut self) -> bool {
        self.consecutive_faults = self.consecutive_faults.saturating_add(1);
        self.consecutive_faults >= self.retry_budget
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn consecutive_faults(&self) -> u32 {
        self.consecutive_faults
    }
}

/// Spawns the capture → sample → event thread.
///
/// The thread ends at end of stream, on cancellation, or once the control
/// loop stops accepting events. It never decides anything itself; every
/// reading goes through the control loop's queue.
pub fn spawn_sampler(
    mut source: Box<dyn FrameSource>,
    mut sampler: PresenceSampler,
    mut policy: CapturePolicy,
    events: EventSender,
    cancelled: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !cancelled.load(Ordering::Relaxed) {
            let reading = match source.next_frame() {
                Ok(Some(frame)) => {
                    policy.on_success();
                    sampler.sample(&frame, Instant::now())
                }
                Ok(None) => {
                    log::info!("Frame source exhausted; sampler stopping");
                    break;
                }
                Err(e) => {
                    let report_absent = policy.on_fault();
                    log::warn!(
                        "Capture fault ({} in a row): {e}",
                        policy.consecutive_faults()
                    );
                    thread::sleep(policy.retry_delay());
                    if !report_absent {
                        continue;
                    }
                    PresenceReading::capture_fault(Instant::now())
                }
            };

            if events.presence(reading).is_err() {
                log::debug!("Control loop closed; sampler stopping");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::frame_source::CaptureError;
    use crate::detection::domain::person_detector::{DetectionError, PersonDetector};
    use crate::presence::presence_reading::ReadingSource;
    use crate::presence::presence_sampler::{ProximityPolicy, SamplerConfig};
    use crate::shared::detection::{BoundingBox, Detection};
    use crate::shared::frame::Frame;
    use crate::supervisor::control_loop::Event;
    use std::collections::VecDeque;

    struct ScriptedSource {
        script: VecDeque<Result<Option<Frame>, CaptureError>>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    struct NearPersonDetector;

    impl PersonDetector for NearPersonDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
            _confidence_floor: f64,
        ) -> Result<Vec<Detection>, DetectionError> {
            Ok(vec![Detection::new(
                0.9,
                BoundingBox::new(0.0, 0.0, 400.0, 400.0),
            )])
        }
    }

    fn sampler() -> PresenceSampler {
        let config = SamplerConfig {
            detection_stride: 1,
            confidence_floor: 0.4,
            proximity_threshold: 110.0,
            policy: ProximityPolicy::FirstMatch,
        };
        let distance = |area: f64| 10_000.0 / area.sqrt();
        PresenceSampler::new(Box::new(NearPersonDetector), Box::new(distance), config).unwrap()
    }

    fn fault() -> Result<Option<Frame>, CaptureError> {
        Err(CaptureError::Unavailable("unplugged".into()))
    }

    fn run_to_completion(script: Vec<Result<Option<Frame>, CaptureError>>, budget: u32) -> Vec<Event> {
        let (sender, rx) = EventSender::channel();
        let source = ScriptedSource {
            script: script.into(),
        };
        let handle = spawn_sampler(
            Box::new(source),
            sampler(),
            CapturePolicy::new(budget, Duration::from_millis(1)),
            sender,
            Arc::new(AtomicBool::new(false)),
        );
        handle.join().unwrap();
        rx.try_iter().collect()
    }

    fn presence_sources(events: &[Event]) -> Vec<(bool, ReadingSource)> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Presence(r) => Some((r.present, r.source)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_policy_reports_absence_after_budget() {
        let mut policy = CapturePolicy::new(3, Duration::ZERO);
        assert!(!policy.on_fault());
        assert!(!policy.on_fault());
        assert!(policy.on_fault());
        assert!(policy.on_fault());
    }

    #[test]
    fn test_policy_success_resets_count() {
        let mut policy = CapturePolicy::new(2, Duration::ZERO);
        policy.on_fault();
        policy.on_success();
        assert_eq!(policy.consecutive_faults(), 0);
        assert!(!policy.on_fault());
    }

    #[test]
    fn test_frames_become_presence_events() {
        let script = vec![Ok(Some(Frame::blank(4, 4, 0))), Ok(Some(Frame::blank(4, 4, 1)))];

        let events = run_to_completion(script, 3);

        assert_eq!(
            presence_sources(&events),
            vec![(true, ReadingSource::Detected), (true, ReadingSource::Detected)]
        );
    }

    #[test]
    fn test_sustained_capture_faults_report_absence() {
        let script = vec![fault(), fault(), fault(), fault()];

        let events = run_to_completion(script, 3);

        // First two faults are retried silently; the third and fourth report absence.
        assert_eq!(
            presence_sources(&events),
            vec![
                (false, ReadingSource::CaptureFault),
                (false, ReadingSource::CaptureFault)
            ]
        );
    }

    #[test]
    fn test_brief_capture_fault_is_absorbed() {
        let script = vec![
            Ok(Some(Frame::blank(4, 4, 0))),
            fault(),
            Ok(Some(Frame::blank(4, 4, 1))),
        ];

        let events = run_to_completion(script, 3);

        assert!(presence_sources(&events).iter().all(|(present, _)| *present));
    }

    #[test]
    fn test_stops_when_control_loop_closes() {
        let (sender, rx) = EventSender::channel();
        sender.close();
        drop(rx);
        let source = ScriptedSource {
            script: vec![Ok(Some(Frame::blank(4, 4, 0)))].into(),
        };

        let handle = spawn_sampler(
            Box::new(source),
            sampler(),
            CapturePolicy::new(3, Duration::ZERO),
            sender,
            Arc::new(AtomicBool::new(false)),
        );

        assert!(handle.join().is_ok());
    }
}
