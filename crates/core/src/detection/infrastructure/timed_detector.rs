use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::detection::domain::person_detector::{DetectionError, PersonDetector};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

type Request = (u64, Frame, f64);
type Response = (u64, Result<Vec<Detection>, DetectionError>);

/// Decorator that bounds every detection call by a timeout.
///
/// The inner detector runs on a dedicated worker thread. When a call times
/// out the worker keeps going; until its late answer arrives (and is
/// discarded) further calls fail fast with [`DetectionError::Busy`] instead
/// of queueing frames behind a stalled model.
pub struct TimedDetector {
    requests: Sender<Request>,
    responses: Receiver<Response>,
    timeout: Duration,
    next_id: u64,
    in_flight: Option<u64>,
}

impl TimedDetector {
    pub fn new(inner: Box<dyn PersonDetector>, timeout: Duration) -> Self {
        let (requests, request_rx) = crossbeam_channel::bounded::<Request>(1);
        let (response_tx, responses) = crossbeam_channel::bounded::<Response>(1);

        spawn_worker(inner, request_rx, response_tx);

        Self {
            requests,
            responses,
            timeout,
            next_id: 0,
            in_flight: None,
        }
    }

    /// Discards answers to calls that already timed out.
    fn drain_late_responses(&mut self) {
        while let Ok((id, _)) = self.responses.try_recv() {
            if self.in_flight == Some(id) {
                log::debug!("Discarding late detection result #{id}");
                self.in_flight = None;
            }
        }
    }
}

fn spawn_worker(
    mut inner: Box<dyn PersonDetector>,
    request_rx: Receiver<Request>,
    response_tx: Sender<Response>,
) {
    thread::spawn(move || {
        for (id, frame, floor) in request_rx {
            let result = inner.detect(&frame, floor);
            if response_tx.send((id, result)).is_err() {
                break;
            }
        }
    });
}

impl PersonDetector for TimedDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        confidence_floor: f64,
    ) -> Result<Vec<Detection>, DetectionError> {
        self.drain_late_responses();
        if self.in_flight.is_some() {
            return Err(DetectionError::Busy);
        }

        let id = self.next_id;
        self.next_id += 1;
        match self.requests.try_send((id, frame.clone(), confidence_floor)) {
            Ok(()) => self.in_flight = Some(id),
            Err(TrySendError::Full(_)) => return Err(DetectionError::Busy),
            Err(TrySendError::Disconnected(_)) => {
                return Err(DetectionError::Backend("detector worker stopped".into()))
            }
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.responses.recv_timeout(remaining) {
                Ok((got, result)) if got == id => {
                    self.in_flight = None;
                    return result;
                }
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Err(DetectionError::Timeout(self.timeout)),
                Err(RecvTimeoutError::Disconnected) => {
                    self.in_flight = None;
                    return Err(DetectionError::Backend("detector worker stopped".into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::detection::BoundingBox;

    struct SleepyDetector {
        delay: Duration,
    }

    impl PersonDetector for SleepyDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
            _confidence_floor: f64,
        ) -> Result<Vec<Detection>, DetectionError> {
            thread::sleep(self.delay);
            Ok(vec![Detection::new(
                0.9,
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            )])
        }
    }

    struct FailingDetector;

    impl PersonDetector for FailingDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
            _confidence_floor: f64,
        ) -> Result<Vec<Detection>, DetectionError> {
            Err(DetectionError::Backend("model exploded".into()))
        }
    }

    fn frame() -> Frame {
        Frame::blank(4, 4, 0)
    }

    #[test]
    fn test_fast_detector_passes_through() {
        let inner = SleepyDetector {
            delay: Duration::ZERO,
        };
        let mut detector = TimedDetector::new(Box::new(inner), Duration::from_secs(2));

        for _ in 0..3 {
            assert_eq!(detector.detect(&frame(), 0.4).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_slow_detector_times_out_then_reports_busy() {
        let inner = SleepyDetector {
            delay: Duration::from_millis(300),
        };
        let mut detector = TimedDetector::new(Box::new(inner), Duration::from_millis(20));

        let first = detector.detect(&frame(), 0.4);
        let second = detector.detect(&frame(), 0.4);

        assert!(matches!(first, Err(DetectionError::Timeout(_))));
        assert!(matches!(second, Err(DetectionError::Busy)));
    }

    #[test]
    fn test_recovers_after_late_result_arrives() {
        let inner = SleepyDetector {
            delay: Duration::from_millis(100),
        };
        let mut detector = TimedDetector::new(Box::new(inner), Duration::from_millis(10));

        assert!(detector.detect(&frame(), 0.4).is_err());
        thread::sleep(Duration::from_millis(300));

        // The late answer is drained; this call waits on a fresh request.
        detector.timeout = Duration::from_secs(2);
        assert_eq!(detector.detect(&frame(), 0.4).unwrap().len(), 1);
    }

    #[test]
    fn test_inner_errors_are_forwarded() {
        let mut detector = TimedDetector::new(Box::new(FailingDetector), Duration::from_secs(1));

        let result = detector.detect(&frame(), 0.4);

        assert!(matches!(result, Err(DetectionError::Backend(msg)) if msg == "model exploded"));
    }
}
