pub mod replay_detector;
pub mod timed_detector;
