use std::collections::HashMap;
use std::time::Instant;

use crate::supervisor::takeover_supervisor::Phase;

/// Cross-cutting observer for supervisor events.
///
/// Decouples the state machine from output mechanisms so deployments and
/// tests can watch transitions and timings without touching control code.
pub trait SessionLogger: Send {
    /// Record a phase change.
    fn transition(&mut self, from: Phase, to: Phase);

    /// Record how long a named stage took (e.g. `detect`, `stop`).
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. nearest distance, leaked processes).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn transition(&mut self, _from: Phase, _to: Phase) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger: logs every transition and keeps per-stage timings,
/// metrics and transition counts for a summary at shutdown.
pub struct StdoutSessionLogger {
    transitions: HashMap<(Phase, Phase), usize>,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    messages: Vec<String>,
}

impl StdoutSessionLogger {
    pub fn new() -> Self {
        Self {
            transitions: HashMap::new(),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if nothing happened.
    pub fn summary_string(&self) -> Option<String> {
        if self.transitions.is_empty() && self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!("Session summary ({elapsed_s:.1}s):")];

        let mut transitions: Vec<_> = self.transitions.iter().collect();
        transitions.sort_by_key(|((from, to), _)| (from.to_string(), to.to_string()));
        for ((from, to), count) in transitions {
            lines.push(format!("  {from} -> {to}: {count}"));
        }

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            let max_ms = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  max {max_ms:7.1}ms  ({} calls)",
                durations.len()
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1} over {} samples", values.len()));
        }

        Some(lines.join("\n"))
    }

    pub fn transition_count(&self, from: Phase, to: Phase) -> usize {
        self.transitions.get(&(from, to)).copied().unwrap_or(0)
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLogger for StdoutSessionLogger {
    fn transition(&mut self, from: Phase, to: Phase) {
        *self.transitions.entry((from, to)).or_default() += 1;
        log::info!("Phase {from} -> {to}");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullSessionLogger;
        logger.transition(Phase::Idle, Phase::PendingAbsent);
        logger.timing("detect", 5.0);
        logger.metric("nearest_distance", 80.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_transitions_are_counted() {
        let mut logger = StdoutSessionLogger::new();
        logger.transition(Phase::Idle, Phase::PendingAbsent);
        logger.transition(Phase::PendingAbsent, Phase::Idle);
        logger.transition(Phase::Idle, Phase::PendingAbsent);

        assert_eq!(logger.transition_count(Phase::Idle, Phase::PendingAbsent), 2);
        assert_eq!(logger.transition_count(Phase::PendingAbsent, Phase::Idle), 1);
        assert_eq!(logger.transition_count(Phase::Active, Phase::Cooldown), 0);
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = StdoutSessionLogger::new();
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);

        let detect = logger.timings_for("detect").unwrap();
        assert_eq!(detect.len(), 2);
        assert_relative_eq!(detect[1], 30.0);
    }

    #[test]
    fn test_summary_includes_everything() {
        let mut logger = StdoutSessionLogger::new();
        logger.transition(Phase::PendingAbsent, Phase::Active);
        logger.timing("stop", 12.0);
        logger.metric("nearest_distance", 80.0);
        logger.metric("nearest_distance", 100.0);

        let summary = logger.summary_string().unwrap();

        assert!(summary.contains("Session summary"));
        assert!(summary.contains("PENDING_ABSENT -> ACTIVE: 1"));
        assert!(summary.contains("stop"));
        assert!(summary.contains("nearest_distance: avg 90.0"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        let logger = StdoutSessionLogger::new();
        assert!(logger.summary_string().is_none());
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = StdoutSessionLogger::new();
        logger.info("takeover started");
        assert_eq!(logger.messages, vec!["takeover started".to_string()]);
    }
}
