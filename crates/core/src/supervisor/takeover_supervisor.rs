use std::fmt;
use std::time::{Duration, Instant};

use crate::presence::presence_reading::PresenceReading;
use crate::supervisor::session_logger::SessionLogger;
use crate::takeover::domain::takeover_process::{StopOutcome, TakeoverHandle, TakeoverProcess};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No takeover; someone is present (or presence is unknown).
    Idle,
    /// Nobody near; waiting out the absence timeout.
    PendingAbsent,
    /// The takeover process owns the screen.
    Active,
    /// Manually dismissed; automatic takeover suppressed until the cooldown ends.
    Cooldown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "IDLE"),
            Phase::PendingAbsent => write!(f, "PENDING_ABSENT"),
            Phase::Active => write!(f, "ACTIVE"),
            Phase::Cooldown => write!(f, "COOLDOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub absence_timeout: Duration,
    pub cooldown: Duration,
    pub stop_grace: Duration,
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub starts: u64,
    pub start_faults: u64,
    pub stops: u64,
    pub kills: u64,
    pub leaks: u64,
    pub unexpected_exits: u64,
}

/// Point-in-time copy of the supervisor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: Phase,
    pub absence_since: Option<Instant>,
    pub cooldown_until: Option<Instant>,
    pub process_id: Option<u32>,
    pub stats: SupervisorStats,
}

/// Presence-gated owner of the single takeover process.
///
/// Every operation is one atomic transition and takes the monotonic time it
/// happens at. The supervisor is meant to be owned by exactly one control
/// thread: it is the only place a takeover is started or stopped, so "at most
/// one live takeover" follows from the state machine itself.
///
/// Invariants, checked after every transition in debug builds:
/// - a process handle is held iff the phase is [`Phase::Active`];
/// - `absence_since` is only set in [`Phase::PendingAbsent`] or [`Phase::Active`].
pub struct TakeoverSupervisor {
    config: SupervisorConfig,
    launcher: Box<dyn TakeoverProcess>,
    logger: Box<dyn SessionLogger>,
    phase: Phase,
    absence_since: Option<Instant>,
    cooldown_until: Option<Instant>,
    process: Option<Box<dyn TakeoverHandle>>,
    stats: SupervisorStats,
    consecutive_start_faults: u32,
    shut_down: bool,
}

impl TakeoverSupervisor {
    pub fn new(
        config: SupervisorConfig,
        launcher: Box<dyn TakeoverProcess>,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        Self {
            config,
            launcher,
            logger,
            phase: Phase::Idle,
            absence_since: None,
            cooldown_until: None,
            process: None,
            stats: SupervisorStats::default(),
            consecutive_start_faults: 0,
            shut_down: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn absence_since(&self) -> Option<Instant> {
        self.absence_since
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    pub fn has_process(&self) -> bool {
        self.process.is_some()
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            absence_since: self.absence_since,
            cooldown_until: self.cooldown_until,
            process_id: self.process.as_ref().map(|p| p.id()),
            stats: self.stats.clone(),
        }
    }

    /// Feeds one presence reading, timed at the reading's timestamp.
    pub fn on_presence(&mut self, reading: &PresenceReading) {
        if self.shut_down {
            return;
        }
        if let Some(ms) = reading.detect_ms {
            self.logger.timing("detect", ms);
        }
        if let Some(distance) = reading.nearest_distance {
            self.logger.metric("nearest_distance", distance);
        }

        let now = reading.timestamp;
        match (self.phase, reading.present) {
            (Phase::Idle, false) => {
                self.absence_since = Some(now);
                self.enter(Phase::PendingAbsent);
            }
            (Phase::PendingAbsent, true) => {
                self.absence_since = None;
                self.enter(Phase::Idle);
            }
            (Phase::Active, true) => {
                self.stop_process(self.config.stop_grace);
                self.absence_since = None;
                self.enter(Phase::Idle);
            }
            // Cooldown ignores presence; the rest are steady states.
            _ => {}
        }
        self.check_invariants();
    }

    /// Human dismissal: stop any takeover and suppress re-triggering.
    ///
    /// Repeated deliveries are no-ops and do not extend the cooldown.
    pub fn on_manual_stop(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }
        match self.phase {
            Phase::Active => {
                self.stop_process(self.config.stop_grace);
                self.begin_cooldown(now);
            }
            Phase::PendingAbsent => {
                self.logger.info("Pending takeover cancelled by manual stop");
                self.begin_cooldown(now);
            }
            Phase::Idle | Phase::Cooldown => {
                log::debug!("Manual stop ignored in {}", self.phase);
            }
        }
        self.check_invariants();
    }

    /// Operator request to launch the takeover now.
    ///
    /// Only acts while armed (absent, not cooling down); it never spawns a
    /// second process.
    pub fn on_restart_request(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }
        match self.phase {
            Phase::PendingAbsent if self.cooldown_elapsed(now) => self.try_start(),
            _ => log::debug!("Restart request ignored in {}", self.phase),
        }
        self.check_invariants();
    }

    /// Evaluates time-based transitions; call periodically.
    pub fn tick(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }
        match self.phase {
            Phase::PendingAbsent => {
                let absent_long_enough = self
                    .absence_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= self.config.absence_timeout);
                if absent_long_enough && self.cooldown_elapsed(now) {
                    self.try_start();
                }
            }
            Phase::Active => self.reap_if_exited(),
            Phase::Cooldown => {
                if self.cooldown_elapsed(now) {
                    self.enter(Phase::Idle);
                }
            }
            Phase::Idle => {}
        }
        self.check_invariants();
    }

    /// Final stop of any live takeover; afterwards every operation is a no-op.
    pub fn shutdown(&mut self, _now: Instant) {
        if self.shut_down {
            return;
        }
        if self.process.is_some() {
            self.stop_process(self.config.shutdown_grace);
        }
        self.absence_since = None;
        self.enter(Phase::Idle);
        self.shut_down = true;
        self.check_invariants();
        self.logger.summary();
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.cooldown_until.map_or(true, |until| now >= until)
    }

    fn begin_cooldown(&mut self, now: Instant) {
        self.absence_since = None;
        self.cooldown_until = Some(now + self.config.cooldown);
        self.enter(Phase::Cooldown);
    }

    fn try_start(&mut self) {
        let started = Instant::now();
        match self.launcher.start() {
            Ok(handle) => {
                self.logger
                    .timing("start", started.elapsed().as_secs_f64() * 1000.0);
                self.logger
                    .info(&format!("Takeover started (id {})", handle.id()));
                self.stats.starts += 1;
                self.consecutive_start_faults = 0;
                self.process = Some(handle);
                self.enter(Phase::Active);
            }
            Err(e) => {
                self.stats.start_faults += 1;
                self.consecutive_start_faults += 1;
                // Retried every tick; only the first failure in a row is loud.
                if self.consecutive_start_faults == 1 {
                    log::warn!("Takeover start failed: {e}");
                } else {
                    log::debug!(
                        "Takeover start failed ({} in a row): {e}",
                        self.consecutive_start_faults
                    );
                }
            }
        }
    }

    /// A takeover that exited on its own is reclaimed and re-armed; the next
    /// qualifying tick launches a fresh one.
    fn reap_if_exited(&mut self) {
        let exited = self.process.as_mut().is_some_and(|p| !p.is_alive());
        if !exited {
            return;
        }
        self.stats.unexpected_exits += 1;
        self.logger.info("Takeover exited on its own; re-arming");
        self.stop_process(self.config.stop_grace);
        self.enter(Phase::PendingAbsent);
    }

    fn stop_process(&mut self, grace: Duration) {
        let Some(handle) = self.process.take() else {
            return;
        };
        let id = handle.id();
        let started = Instant::now();
        let outcome = handle.stop(grace);
        self.logger
            .timing("stop", started.elapsed().as_secs_f64() * 1000.0);
        self.stats.stops += 1;

        match outcome {
            StopOutcome::AlreadyExited | StopOutcome::Exited => {
                log::info!("Takeover {id} stopped ({outcome:?})");
            }
            StopOutcome::Killed => {
                self.stats.kills += 1;
                log::warn!("Takeover {id} did not exit within {grace:?}; killed");
            }
            StopOutcome::Leaked => {
                self.stats.leaks += 1;
                self.logger.metric("leaked_processes", self.stats.leaks as f64);
                log::error!("Takeover {id} could not be reaped; continuing without it");
            }
        }
    }

    fn enter(&mut self, next: Phase) {
        if self.phase == next {
            return;
        }
        let from = self.phase;
        self.phase = next;
        log::debug!("Supervisor {from} -> {next}");
        self.logger.transition(from, next);
    }

    fn check_invariants(&self) {
        debug_assert_eq!(
            self.process.is_some(),
            self.phase == Phase::Active,
            "process handle must be held iff ACTIVE (phase {})",
            self.phase
        );
        debug_assert!(
            self.absence_since.is_none()
                || matches!(self.phase, Phase::PendingAbsent | Phase::Active),
            "absence_since set in {}",
            self.phase
        );
    }
}
