use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::supervisor::control_loop::EventSender;
use crate::takeover::domain::override_event::OverrideEvent;

/// Override channel driven by flag files.
///
/// Any process that can create a file (an HTTP handler, a cron job, a
/// shell) can dismiss or relaunch the takeover. A flag is consumed
/// (deleted) when seen.
#[derive(Debug, Clone, Default)]
pub struct FileFlagOverride {
    stop_flag: Option<PathBuf>,
    restart_flag: Option<PathBuf>,
}

impl FileFlagOverride {
    pub fn new(stop_flag: Option<PathBuf>, restart_flag: Option<PathBuf>) -> Self {
        Self {
            stop_flag,
            restart_flag,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.stop_flag.is_some() || self.restart_flag.is_some()
    }

    /// Returns the commands whose flags are currently raised, stop first.
    pub fn poll(&self) -> Vec<OverrideEvent> {
        let flags = [
            (&self.stop_flag, OverrideEvent::StopNow),
            (&self.restart_flag, OverrideEvent::RestartNow),
        ];

        flags
            .into_iter()
            .filter_map(|(path, event)| {
                let path = path.as_ref()?;
                if !path.exists() {
                    return None;
                }
                // A flag we cannot delete would fire on every poll.
                if let Err(e) = fs::remove_file(path) {
                    log::warn!("Could not consume flag {}: {e}", path.display());
                    return None;
                }
                log::info!("Override flag {} raised: {event:?}", path.display());
                Some(event)
            })
            .collect()
    }
}

/// Polls the flags every `interval` and forwards raised commands to the
/// control loop until cancelled or the loop shuts down.
pub fn spawn_flag_watcher(
    flags: FileFlagOverride,
    events: EventSender,
    interval: Duration,
    cancelled: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !cancelled.load(Ordering::Relaxed) {
            for event in flags.poll() {
                if events.override_event(event).is_err() {
                    return;
                }
            }
            thread::sleep(interval);
        }
    })
}
