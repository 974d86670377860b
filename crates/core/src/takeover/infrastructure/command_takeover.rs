use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::shared::constants::KILL_REAP_TIMEOUT;
use crate::takeover::domain::takeover_process::{
    StopOutcome, TakeoverError, TakeoverHandle, TakeoverProcess,
};
use crate::takeover::infrastructure::media_playlist::MediaPlaylist;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Launches an external program (media player, browser in kiosk mode, ...)
/// as the takeover.
///
/// When a playlist is set, its files are appended to the arguments on each
/// launch. A child that dies within `start_probe` counts as a failed start.
pub struct CommandTakeover {
    program: String,
    args: Vec<String>,
    playlist: Option<MediaPlaylist>,
    start_probe: Duration,
}

impl CommandTakeover {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            playlist: None,
            start_probe: Duration::ZERO,
        }
    }

    pub fn with_playlist(mut self, playlist: MediaPlaylist) -> Self {
        self.playlist = Some(playlist);
        self
    }

    pub fn with_start_probe(mut self, probe: Duration) -> Self {
        self.start_probe = probe;
        self
    }

    fn build_command(&self) -> Result<Command, TakeoverError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(playlist) = &self.playlist {
            cmd.args(playlist.list()?);
        }
        Ok(cmd)
    }
}

impl TakeoverProcess for CommandTakeover {
    fn start(&mut self) -> Result<Box<dyn TakeoverHandle>, TakeoverError> {
        let mut child = self
            .build_command()?
            .spawn()
            .map_err(|source| TakeoverError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !self.start_probe.is_zero() {
            if let Some(status) = wait_for_exit(&mut child, Instant::now() + self.start_probe) {
                return Err(TakeoverError::ExitedEarly {
                    program: self.program.clone(),
                    status,
                });
            }
        }

        log::info!("Launched {} (pid {})", self.program, child.id());
        Ok(Box::new(ChildHandle { child }))
    }
}

/// Polls until the child exits or the deadline passes; returns the exit
/// status text if it exited.
fn wait_for_exit(child: &mut Child, deadline: Instant) -> Option<String> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status.to_string()),
            Ok(None) => {}
            Err(e) => {
                log::warn!("Failed to poll pid {}: {e}", child.id());
                return None;
            }
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Splits a stop grace into the time a child gets to exit on its own and
/// the reserve kept for reaping it after a force kill.
fn split_grace(grace: Duration) -> (Duration, Duration) {
    let reap = KILL_REAP_TIMEOUT.min(grace / 2);
    (grace - reap, reap)
}

/// Asks the child to exit on its own (SIGTERM on unix).
#[cfg(unix)]
fn request_terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Err(e) = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
        log::warn!("Failed to send SIGTERM to pid {}: {e}", child.id());
    }
}

/// No graceful signal is available; terminate outright.
#[cfg(not(unix))]
fn request_terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::warn!("Failed to terminate pid {}: {e}", child.id());
    }
}

struct ChildHandle {
    child: Child,
}

impl TakeoverHandle for ChildHandle {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// The whole call, force kill and reap included, fits inside `grace`.
    fn stop(mut self: Box<Self>, grace: Duration) -> StopOutcome {
        if !self.is_alive() {
            return StopOutcome::AlreadyExited;
        }

        let started = Instant::now();
        let (exit_budget, _) = split_grace(grace);
        request_terminate(&mut self.child);
        if wait_for_exit(&mut self.child, started + exit_budget).is_some() {
            return StopOutcome::Exited;
        }

        log::warn!(
            "pid {} ignored terminate for {exit_budget:?}; killing",
            self.child.id()
        );
        if let Err(e) = self.child.kill() {
            log::warn!("Failed to kill pid {}: {e}", self.child.id());
        }
        if wait_for_exit(&mut self.child, started + grace).is_some() {
            StopOutcome::Killed
        } else {
            StopOutcome::Leaked
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    fn sh(script: &str) -> CommandTakeover {
        CommandTakeover::new("sh", vec!["-c".into(), script.into()])
    }

    #[test]
    fn test_start_and_graceful_stop() {
        let mut takeover = sh("sleep 30");

        let mut handle = takeover.start().unwrap();
        assert!(handle.is_alive());

        let outcome = handle.stop(Duration::from_secs(3));

        assert_eq!(outcome, StopOutcome::Exited);
    }

    #[test]
    fn test_ignored_terminate_escalates_to_kill() {
        let mut takeover = sh("trap '' TERM; sleep 30");
        let handle = takeover.start().unwrap();
        // Give the shell time to install the trap.
        thread::sleep(Duration::from_millis(100));

        let outcome = handle.stop(Duration::from_millis(200));

        assert_eq!(outcome, StopOutcome::Killed);
    }

    #[test]
    fn test_forced_stop_stays_within_grace() {
        let mut takeover = sh("trap '' TERM; sleep 30");
        let handle = takeover.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        let grace = Duration::from_millis(600);

        let started = Instant::now();
        let outcome = handle.stop(grace);

        assert_eq!(outcome, StopOutcome::Killed);
        // One poll interval of slack past the deadline.
        assert!(started.elapsed() < grace + POLL_INTERVAL * 2);
    }

    #[test]
    fn test_split_grace_reserves_reap_time() {
        assert_eq!(
            split_grace(Duration::from_secs(3)),
            (Duration::from_millis(2_500), KILL_REAP_TIMEOUT)
        );
        assert_eq!(
            split_grace(Duration::from_millis(200)),
            (Duration::from_millis(100), Duration::from_millis(100))
        );
        assert_eq!(split_grace(Duration::ZERO), (Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn test_stop_on_dead_handle_is_harmless() {
        let mut takeover = sh("exit 0");
        let handle = takeover.start().unwrap();
        thread::sleep(Duration::from_millis(200));

        assert_eq!(handle.stop(Duration::from_secs(1)), StopOutcome::AlreadyExited);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let mut takeover = CommandTakeover::new("/nonexistent/player", vec![]);

        let result = takeover.start();

        assert!(matches!(result, Err(TakeoverError::Spawn { .. })));
    }

    #[test]
    fn test_immediate_exit_fails_probe() {
        let mut takeover = sh("exit 3").with_start_probe(Duration::from_millis(500));

        let result = takeover.start();

        assert!(matches!(result, Err(TakeoverError::ExitedEarly { .. })));
    }

    #[test]
    fn test_long_running_child_passes_probe() {
        let mut takeover = sh("sleep 30").with_start_probe(Duration::from_millis(100));

        let handle = takeover.start().unwrap();

        assert_ne!(handle.stop(Duration::from_secs(3)), StopOutcome::AlreadyExited);
    }

    #[test]
    fn test_playlist_files_are_passed_as_arguments() {
        let media = tempfile::tempdir().unwrap();
        fs::write(media.path().join("a.mp4"), b"").unwrap();
        fs::write(media.path().join("b.mp4"), b"").unwrap();
        let out = tempfile::tempdir().unwrap();
        let marker = out.path().join("args.txt");

        // $0 is "sh"; the playlist arrives as $1 and $2.
        let script = format!("echo \"$1 $2\" > {}", marker.display());
        let mut takeover = CommandTakeover::new("sh", vec!["-c".into(), script, "sh".into()])
            .with_playlist(MediaPlaylist::new(media.path(), &["mp4".to_string()]));

        let handle = takeover.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(3);
        while !marker.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        thread::sleep(Duration::from_millis(50));
        handle.stop(Duration::from_secs(1));

        let written = fs::read_to_string(&marker).unwrap();
        assert!(written.contains("a.mp4"));
        assert!(written.contains("b.mp4"));
    }

    #[test]
    fn test_empty_playlist_fails_start() {
        let media = tempfile::tempdir().unwrap();
        let mut takeover =
            sh("sleep 30").with_playlist(MediaPlaylist::new(media.path(), &["mp4".to_string()]));

        assert!(matches!(takeover.start(), Err(TakeoverError::NoMedia { .. })));
    }
}
