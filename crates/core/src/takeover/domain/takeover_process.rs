use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TakeoverError {
    #[error("no media found in {dir}")]
    NoMedia { dir: PathBuf },
    #[error("failed to list media in {dir}: {source}")]
    MediaDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited immediately ({status})")]
    ExitedEarly { program: String, status: String },
    #[error("takeover failed: {0}")]
    Other(String),
}

/// Result of asking a takeover to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process had already exited before the request.
    AlreadyExited,
    /// Exited voluntarily within the grace period.
    Exited,
    /// Did not exit within the grace period and was force-killed.
    Killed,
    /// Could not be confirmed dead even after a force kill.
    Leaked,
}

/// A running takeover, owned by whoever started it.
///
/// `stop` consumes the handle, so a handle can only ever be stopped once.
pub trait TakeoverHandle: Send {
    /// Process id (or another stable identifier) for logging.
    fn id(&self) -> u32;

    fn is_alive(&mut self) -> bool;

    /// Asks the takeover to exit, forcing it after `grace`.
    ///
    /// Must not block much longer than `grace` and must tolerate an
    /// already-dead process.
    fn stop(self: Box<Self>, grace: Duration) -> StopOutcome;
}

/// Capability that launches the exclusive full-screen takeover.
///
/// Deployments pick one renderer (media player, browser kiosk window, ...);
/// the supervisor only sees this interface.
pub trait TakeoverProcess: Send {
    fn start(&mut self) -> Result<Box<dyn TakeoverHandle>, TakeoverError>;
}
