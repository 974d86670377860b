use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::domain::distance_model::PowerLawDistance;
use crate::presence::presence_sampler::{ProximityPolicy, SamplerConfig};
use crate::presence::sampler_worker::CapturePolicy;
use crate::shared::constants::*;
use crate::supervisor::takeover_supervisor::SupervisorConfig;
use crate::takeover::infrastructure::command_takeover::CommandTakeover;
use crate::takeover::infrastructure::file_flag_override::FileFlagOverride;
use crate::takeover::infrastructure::media_playlist::MediaPlaylist;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Full controller configuration. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub detection_stride: usize,
    pub confidence_floor: f64,
    pub proximity_threshold: f64,
    pub proximity_policy: ProximityPolicy,
    pub distance: PowerLawDistance,
    pub absence_timeout_ms: u64,
    pub cooldown_ms: u64,
    pub stop_grace_ms: u64,
    pub shutdown_grace_ms: u64,
    pub tick_interval_ms: u64,
    pub detect_timeout_ms: u64,
    pub capture_retry_budget: u32,
    pub capture_retry_delay_ms: u64,
    pub takeover: TakeoverConfig,
    pub overrides: OverrideConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TakeoverConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Directory whose media files are appended to `args` on each launch.
    pub media_dir: Option<PathBuf>,
    pub media_extensions: Vec<String>,
    pub start_probe_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideConfig {
    pub stop_flag: Option<PathBuf>,
    pub restart_flag: Option<PathBuf>,
    pub poll_interval_ms: u64,
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl Default for KioskConfig {
    fn default() -> Self {
        let distance = PowerLawDistance::default();
        Self {
            detection_stride: DEFAULT_DETECTION_STRIDE,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            proximity_policy: ProximityPolicy::default(),
            distance,
            absence_timeout_ms: millis(DEFAULT_ABSENCE_TIMEOUT),
            cooldown_ms: millis(DEFAULT_COOLDOWN),
            stop_grace_ms: millis(DEFAULT_STOP_GRACE),
            shutdown_grace_ms: millis(DEFAULT_SHUTDOWN_GRACE),
            tick_interval_ms: millis(DEFAULT_TICK_INTERVAL),
            detect_timeout_ms: millis(DEFAULT_DETECT_TIMEOUT),
            capture_retry_budget: DEFAULT_CAPTURE_RETRY_BUDGET,
            capture_retry_delay_ms: millis(DEFAULT_CAPTURE_RETRY_DELAY),
            takeover: TakeoverConfig::default(),
            overrides: OverrideConfig::default(),
        }
    }
}

impl Default for TakeoverConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_TAKEOVER_PROGRAM.to_string(),
            args: DEFAULT_TAKEOVER_ARGS.iter().map(|s| s.to_string()).collect(),
            media_dir: None,
            media_extensions: MEDIA_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            start_probe_ms: millis(DEFAULT_START_PROBE),
        }
    }
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            stop_flag: None,
            restart_flag: None,
            poll_interval_ms: millis(DEFAULT_FLAG_POLL_INTERVAL),
        }
    }
}

impl KioskConfig {
    /// `<config dir>/KioskSentinel/config.json`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads an explicit file, or the default location when `path` is `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json_pretty(&self) -> String {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Rejects values the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field,
                reason: reason.into(),
            })
        }

        if self.detection_stride < 1 {
            return invalid("detection_stride", "must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return invalid(
                "confidence_floor",
                format!("{} is outside [0, 1]", self.confidence_floor),
            );
        }
        if !self.proximity_threshold.is_finite() || self.proximity_threshold <= 0.0 {
            return invalid(
                "proximity_threshold",
                format!("{} must be a positive distance", self.proximity_threshold),
            );
        }
        if !self.distance.is_monotonic_decreasing() {
            return invalid(
                "distance",
                format!(
                    "a={} b={} is not monotonically decreasing (need a > 0, b < 0)",
                    self.distance.a, self.distance.b
                ),
            );
        }

        let durations = [
            ("absence_timeout_ms", self.absence_timeout_ms),
            ("cooldown_ms", self.cooldown_ms),
            ("stop_grace_ms", self.stop_grace_ms),
            ("shutdown_grace_ms", self.shutdown_grace_ms),
            ("tick_interval_ms", self.tick_interval_ms),
            ("detect_timeout_ms", self.detect_timeout_ms),
            ("overrides.poll_interval_ms", self.overrides.poll_interval_ms),
        ];
        if let Some((field, _)) = durations.into_iter().find(|(_, ms)| *ms == 0) {
            return invalid(field, "must be greater than zero");
        }

        if self.capture_retry_budget < 1 {
            return invalid("capture_retry_budget", "must be at least 1");
        }
        if self.takeover.program.trim().is_empty() {
            return invalid("takeover.program", "must not be empty");
        }
        if self.takeover.media_dir.is_some() && self.takeover.media_extensions.is_empty() {
            return invalid(
                "takeover.media_extensions",
                "must list at least one extension when media_dir is set",
            );
        }
        Ok(())
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            detection_stride: self.detection_stride,
            confidence_floor: self.confidence_floor,
            proximity_threshold: self.proximity_threshold,
            policy: self.proximity_policy,
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            absence_timeout: Duration::from_millis(self.absence_timeout_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
            stop_grace: Duration::from_millis(self.stop_grace_ms),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
        }
    }

    pub fn capture_policy(&self) -> CapturePolicy {
        CapturePolicy::new(
            self.capture_retry_budget,
            Duration::from_millis(self.capture_retry_delay_ms),
        )
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }

    pub fn flag_poll_interval(&self) -> Duration {
        Duration::from_millis(self.overrides.poll_interval_ms)
    }

    pub fn command_takeover(&self) -> CommandTakeover {
        let takeover = &self.takeover;
        let mut command = CommandTakeover::new(takeover.program.clone(), takeover.args.clone())
            .with_start_probe(Duration::from_millis(takeover.start_probe_ms));
        if let Some(dir) = &takeover.media_dir {
            command = command.with_playlist(MediaPlaylist::new(dir, &takeover.media_extensions));
        }
        command
    }

    pub fn flag_override(&self) -> FileFlagOverride {
        FileFlagOverride::new(
            self.overrides.stop_flag.clone(),
            self.overrides.restart_flag.clone(),
        )
    }
}
