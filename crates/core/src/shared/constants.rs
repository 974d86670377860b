use std::time::Duration;

/// Run the detector on every Nth captured frame.
pub const DEFAULT_DETECTION_STRIDE: usize = 5;
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.4;
/// Proximity threshold in the distance model's units (centimetres).
pub const DEFAULT_PROXIMITY_THRESHOLD: f64 = 110.0;

/// Power-law calibration `distance = a * area^b` for a 640x480 webcam.
pub const DEFAULT_DISTANCE_A: f64 = 9703.20;
pub const DEFAULT_DISTANCE_B: f64 = -0.4911842338691967;

pub const DEFAULT_ABSENCE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(3);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Consecutive capture faults tolerated before presence is reported absent.
pub const DEFAULT_CAPTURE_RETRY_BUDGET: u32 = 5;
pub const DEFAULT_CAPTURE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How long a freshly spawned takeover is watched for an immediate exit.
pub const DEFAULT_START_PROBE: Duration = Duration::from_millis(300);
/// Most of a stop grace kept back for reaping a child after a force kill.
pub const KILL_REAP_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_FLAG_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub const DEFAULT_TAKEOVER_PROGRAM: &str = "vlc";
pub const DEFAULT_TAKEOVER_ARGS: &[&str] = &[
    "--fullscreen",
    "--loop",
    "--no-video-title-show",
    "--video-on-top",
    "--no-video-deco",
];
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4"];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const CONFIG_DIR_NAME: &str = "KioskSentinel";
pub const CONFIG_FILE_NAME: &str = "config.json";
