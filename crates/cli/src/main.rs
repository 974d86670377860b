use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::Sender;

use kiosk_sentinel_core::capture::infrastructure::image_dir_source::ImageDirFrameSource;
use kiosk_sentinel_core::detection::domain::person_detector::PersonDetector;
use kiosk_sentinel_core::detection::infrastructure::replay_detector::ReplayDetector;
use kiosk_sentinel_core::detection::infrastructure::timed_detector::TimedDetector;
use kiosk_sentinel_core::presence::presence_sampler::{PresenceSampler, ProximityPolicy};
use kiosk_sentinel_core::presence::sampler_worker::spawn_sampler;
use kiosk_sentinel_core::shared::kiosk_config::KioskConfig;
use kiosk_sentinel_core::supervisor::control_loop::{ControlLoop, EventSender};
use kiosk_sentinel_core::supervisor::session_logger::StdoutSessionLogger;
use kiosk_sentinel_core::supervisor::takeover_supervisor::TakeoverSupervisor;
use kiosk_sentinel_core::takeover::domain::override_event::OverrideEvent;
use kiosk_sentinel_core::takeover::infrastructure::file_flag_override::spawn_flag_watcher;

/// Presence-gated kiosk controller: launches a fullscreen takeover when
/// nobody is near the screen and dismisses it when someone approaches.
#[derive(Parser, Debug)]
#[command(name = "kiosk-sentinel")]
struct Cli {
    /// JSON config file (default: platform config dir, KioskSentinel/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of still frames replayed as the camera feed.
    #[arg(long)]
    frames: Option<PathBuf>,

    /// JSON file of recorded detections keyed by frame index.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Restart the frame directory from the beginning when it runs out.
    #[arg(long)]
    loop_frames: bool,

    /// Frame rate the replayed feed is paced at.
    #[arg(long, default_value = "10")]
    fps: f64,

    /// Run detection every Nth frame.
    #[arg(long)]
    stride: Option<usize>,

    /// Minimum detection confidence (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Proximity threshold in centimetres.
    #[arg(long)]
    threshold: Option<f64>,

    /// Proximity policy: first_match or closest.
    #[arg(long)]
    policy: Option<String>,

    /// Seconds of absence before the takeover starts.
    #[arg(long)]
    absence_timeout: Option<f64>,

    /// Seconds automatic takeover stays suppressed after a manual stop.
    #[arg(long)]
    cooldown: Option<f64>,

    /// Takeover program (default: vlc).
    #[arg(long)]
    program: Option<String>,

    /// Directory of media files passed to the takeover program.
    #[arg(long)]
    media_dir: Option<PathBuf>,

    /// Flag file that dismisses the takeover when created.
    #[arg(long)]
    stop_flag: Option<PathBuf>,

    /// Flag file that relaunches the takeover when created.
    #[arg(long)]
    restart_flag: Option<PathBuf>,

    /// Do not read s/r/q commands from stdin.
    #[arg(long)]
    no_hotkeys: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

/// Why the main thread stopped waiting.
#[derive(Debug)]
enum Done {
    Quit,
    Signal,
    FeedEnded,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = KioskConfig::load(cli.config.as_deref())?;
    apply_overrides(&cli, &mut config)?;
    config.validate()?;

    if cli.print_config {
        println!("{}", config.to_json_pretty());
        return Ok(());
    }

    let (frames, detections) = match (&cli.frames, &cli.detections) {
        (Some(frames), Some(detections)) => (frames, detections),
        _ => return Err("--frames and --detections are required".into()),
    };
    let interval = frame_interval(cli.fps)?;

    let replay = ReplayDetector::from_json_file(detections)?;
    if replay.is_empty() {
        log::warn!(
            "{} holds no detections; nobody will read as present",
            detections.display()
        );
    } else {
        log::info!("Loaded recorded detections for {} frames", replay.len());
    }
    let detector: Box<dyn PersonDetector> =
        Box::new(TimedDetector::new(Box::new(replay), config.detect_timeout()));
    let sampler = PresenceSampler::new(
        detector,
        Box::new(config.distance),
        config.sampler_config(),
    )?;
    let source = ImageDirFrameSource::open(frames)?
        .with_looping(cli.loop_frames)
        .with_frame_interval(interval);

    let (done_tx, done_rx) = crossbeam_channel::unbounded::<Done>();
    install_termination_handler(done_tx.clone())?;

    let supervisor = TakeoverSupervisor::new(
        config.supervisor_config(),
        Box::new(config.command_takeover()),
        Box::new(StdoutSessionLogger::new()),
    );
    let control = ControlLoop::spawn(supervisor, config.tick_interval());
    let cancelled = Arc::new(AtomicBool::new(false));

    let sampler_handle = spawn_sampler(
        Box::new(source),
        sampler,
        config.capture_policy(),
        control.sender(),
        cancelled.clone(),
    );
    watch_feed(sampler_handle, done_tx.clone());

    let flags = config.flag_override();
    let flag_handle = flags.is_configured().then(|| {
        spawn_flag_watcher(
            flags,
            control.sender(),
            config.flag_poll_interval(),
            cancelled.clone(),
        )
    });

    if !cli.no_hotkeys {
        eprintln!("Commands: s = stop takeover, r = restart takeover, q = quit");
        spawn_hotkeys(control.sender(), done_tx);
    }

    let reason = done_rx.recv().unwrap_or(Done::Quit);
    log::info!("Shutting down ({reason:?})");
    cancelled.store(true, Ordering::Relaxed);

    let snapshot = control.shutdown()?;
    if let Some(handle) = flag_handle {
        let _ = handle.join();
    }

    eprintln!(
        "Done: {} takeover starts, {} start faults, {} stops, {} leaked",
        snapshot.stats.starts, snapshot.stats.start_faults, snapshot.stats.stops, snapshot.stats.leaks
    );
    Ok(())
}

fn apply_overrides(cli: &Cli, config: &mut KioskConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(stride) = cli.stride {
        config.detection_stride = stride;
    }
    if let Some(confidence) = cli.confidence {
        config.confidence_floor = confidence;
    }
    if let Some(threshold) = cli.threshold {
        config.proximity_threshold = threshold;
    }
    if let Some(policy) = &cli.policy {
        config.proximity_policy = parse_policy(policy)?;
    }
    if let Some(secs) = cli.absence_timeout {
        config.absence_timeout_ms = secs_to_ms(secs, "absence timeout")?;
    }
    if let Some(secs) = cli.cooldown {
        config.cooldown_ms = secs_to_ms(secs, "cooldown")?;
    }
    if let Some(program) = &cli.program {
        config.takeover.program = program.clone();
    }
    if let Some(dir) = &cli.media_dir {
        config.takeover.media_dir = Some(dir.clone());
    }
    if let Some(flag) = &cli.stop_flag {
        config.overrides.stop_flag = Some(flag.clone());
    }
    if let Some(flag) = &cli.restart_flag {
        config.overrides.restart_flag = Some(flag.clone());
    }
    Ok(())
}

fn parse_policy(policy: &str) -> Result<ProximityPolicy, Box<dyn std::error::Error>> {
    match policy {
        "first_match" => Ok(ProximityPolicy::FirstMatch),
        "closest" => Ok(ProximityPolicy::Closest),
        other => Err(format!("Policy must be 'first_match' or 'closest', got '{other}'").into()),
    }
}

fn frame_interval(fps: f64) -> Result<Duration, Box<dyn std::error::Error>> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(format!("FPS must be positive, got {fps}").into());
    }
    Duration::try_from_secs_f64(1.0 / fps).map_err(|e| format!("FPS {fps} is too low: {e}").into())
}

/// SIGINT, SIGTERM and SIGHUP take the same drained shutdown as `q`, so the
/// takeover is stopped before the controller exits.
fn install_termination_handler(done: Sender<Done>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        let _ = done.send(Done::Signal);
    })
}

fn secs_to_ms(secs: f64, what: &str) -> Result<u64, Box<dyn std::error::Error>> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("{what} must be a non-negative number of seconds, got {secs}").into());
    }
    Ok((secs * 1000.0).round() as u64)
}

/// Reports when the replayed feed runs out (or the sampler thread dies).
fn watch_feed(sampler: thread::JoinHandle<()>, done: Sender<Done>) {
    thread::spawn(move || {
        if sampler.join().is_err() {
            log::error!("Sampler thread panicked");
        }
        let _ = done.send(Done::FeedEnded);
    });
}

/// Line-based operator commands on stdin. EOF just ends the reader, so the
/// controller keeps running when started without a terminal.
fn spawn_hotkeys(events: EventSender, done: Sender<Done>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let command = line.trim();
            if command.eq_ignore_ascii_case("q") || command.eq_ignore_ascii_case("quit") {
                let _ = done.send(Done::Quit);
                return;
            }
            match OverrideEvent::parse(command) {
                Some(event) => {
                    if events.override_event(event).is_err() {
                        return;
                    }
                }
                None if command.is_empty() => {}
                None => eprintln!("Unknown command '{command}' (s, r or q)"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("kiosk-sentinel").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = parse(&[
            "--stride",
            "2",
            "--absence-timeout",
            "7.5",
            "--policy",
            "closest",
            "--program",
            "mpv",
        ]);
        let mut config = KioskConfig::default();

        apply_overrides(&cli, &mut config).unwrap();

        assert_eq!(config.detection_stride, 2);
        assert_eq!(config.absence_timeout_ms, 7_500);
        assert_eq!(config.proximity_policy, ProximityPolicy::Closest);
        assert_eq!(config.takeover.program, "mpv");
        assert_eq!(config.cooldown_ms, KioskConfig::default().cooldown_ms);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let cli = parse(&["--policy", "nearest"]);

        assert!(apply_overrides(&cli, &mut KioskConfig::default()).is_err());
    }

    #[test]
    fn test_frame_interval_from_fps() {
        assert_eq!(frame_interval(10.0).unwrap(), Duration::from_millis(100));
        assert!(frame_interval(0.0).is_err());
        assert!(frame_interval(f64::NAN).is_err());
    }

    #[test]
    fn test_vanishing_fps_is_an_error_not_a_panic() {
        assert!(frame_interval(1e-300).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_termination_signal_requests_shutdown() {
        let (tx, rx) = crossbeam_channel::unbounded();
        install_termination_handler(tx).unwrap();

        let status = process::Command::new("kill")
            .arg("-TERM")
            .arg(process::id().to_string())
            .status()
            .unwrap();

        assert!(status.success());
        let done = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(done, Done::Signal));
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let cli = parse(&["--cooldown=-1"]);

        assert!(apply_overrides(&cli, &mut KioskConfig::default()).is_err());
    }
}
