use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};

use crate::presence::presence_reading::PresenceReading;
use crate::supervisor::takeover_supervisor::{Snapshot, TakeoverSupervisor};
use crate::takeover::domain::override_event::OverrideEvent;

/// Everything the supervisor reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Presence(PresenceReading),
    Override(OverrideEvent),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control loop is shut down")]
    ShutDown,

    #[error("control thread panicked")]
    Panicked,
}

/// Cloneable handle producers use to queue events for the control loop.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
    closed: Arc<AtomicBool>,
}

impl EventSender {
    /// Creates an unbounded event queue.
    pub fn channel() -> (Self, Receiver<Event>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sender = Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        };
        (sender, rx)
    }

    pub fn send(&self, event: Event) -> Result<(), ControlError> {
        if self.is_closed() {
            return Err(ControlError::ShutDown);
        }
        self.tx.send(event).map_err(|_| ControlError::ShutDown)
    }

    pub fn presence(&self, reading: PresenceReading) -> Result<(), ControlError> {
        self.send(Event::Presence(reading))
    }

    pub fn override_event(&self, event: OverrideEvent) -> Result<(), ControlError> {
        self.send(Event::Override(event))
    }

    pub fn manual_stop(&self) -> Result<(), ControlError> {
        self.override_event(OverrideEvent::StopNow)
    }

    pub fn restart(&self) -> Result<(), ControlError> {
        self.override_event(OverrideEvent::RestartNow)
    }

    /// Queues a shutdown behind everything already sent and refuses further
    /// events from every clone.
    pub fn shutdown(&self) -> Result<(), ControlError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ControlError::ShutDown);
        }
        self.tx
            .send(Event::Shutdown)
            .map_err(|_| ControlError::ShutDown)
    }

    /// Refuses further events without queueing a shutdown.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Single thread that owns the supervisor.
///
/// Events and ticks are applied one at a time, so every decision sees the
/// state left by the previous one.
pub struct ControlLoop {
    sender: EventSender,
    handle: thread::JoinHandle<Snapshot>,
}

impl ControlLoop {
    pub fn spawn(supervisor: TakeoverSupervisor, tick_interval: Duration) -> Self {
        let (sender, rx) = EventSender::channel();
        let handle = thread::spawn(move || run(supervisor, rx, tick_interval));
        Self { sender, handle }
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Requests shutdown (if nobody did yet) and waits for the final state.
    pub fn shutdown(self) -> Result<Snapshot, ControlError> {
        // Already requested by another sender; joining is all that is left.
        let _ = self.sender.shutdown();
        self.handle.join().map_err(|_| ControlError::Panicked)
    }
}

fn run(
    mut supervisor: TakeoverSupervisor,
    rx: Receiver<Event>,
    tick_interval: Duration,
) -> Snapshot {
    let ticker = crossbeam_channel::tick(tick_interval);
    log::debug!("Control loop started (tick {tick_interval:?})");

    loop {
        select! {
            recv(rx) -> msg => match msg {
                Ok(Event::Shutdown) | Err(_) => break,
                Ok(event) => dispatch(&mut supervisor, event),
            },
            recv(ticker) -> _ => supervisor.tick(Instant::now()),
        }
    }

    // Everything queued ahead of the shutdown was applied above; stragglers
    // that slipped in behind it are refused.
    let dropped = rx.try_iter().count();
    if dropped > 0 {
        log::debug!("Dropped {dropped} events received after shutdown");
    }

    supervisor.shutdown(Instant::now());
    log::debug!("Control loop stopped in {}", supervisor.phase());
    supervisor.snapshot()
}

fn dispatch(supervisor: &mut TakeoverSupervisor, event: Event) {
    match event {
        Event::Presence(reading) => supervisor.on_presence(&reading),
        Event::Override(OverrideEvent::StopNow) => supervisor.on_manual_stop(Instant::now()),
        Event::Override(OverrideEvent::RestartNow) => {
            supervisor.on_restart_request(Instant::now())
        }
        Event::Shutdown => {}
    }
}
