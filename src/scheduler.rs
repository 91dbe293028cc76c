//! Refresh loop scheduling.
//!
//! Two scheduling models drive a `Simulation`:
//!
//! - `CooperativeTimer` runs inside the presentation layer's own event loop.
//!   The host calls `pump` whenever it wakes up; the timer ticks when the
//!   period has elapsed and schedules the next tick. Nothing is shared, so
//!   nothing is locked.
//! - `BackgroundLoop` runs the ticks on a dedicated thread with a real sleep
//!   in between. The `RunFlag` handed to that thread is the only state the
//!   two threads share. Stopping is cooperative: the thread notices the
//!   lowered flag at its next tick boundary, and `StopAck::wait` is how a
//!   caller learns that it actually has.
//!
//! # Clock injection
//! `CooperativeTimer` takes both the monotonic `now: Instant` used for
//! scheduling and the wall-clock `DateTime<Utc>` stamped on measurements, so
//! tests can step time without sleeping.

use crate::logging::{self, Component};
use crate::presentation::PresentationSink;
use crate::simulation::Simulation;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Stopped,
    Running,
}

impl fmt::Display for SimulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationState::Stopped => write!(f, "gestoppt"),
            SimulationState::Running => write!(f, "läuft"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cooperative timer
// ---------------------------------------------------------------------------

pub struct CooperativeTimer<S: Simulation> {
    simulation: S,
    period: Duration,
    next_due: Option<Instant>,
    ticks: u64,
    snapshots: u64,
}

impl<S: Simulation> CooperativeTimer<S> {
    pub fn new(simulation: S, period: Duration) -> Self {
        Self {
            simulation,
            period,
            next_due: None,
            ticks: 0,
            snapshots: 0,
        }
    }

    pub fn state(&self) -> SimulationState {
        if self.next_due.is_some() {
            SimulationState::Running
        } else {
            SimulationState::Stopped
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn simulation(&self) -> &S {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut S {
        &mut self.simulation
    }

    /// `Stopped -> Running`; the first tick is due immediately.
    ///
    /// Returns `false` and does nothing if already running.
    pub fn start(&mut self, now: Instant, sink: &mut dyn PresentationSink) -> bool {
        if self.next_due.is_some() {
            return false;
        }
        self.next_due = Some(now);
        self.ticks = 0;
        self.snapshots = 0;
        logging::info(Component::Scheduler, None, &format!("Refresh every {} ms", self.period.as_millis()));
        sink.on_simulation_state_changed(SimulationState::Running);
        true
    }

    /// `Running -> Stopped`; the pending tick is dropped, not run.
    ///
    /// Returns `false` and does nothing if already stopped.
    pub fn stop(&mut self, sink: &mut dyn PresentationSink) -> bool {
        if self.next_due.take().is_none() {
            return false;
        }
        logging::log_run_summary(Component::Scheduler, self.ticks, self.snapshots);
        sink.on_simulation_state_changed(SimulationState::Stopped);
        true
    }

    /// Time until the next tick is due, zero if overdue, `None` when stopped.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// Runs the tick if it is due and schedules the next one `period` after
    /// `now`. Returns whether a tick ran.
    pub fn pump(&mut self, now: Instant, wall_clock: DateTime<Utc>, sink: &mut dyn PresentationSink) -> bool {
        match self.next_due {
            Some(due) if now >= due => {}
            _ => return false,
        }

        let snapshots = self.simulation.tick(wall_clock);
        self.ticks += 1;
        self.snapshots += snapshots.len() as u64;
        for snapshot in &snapshots {
            sink.on_measurement(snapshot);
        }
        self.next_due = Some(now + self.period);
        true
    }
}

// ---------------------------------------------------------------------------
// Background thread loop
// ---------------------------------------------------------------------------

/// Run flag shared between the controller and one loop thread.
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn raised() -> Self {
        RunFlag(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn lower(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Join handle of a loop thread, shared between the `BackgroundLoop` that
/// spawned it and the `StopAck` handed out by `stop`. Whoever joins first
/// takes it.
type SharedHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

fn take_handle(handle: &SharedHandle) -> Option<JoinHandle<()>> {
    match handle.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

/// A handle already taken counts as finished: it was joined.
fn handle_finished(handle: &SharedHandle) -> bool {
    match handle.lock() {
        Ok(guard) => guard.as_ref().is_none_or(|h| h.is_finished()),
        Err(poisoned) => poisoned.into_inner().as_ref().is_none_or(|h| h.is_finished()),
    }
}

/// Returned by `BackgroundLoop::stop`. The loop thread may still be inside
/// its current tick or sleep; `wait` blocks until it has emitted `Stopped`
/// and exited. Dropping the ack does not detach the thread: the next
/// `BackgroundLoop::start` joins it before spawning.
pub struct StopAck {
    handle: SharedHandle,
}

impl StopAck {
    pub fn is_finished(&self) -> bool {
        handle_finished(&self.handle)
    }

    /// Blocks until the loop thread has exited. `Err` if it panicked.
    pub fn wait(self) -> thread::Result<()> {
        match take_handle(&self.handle) {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

struct ActiveRun {
    flag: RunFlag,
    handle: SharedHandle,
}

pub struct BackgroundLoop {
    period: Duration,
    run: Option<ActiveRun>,
    /// Thread of the previous session, until someone has joined it.
    stopping: Option<SharedHandle>,
}

impl BackgroundLoop {
    pub fn new(period: Duration) -> Self {
        Self { period, run: None, stopping: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// `Running` from `start` until `stop` is called.
    pub fn state(&self) -> SimulationState {
        match &self.run {
            Some(run) if run.flag.is_raised() && !handle_finished(&run.handle) => SimulationState::Running,
            _ => SimulationState::Stopped,
        }
    }

    /// Spawns the loop thread. The simulation is built on that thread by
    /// `factory`, so it lives exactly as long as the session.
    ///
    /// A previous session that is still winding down is joined first, so its
    /// last measurements and its `Stopped` event reach the sink before the
    /// new session's `Running`. This blocks for at most one tick and period.
    ///
    /// Returns `false` and does nothing if a loop is already running, or if
    /// the thread could not be spawned.
    pub fn start<S, F, K>(&mut self, factory: F, sink: K) -> bool
    where
        S: Simulation,
        F: FnOnce() -> S + Send + 'static,
        K: PresentationSink + Send + 'static,
    {
        if self.state() == SimulationState::Running {
            return false;
        }
        if let Some(run) = self.run.take() {
            // finished on its own; still needs joining
            run.flag.lower();
            self.stopping = Some(run.handle);
        }
        self.join_previous();

        let flag = RunFlag::raised();
        let thread_flag = flag.clone();
        let period = self.period;
        let spawned = thread::Builder::new()
            .name("envmon-refresh".to_string())
            .spawn(move || run_loop(factory(), thread_flag, period, sink));

        match spawned {
            Ok(handle) => {
                self.run = Some(ActiveRun {
                    flag,
                    handle: Arc::new(Mutex::new(Some(handle))),
                });
                true
            }
            Err(e) => {
                logging::error(Component::Scheduler, None, &format!("Could not spawn refresh thread: {}", e));
                false
            }
        }
    }

    /// Lowers the run flag. Returns `None` if nothing was running.
    pub fn stop(&mut self) -> Option<StopAck> {
        let run = self.run.take()?;
        run.flag.lower();
        self.stopping = Some(Arc::clone(&run.handle));
        Some(StopAck { handle: run.handle })
    }

    fn join_previous(&mut self) {
        let Some(shared) = self.stopping.take() else { return };
        if let Some(handle) = take_handle(&shared) {
            if handle.join().is_err() {
                logging::error(Component::Scheduler, None, "Previous refresh thread panicked");
            }
        }
    }
}

impl Drop for BackgroundLoop {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.flag.lower();
        }
    }
}

fn run_loop<S: Simulation, K: PresentationSink>(mut simulation: S, flag: RunFlag, period: Duration, mut sink: K) {
    logging::info(Component::Scheduler, None, &format!("Refresh thread every {} ms", period.as_millis()));
    sink.on_simulation_state_changed(SimulationState::Running);

    let mut ticks = 0u64;
    let mut emitted = 0u64;
    while flag.is_raised() {
        let snapshots = simulation.tick(Utc::now());
        ticks += 1;
        emitted += snapshots.len() as u64;
        for snapshot in &snapshots {
            sink.on_measurement(snapshot);
        }
        thread::sleep(period);
    }

    logging::log_run_summary(Component::Scheduler, ticks, emitted);
    sink.on_simulation_state_changed(SimulationState::Stopped);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Measurement, Snapshot};
    use crate::presentation::PresentationEvent;
    use std::collections::BTreeMap;
    use std::sync::mpsc;

    /// Emits one empty snapshot per tick, numbered by `station_id`.
    struct Counter {
        ticks: u32,
    }

    impl Simulation for Counter {
        fn tick(&mut self, now: DateTime<Utc>) -> Vec<Snapshot> {
            self.ticks += 1;
            vec![Snapshot {
                measurement: Measurement {
                    station_id: self.ticks,
                    timestamp: now.timestamp(),
                    readings: BTreeMap::new(),
                },
                levels: BTreeMap::new(),
            }]
        }
    }

    fn tick_ids(events: &[PresentationEvent]) -> Vec<u32> {
        events
            .iter()
            .filter_map(|e| match e {
                PresentationEvent::Measurement(s) => Some(s.measurement.station_id),
                _ => None,
            })
            .collect()
    }

    // --- Cooperative --------------------------------------------------------

    #[test]
    fn test_cooperative_first_tick_is_immediate() {
        let mut timer = CooperativeTimer::new(Counter { ticks: 0 }, Duration::from_millis(5000));
        let mut events: Vec<PresentationEvent> = Vec::new();
        let t0 = Instant::now();

        assert!(timer.start(t0, &mut events));
        assert_eq!(timer.time_until_due(t0), Some(Duration::ZERO));
        assert!(timer.pump(t0, Utc::now(), &mut events));
        assert_eq!(timer.time_until_due(t0), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_cooperative_ticks_once_per_period() {
        let period = Duration::from_millis(1000);
        let mut timer = CooperativeTimer::new(Counter { ticks: 0 }, period);
        let mut events: Vec<PresentationEvent> = Vec::new();
        let t0 = Instant::now();
        timer.start(t0, &mut events);

        assert!(timer.pump(t0, Utc::now(), &mut events));
        assert!(!timer.pump(t0 + Duration::from_millis(999), Utc::now(), &mut events));
        assert!(timer.pump(t0 + period, Utc::now(), &mut events));
        assert!(!timer.pump(t0 + period, Utc::now(), &mut events));
        assert_eq!(tick_ids(&events), vec![1, 2]);
    }

    #[test]
    fn test_cooperative_start_when_running_is_noop() {
        let mut timer = CooperativeTimer::new(Counter { ticks: 0 }, Duration::from_millis(10));
        let mut events: Vec<PresentationEvent> = Vec::new();
        let t0 = Instant::now();
        assert!(timer.start(t0, &mut events));
        assert!(!timer.start(t0, &mut events));
        assert_eq!(
            events,
            vec![PresentationEvent::SimulationStateChanged(SimulationState::Running)]
        );
    }

    #[test]
    fn test_cooperative_stop_drops_pending_tick() {
        let mut timer = CooperativeTimer::new(Counter { ticks: 0 }, Duration::from_millis(10));
        let mut events: Vec<PresentationEvent> = Vec::new();
        let t0 = Instant::now();
        timer.start(t0, &mut events);
        assert!(timer.stop(&mut events));
        assert_eq!(timer.state(), SimulationState::Stopped);
        assert!(!timer.pump(t0 + Duration::from_secs(60), Utc::now(), &mut events));
        assert!(tick_ids(&events).is_empty());
        assert_eq!(timer.time_until_due(t0), None);
        assert!(!timer.stop(&mut events), "second stop is a no-op");
    }

    #[test]
    fn test_cooperative_restart_resumes_ticking() {
        let mut timer = CooperativeTimer::new(Counter { ticks: 0 }, Duration::from_millis(10));
        let mut events: Vec<PresentationEvent> = Vec::new();
        let t0 = Instant::now();
        timer.start(t0, &mut events);
        timer.pump(t0, Utc::now(), &mut events);
        timer.stop(&mut events);
        timer.start(t0, &mut events);
        assert!(timer.pump(t0, Utc::now(), &mut events));
        assert_eq!(tick_ids(&events), vec![1, 2]);
        assert_eq!(timer.simulation().ticks, 2);
    }

    // --- Background ---------------------------------------------------------

    #[test]
    fn test_background_start_and_stop() {
        let mut bg = BackgroundLoop::new(Duration::from_millis(5));
        let (tx, rx) = mpsc::channel::<PresentationEvent>();

        assert!(bg.start(|| Counter { ticks: 0 }, tx));
        assert_eq!(bg.state(), SimulationState::Running);

        let first = rx.recv_timeout(Duration::from_secs(5)).expect("loop should report Running");
        assert_eq!(first, PresentationEvent::SimulationStateChanged(SimulationState::Running));
        let tick = rx.recv_timeout(Duration::from_secs(5)).expect("loop should tick");
        assert!(matches!(tick, PresentationEvent::Measurement(_)));

        let ack = bg.stop().expect("a running loop yields an ack");
        assert_eq!(bg.state(), SimulationState::Stopped);
        ack.wait().expect("loop thread should exit cleanly");

        let events: Vec<PresentationEvent> = rx.try_iter().collect();
        assert_eq!(
            events.last(),
            Some(&PresentationEvent::SimulationStateChanged(SimulationState::Stopped))
        );
    }

    #[test]
    fn test_background_start_when_running_is_noop() {
        let mut bg = BackgroundLoop::new(Duration::from_millis(5));
        let (tx, _rx) = mpsc::channel::<PresentationEvent>();
        assert!(bg.start(|| Counter { ticks: 0 }, tx.clone()));
        assert!(!bg.start(|| Counter { ticks: 0 }, tx));
        if let Some(ack) = bg.stop() {
            ack.wait().expect("loop thread should exit cleanly");
        }
    }

    #[test]
    fn test_background_stop_when_stopped_returns_none() {
        let mut bg = BackgroundLoop::new(Duration::from_millis(5));
        assert!(bg.stop().is_none());
        assert_eq!(bg.state(), SimulationState::Stopped);
    }

    #[test]
    fn test_background_restart_builds_fresh_simulation() {
        let mut bg = BackgroundLoop::new(Duration::from_millis(5));

        for _ in 0..2 {
            let (tx, rx) = mpsc::channel::<PresentationEvent>();
            assert!(bg.start(|| Counter { ticks: 0 }, tx));
            let tick = loop {
                match rx.recv_timeout(Duration::from_secs(5)).expect("loop should emit") {
                    PresentationEvent::Measurement(s) => break s,
                    _ => continue,
                }
            };
            assert_eq!(tick.measurement.station_id, 1, "each session starts a new simulation");
            bg.stop().expect("running").wait().expect("clean exit");
        }
    }

    #[test]
    fn test_background_stop_then_immediate_start_ends_running() {
        let mut bg = BackgroundLoop::new(Duration::from_millis(100));
        let (tx, rx) = mpsc::channel::<PresentationEvent>();

        assert!(bg.start(|| Counter { ticks: 0 }, tx.clone()));
        loop {
            let event = rx.recv_timeout(Duration::from_secs(5)).expect("loop should emit");
            if matches!(event, PresentationEvent::Measurement(_)) {
                break;
            }
        }

        // ack deliberately not awaited
        let _ack = bg.stop().expect("a running loop yields an ack");
        assert!(bg.start(|| Counter { ticks: 0 }, tx));
        thread::sleep(Duration::from_millis(150));

        let states: Vec<SimulationState> = rx
            .try_iter()
            .filter_map(|e| match e {
                PresentationEvent::SimulationStateChanged(state) => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![SimulationState::Stopped, SimulationState::Running],
            "old session must report Stopped before the new one reports Running"
        );
        assert_eq!(bg.state(), SimulationState::Running);

        bg.stop().expect("running").wait().expect("clean exit");
    }

    #[test]
    fn test_stop_ack_after_restart_is_already_joined() {
        let mut bg = BackgroundLoop::new(Duration::from_millis(5));
        let (tx, _rx) = mpsc::channel::<PresentationEvent>();
        assert!(bg.start(|| Counter { ticks: 0 }, tx.clone()));
        let ack = bg.stop().expect("running");
        assert!(bg.start(|| Counter { ticks: 0 }, tx));
        assert!(ack.is_finished(), "start joins the previous session");
        ack.wait().expect("joined thread reports a clean exit");
        bg.stop().expect("running").wait().expect("clean exit");
    }

    #[test]
    fn test_run_flag_shared_between_clones() {
        let flag = RunFlag::raised();
        let other = flag.clone();
        assert!(other.is_raised());
        flag.lower();
        assert!(!other.is_raised());
    }
}
