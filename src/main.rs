//! `envmon`: console front end for the simulated sensor dashboard.
//!
//! Usage:
//!   envmon [CONFIG_PATH]
//!
//! Settings come from `envmon.toml` (or `ENVMON_SETTINGS`) and `ENVMON_*`
//! environment variables; a `.env` file is honoured. While running, type
//! `start`, `stop`, `toggle <SENSOR>` or `quit` followed by Enter.

use chrono::Utc;
use envmon_sim::config::{self, Scheduling, Settings, Variant};
use envmon_sim::console::{Command, ConsoleSink, Layout};
use envmon_sim::generator::RandomSource;
use envmon_sim::logging::{self, Component};
use envmon_sim::presentation::PresentationEvent;
use envmon_sim::scheduler::{BackgroundLoop, CooperativeTimer, SimulationState, StopAck};
use envmon_sim::simulation::{FleetSimulation, SensorPanel};
use std::error::Error;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// How long the event loop waits for input when no tick is scheduled.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// How often the fleet front end drains events from the refresh thread.
const EVENT_POLL: Duration = Duration::from_millis(100);

fn main() {
    dotenv::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("✗ {}", e);
            process::exit(2);
        }
    };

    logging::init_logger(
        settings.logging.level,
        settings.logging.file.as_deref(),
        settings.logging.timestamps,
    );

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.sensor_config.clone());

    logging::info(
        Component::System,
        None,
        &format!("Starting {:?} dashboard, refresh every {} ms", settings.variant, settings.period().as_millis()),
    );

    let commands = spawn_command_reader();
    let outcome = match settings.variant.scheduling() {
        Scheduling::Cooperative => run_panel(&settings, &config_path, &commands),
        Scheduling::BackgroundThread => run_fleet(&settings, &commands),
    };

    if let Err(e) = outcome {
        logging::error(Component::System, None, &format!("Startup failed: {}", e));
        process::exit(1);
    }
}

/// Reads commands from stdin on a separate thread so the event loop never
/// blocks on the terminal. The channel disconnects at end of input.
fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => eprintln!("commands: start | stop | toggle <SENSOR> | quit"),
            }
        }
    });
    rx
}

/// Waits up to `timeout` for a command. Sets `stdin_open` to false once the
/// reader is gone and sleeps instead.
fn next_command(commands: &Receiver<Command>, timeout: Duration, stdin_open: &mut bool) -> Option<Command> {
    if !*stdin_open {
        thread::sleep(timeout);
        return None;
    }
    match commands.recv_timeout(timeout) {
        Ok(command) => Some(command),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => {
            *stdin_open = false;
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Fixed station / toggleable sensors
// ---------------------------------------------------------------------------

fn run_panel(settings: &Settings, config_path: &Path, commands: &Receiver<Command>) -> Result<(), Box<dyn Error>> {
    let sensors = config::load_sensor_config(config_path, settings.strictness())?;
    let source = RandomSource::from_seed_or_entropy(settings.seed);
    let panel = SensorPanel::new(sensors, settings.variant.generator_mode(), Box::new(source));

    let mut timer = CooperativeTimer::new(panel, settings.period());
    let mut console = ConsoleSink::new(io::stdout(), Layout::SensorRows, settings.colors);
    timer.start(Instant::now(), &mut console);

    let mut stdin_open = true;
    loop {
        let wait = timer.time_until_due(Instant::now()).unwrap_or(IDLE_POLL);
        match next_command(commands, wait, &mut stdin_open) {
            Some(Command::Start) => {
                timer.start(Instant::now(), &mut console);
            }
            Some(Command::Stop) => {
                timer.stop(&mut console);
            }
            Some(Command::Toggle(sensor)) => {
                if settings.variant != Variant::ToggleableSensors {
                    logging::warn(Component::Console, None, "sensors can only be toggled in the toggleable_sensors variant");
                } else if timer.simulation_mut().toggle(&sensor, &mut console).is_none() {
                    logging::warn(Component::Console, None, &format!("no sensor '{}' configured", sensor));
                }
            }
            Some(Command::Quit) => {
                timer.stop(&mut console);
                return Ok(());
            }
            None => {}
        }

        if !stdin_open && timer.state() == SimulationState::Stopped {
            return Ok(());
        }
        timer.pump(Instant::now(), Utc::now(), &mut console);
    }
}

// ---------------------------------------------------------------------------
// Mobile station fleet
// ---------------------------------------------------------------------------

fn run_fleet(settings: &Settings, commands: &Receiver<Command>) -> Result<(), Box<dyn Error>> {
    let (events_tx, events_rx) = mpsc::channel::<PresentationEvent>();
    let mut background = BackgroundLoop::new(settings.period());
    let mut console = ConsoleSink::new(io::stdout(), Layout::StationRows, settings.colors);
    let mut stopping: Vec<StopAck> = Vec::new();

    let fleet_size = settings.fleet_size;
    let seed = settings.seed;
    let start = |background: &mut BackgroundLoop| {
        background.start(
            move || FleetSimulation::spawn(fleet_size, Box::new(RandomSource::from_seed_or_entropy(seed))),
            events_tx.clone(),
        )
    };
    start(&mut background);

    let mut stdin_open = true;
    loop {
        for event in events_rx.try_iter() {
            event.dispatch(&mut console);
        }
        stopping.retain(|ack| !ack.is_finished());

        match next_command(commands, EVENT_POLL, &mut stdin_open) {
            Some(Command::Start) => {
                if !start(&mut background) {
                    logging::info(Component::Console, None, "simulation already running");
                }
            }
            Some(Command::Stop) => {
                stopping.extend(background.stop());
            }
            Some(Command::Toggle(_)) => {
                logging::warn(Component::Console, None, "fleet stations carry a fixed sensor set");
            }
            Some(Command::Quit) => break,
            None => {}
        }

        if !stdin_open && background.state() == SimulationState::Stopped && stopping.is_empty() {
            break;
        }
    }

    stopping.extend(background.stop());
    for ack in stopping {
        if ack.wait().is_err() {
            logging::error(Component::Scheduler, None, "refresh thread panicked");
        }
    }
    for event in events_rx.try_iter() {
        event.dispatch(&mut console);
    }
    Ok(())
}
