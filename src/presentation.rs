//! Interface to the presentation layer.
//!
//! The core never renders anything itself. It reports measurements, sensor
//! toggles, and run-state changes through `PresentationSink`, and whoever
//! draws the tables implements it.

use crate::logging::{self, Component};
use crate::model::Snapshot;
use crate::scheduler::SimulationState;
use std::sync::mpsc::Sender;

pub trait PresentationSink {
    fn on_measurement(&mut self, snapshot: &Snapshot);
    fn on_sensor_toggled(&mut self, sensor_type: &str, active: bool);
    fn on_simulation_state_changed(&mut self, state: SimulationState);
}

/// Owned form of every sink callback, for queues and channels.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    Measurement(Snapshot),
    SensorToggled { sensor_type: String, active: bool },
    SimulationStateChanged(SimulationState),
}

impl PresentationEvent {
    /// Replays the event onto a sink.
    pub fn dispatch(&self, sink: &mut dyn PresentationSink) {
        match self {
            PresentationEvent::Measurement(snapshot) => sink.on_measurement(snapshot),
            PresentationEvent::SensorToggled { sensor_type, active } => {
                sink.on_sensor_toggled(sensor_type, *active)
            }
            PresentationEvent::SimulationStateChanged(state) => sink.on_simulation_state_changed(*state),
        }
    }
}

/// Records events in order.
impl PresentationSink for Vec<PresentationEvent> {
    fn on_measurement(&mut self, snapshot: &Snapshot) {
        self.push(PresentationEvent::Measurement(snapshot.clone()));
    }

    fn on_sensor_toggled(&mut self, sensor_type: &str, active: bool) {
        self.push(PresentationEvent::SensorToggled {
            sensor_type: sensor_type.to_string(),
            active,
        });
    }

    fn on_simulation_state_changed(&mut self, state: SimulationState) {
        self.push(PresentationEvent::SimulationStateChanged(state));
    }
}

/// Forwards events to another thread. A receiver that has gone away is not
/// an error for the simulation; the event is dropped.
impl PresentationSink for Sender<PresentationEvent> {
    fn on_measurement(&mut self, snapshot: &Snapshot) {
        forward(self, PresentationEvent::Measurement(snapshot.clone()));
    }

    fn on_sensor_toggled(&mut self, sensor_type: &str, active: bool) {
        forward(
            self,
            PresentationEvent::SensorToggled {
                sensor_type: sensor_type.to_string(),
                active,
            },
        );
    }

    fn on_simulation_state_changed(&mut self, state: SimulationState) {
        forward(self, PresentationEvent::SimulationStateChanged(state));
    }
}

fn forward(sender: &Sender<PresentationEvent>, event: PresentationEvent) {
    if sender.send(event).is_err() {
        logging::debug(Component::Console, None, "presentation channel closed; event dropped");
    }
}
