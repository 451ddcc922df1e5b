use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::schedule::Setpoints;
use crate::switch::SwitchStatus;
use crate::vent::{MotorCommand, VentStatus};

/// The current tick on both clocks. Deadlines run on `monotonic`; `wall` is
/// only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTime {
    pub wall: NaiveDateTime,
    pub monotonic: Instant,
}

/// One tick's validated inputs. Absent when the sensor or schedule is faulted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlInput {
    pub setpoints: Setpoints,
    pub temperature: f64,
}

/// Edge-triggered output for an external actuator driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActuatorCommand {
    Motor { vent: String, command: MotorCommand },
    Relay { switch: String, on: bool },
}

impl ActuatorCommand {
    pub fn actuator(&self) -> &str {
        match self {
            ActuatorCommand::Motor { vent, .. } => vent,
            ActuatorCommand::Relay { switch, .. } => switch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActuatorStatus {
    Vent(VentStatus),
    Switch(SwitchStatus),
}

pub trait Actuator: Send {
    fn name(&self) -> &str;

    /// Advances the controller to `now`. With `input == None` only time-driven
    /// transitions happen; nothing new is commanded.
    fn tick(&mut self, now: TickTime, input: Option<&ControlInput>) -> Vec<ActuatorCommand>;

    /// Command that reproduces the current output, for re-sending over a lossy link.
    fn hold(&self) -> ActuatorCommand;

    fn status(&self) -> ActuatorStatus;
}
