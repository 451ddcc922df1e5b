//! Roll-up vent: staged hysteresis ladder plus a timed, non-blocking motor.
//!
//! The motor cycle is `Idle -> Moving -> Pausing -> Idle`. A vent whose position
//! is unknown first runs a full close (`Calibrating`) before any other move.
//! Target changes while the motor is busy are recorded and acted upon the next
//! time the vent is idle; an in-flight move is never preempted.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::actuator::{Actuator, ActuatorCommand, ActuatorStatus, ControlInput, TickTime};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Added to the cooling reference to get the opening threshold.
    pub modifier: f64,
    pub target_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VentProfile {
    pub name: String,
    pub hysteresis: f64,
    pub rotate_up_secs: f64,
    pub rotate_down_secs: f64,
    pub pause_secs: f64,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorCommand {
    Open,
    Close,
    Stop,
}

/// Motor phase. Deadlines are monotonic; telemetry shows `remaining_secs` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MotorState {
    Idle,
    Calibrating {
        #[serde(skip)]
        until: Instant,
    },
    Moving {
        direction: MotorCommand,
        to: u8,
        #[serde(skip)]
        until: Instant,
    },
    Pausing {
        #[serde(skip)]
        until: Instant,
    },
}

impl MotorState {
    fn deadline(&self) -> Option<Instant> {
        match *self {
            MotorState::Idle => None,
            MotorState::Calibrating { until }
            | MotorState::Moving { until, .. }
            | MotorState::Pausing { until } => Some(until),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VentStatus {
    pub name: String,
    pub target_percent: u8,
    /// `None` until the first calibration run completes.
    pub position: Option<u8>,
    pub active_stage: Option<usize>,
    pub motor: MotorState,
    /// Time left until the current motor deadline, as of the last tick.
    pub remaining_secs: Option<f64>,
    pub last_move_end: Option<NaiveDateTime>,
}

fn seconds(secs: f64) -> Duration {
    Duration::from_millis((secs * 1000.0).round().max(0.0) as u64)
}

#[derive(Debug, Clone)]
pub struct VentController {
    profile: VentProfile,
    position: Option<u8>,
    motor: MotorState,
    active_stage: Option<usize>,
    target_percent: u8,
    last_move_end: Option<NaiveDateTime>,
    last_tick: Option<Instant>,
}

impl VentController {
    pub fn new(profile: VentProfile) -> Self {
        VentController {
            profile,
            position: None,
            motor: MotorState::Idle,
            active_stage: None,
            target_percent: 0,
            last_move_end: None,
            last_tick: None,
        }
    }

    /// Starts from a known position, skipping calibration.
    pub fn with_position(profile: VentProfile, percent: u8) -> Self {
        VentController {
            position: Some(percent.min(100)),
            ..Self::new(profile)
        }
    }

    pub fn motor(&self) -> MotorState {
        self.motor
    }

    pub fn position(&self) -> Option<u8> {
        self.position
    }

    pub fn target_percent(&self) -> u8 {
        self.target_percent
    }

    /// Walks the stage ladder and records the resulting target opening.
    pub fn update_target(&mut self, cool_ref: f64, temperature: f64) -> u8 {
        let stages = &self.profile.stages;
        let hysteresis = self.profile.hysteresis;
        let open = |i: usize| cool_ref + stages[i].modifier;
        let close = |i: usize| open(i) - hysteresis;

        if let Some(top) = (0..stages.len()).rev().find(|&i| temperature >= open(i)) {
            if self.active_stage.map_or(true, |active| top > active) {
                self.active_stage = Some(top);
            }
        }
        if let Some(active) = self.active_stage {
            if temperature < close(active) {
                self.active_stage = (0..active).rev().find(|&j| temperature >= close(j));
            }
        }

        let target = self.active_stage.map_or(0, |i| stages[i].target_percent);
        if target != self.target_percent {
            tracing::info!(
                vent = %self.profile.name,
                from = self.target_percent,
                to = target,
                temperature,
                cool_ref,
                "vent target changed"
            );
            self.target_percent = target;
        }
        target
    }

    /// Runs every transition that is due at `now`. New moves only start when
    /// `may_start` is set.
    pub fn step(&mut self, now: TickTime, may_start: bool) -> Vec<MotorCommand> {
        self.last_tick = Some(now.monotonic);
        let mut commands = Vec::new();
        loop {
            match self.motor {
                MotorState::Calibrating { until } if now.monotonic >= until => {
                    self.position = Some(0);
                    self.finish_move(now, &mut commands);
                }
                MotorState::Moving { to, until, .. } if now.monotonic >= until => {
                    self.position = Some(to);
                    self.finish_move(now, &mut commands);
                }
                MotorState::Pausing { until } if now.monotonic >= until => {
                    self.motor = MotorState::Idle;
                }
                MotorState::Idle if may_start => {
                    commands.extend(self.start_move(now));
                    break;
                }
                _ => break,
            }
        }
        commands
    }

    fn start_move(&mut self, now: TickTime) -> Option<MotorCommand> {
        let Some(current) = self.position else {
            let travel = seconds(self.profile.rotate_down_secs);
            let until = now.monotonic + travel;
            tracing::info!(vent = %self.profile.name, ?travel, "calibrating: closing fully");
            self.motor = MotorState::Calibrating { until };
            return Some(MotorCommand::Close);
        };

        let delta = self.target_percent as i32 - current as i32;
        if delta == 0 {
            return None;
        }
        let (direction, full_travel) = if delta > 0 {
            (MotorCommand::Open, self.profile.rotate_up_secs)
        } else {
            (MotorCommand::Close, self.profile.rotate_down_secs)
        };
        let travel = seconds(delta.unsigned_abs() as f64 / 100.0 * full_travel);
        let until = now.monotonic + travel;
        tracing::info!(
            vent = %self.profile.name,
            ?direction,
            from = current,
            to = self.target_percent,
            ?travel,
            "vent moving"
        );
        self.motor = MotorState::Moving {
            direction,
            to: self.target_percent,
            until,
        };
        Some(direction)
    }

    fn finish_move(&mut self, now: TickTime, commands: &mut Vec<MotorCommand>) {
        commands.push(MotorCommand::Stop);
        self.last_move_end = Some(now.wall);
        self.motor = MotorState::Pausing {
            until: now.monotonic + seconds(self.profile.pause_secs),
        };
        tracing::debug!(vent = %self.profile.name, position = ?self.position, "vent stopped");
    }

    pub fn vent_status(&self) -> VentStatus {
        VentStatus {
            name: self.profile.name.clone(),
            target_percent: self.target_percent,
            position: self.position,
            active_stage: self.active_stage,
            motor: self.motor,
            remaining_secs: self
                .motor
                .deadline()
                .zip(self.last_tick)
                .map(|(until, now)| until.saturating_duration_since(now).as_secs_f64()),
            last_move_end: self.last_move_end,
        }
    }

    /// Motor output that matches the current phase.
    pub fn motor_command(&self) -> MotorCommand {
        match self.motor {
            MotorState::Calibrating { .. } => MotorCommand::Close,
            MotorState::Moving { direction, .. } => direction,
            MotorState::Idle | MotorState::Pausing { .. } => MotorCommand::Stop,
        }
    }
}

impl Actuator for VentController {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn tick(&mut self, now: TickTime, input: Option<&ControlInput>) -> Vec<ActuatorCommand> {
        if let Some(input) = input {
            self.update_target(input.setpoints.cool, input.temperature);
        }
        self.step(now, input.is_some())
            .into_iter()
            .map(|command| ActuatorCommand::Motor {
                vent: self.profile.name.clone(),
                command,
            })
            .collect()
    }

    fn hold(&self) -> ActuatorCommand {
        ActuatorCommand::Motor {
            vent: self.profile.name.clone(),
            command: self.motor_command(),
        }
    }

    fn status(&self) -> ActuatorStatus {
        ActuatorStatus::Vent(self.vent_status())
    }
}
