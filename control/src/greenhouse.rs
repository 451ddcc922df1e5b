use chrono::NaiveDateTime;
use serde::Serialize;
use std::time::Instant;

use crate::actuator::{Actuator, ActuatorCommand, ActuatorStatus, ControlInput, TickTime};
use crate::clock::ClockGuard;
use crate::config::GreenhouseConfig;
use crate::error::{ConfigError, SensorFault};
use crate::schedule::{Scheduler, Setpoints};
use crate::solar::SunTimes;
use crate::switch::SwitchController;
use crate::vent::VentController;

/// One snapshot of the outside world per tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    /// Local standard time from the RTC, if it answered.
    pub rtc: Option<NaiveDateTime>,
    pub monotonic: Instant,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GreenhouseStatus {
    pub time: NaiveDateTime,
    pub clock_reliable: bool,
    pub temperature: Option<f64>,
    pub sensor_fault: Option<String>,
    pub schedule_fault: Option<String>,
    pub setpoints: Option<Setpoints>,
    pub sun: Option<SunTimes>,
    pub actuators: Vec<ActuatorStatus>,
}

#[derive(Debug, Clone)]
pub struct TickOutput {
    pub commands: Vec<ActuatorCommand>,
    pub status: GreenhouseStatus,
}

/// Owns the scheduler and every actuator controller; one `tick` per period.
pub struct Greenhouse {
    config: GreenhouseConfig,
    scheduler: Scheduler,
    clock: ClockGuard,
    actuators: Vec<Box<dyn Actuator>>,
    setpoints: Option<Setpoints>,
    sun: Option<SunTimes>,
    sensor_fault: Option<SensorFault>,
    schedule_fault: Option<String>,
}

impl Greenhouse {
    pub fn new(config: GreenhouseConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut actuators: Vec<Box<dyn Actuator>> = Vec::new();
        for profile in &config.vents {
            actuators.push(Box::new(VentController::new(profile.clone())));
        }
        for profile in &config.switches {
            actuators.push(Box::new(SwitchController::new(profile.clone())));
        }
        tracing::info!(
            vents = config.vents.len(),
            switches = config.switches.len(),
            timepoints = config.timepoints.len(),
            "greenhouse control ready"
        );

        Ok(Greenhouse {
            scheduler: Scheduler::new(config.location, config.timepoints.clone()),
            config,
            clock: ClockGuard::new(),
            actuators,
            setpoints: None,
            sun: None,
            sensor_fault: None,
            schedule_fault: None,
        })
    }

    pub fn config(&self) -> &GreenhouseConfig {
        &self.config
    }

    /// Current output of every actuator, for periodic re-sending.
    pub fn hold_commands(&self) -> Vec<ActuatorCommand> {
        self.actuators.iter().map(|a| a.hold()).collect()
    }

    pub fn tick(&mut self, input: TickInput) -> TickOutput {
        let clock = self.clock.read(input.rtc, input.monotonic);

        // Without a trustworthy date the schedule is not re-evaluated.
        if clock.reliable {
            self.update_setpoints(clock.now);
        }

        let temperature = self.config.sensor.check(input.temperature);
        self.note_sensor(temperature.as_ref().err());

        let control = match (temperature.as_ref().ok(), self.setpoints) {
            (Some(&temperature), Some(setpoints)) => Some(ControlInput { setpoints, temperature }),
            _ => None,
        };

        let now = TickTime {
            wall: clock.now,
            monotonic: input.monotonic,
        };
        let mut commands = Vec::new();
        for actuator in self.actuators.iter_mut() {
            let issued = actuator.tick(now, control.as_ref());
            if !issued.is_empty() {
                tracing::info!(actuator = actuator.name(), commands = ?issued, "actuator commands");
            }
            commands.extend(issued);
        }
        tracing::debug!(
            time = %clock.now,
            temperature = ?input.temperature,
            setpoints = ?self.setpoints,
            commands = commands.len(),
            "tick"
        );

        TickOutput {
            commands,
            status: GreenhouseStatus {
                time: clock.now,
                clock_reliable: clock.reliable,
                temperature: temperature.as_ref().ok().copied(),
                sensor_fault: self.sensor_fault.as_ref().map(|f| f.to_string()),
                schedule_fault: self.schedule_fault.clone(),
                setpoints: self.setpoints,
                sun: self.sun,
                actuators: self.actuators.iter().map(|a| a.status()).collect(),
            },
        }
    }

    fn update_setpoints(&mut self, now: NaiveDateTime) {
        let date = now.date();
        self.sun = Some(self.scheduler.sun_times(date));
        match self.scheduler.setpoints(date, now.time()) {
            Ok(setpoints) => {
                if self.schedule_fault.take().is_some() {
                    tracing::info!("schedule recovered");
                }
                self.setpoints = Some(setpoints);
            }
            Err(e) => {
                let fault = e.to_string();
                if self.schedule_fault.as_deref() != Some(fault.as_str()) {
                    tracing::warn!(%date, error = %e, "cannot schedule, holding last setpoints");
                }
                self.schedule_fault = Some(fault);
            }
        }
    }

    fn note_sensor(&mut self, fault: Option<&SensorFault>) {
        match (fault, &self.sensor_fault) {
            (Some(new), Some(old)) if new == old => {}
            (Some(new), _) => tracing::warn!(fault = %new, "sensor fault, holding actuators"),
            (None, Some(_)) => tracing::info!("sensor recovered"),
            (None, None) => {}
        }
        self.sensor_fault = fault.cloned();
    }
}
