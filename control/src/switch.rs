use serde::{Deserialize, Serialize};

use crate::actuator::{Actuator, ActuatorCommand, ActuatorStatus, ControlInput, TickTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Follows the heating reference; on below the band.
    Heater,
    /// Follows the cooling reference; on above the band.
    Cooler,
}

/// On/off relay driven by a single hysteresis band, e.g. a fan or a furnace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchProfile {
    pub name: String,
    pub role: Role,
    pub modifier: f64,
    pub hysteresis: f64,
}

impl SwitchProfile {
    pub fn start_threshold(&self, reference: f64) -> f64 {
        reference + self.modifier
    }

    pub fn stop_threshold(&self, reference: f64) -> f64 {
        match self.role {
            Role::Cooler => self.start_threshold(reference) - self.hysteresis,
            Role::Heater => self.start_threshold(reference) + self.hysteresis,
        }
    }

    /// Next relay state. Inside the band the current state is kept.
    pub fn next_state(&self, reference: f64, temperature: f64, is_on: bool) -> bool {
        let start = self.start_threshold(reference);
        let stop = self.stop_threshold(reference);
        match self.role {
            Role::Cooler if temperature >= start => true,
            Role::Cooler if temperature <= stop => false,
            Role::Heater if temperature <= start => true,
            Role::Heater if temperature >= stop => false,
            _ => is_on,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchStatus {
    pub name: String,
    pub role: Role,
    pub on: bool,
    pub start_threshold: Option<f64>,
    pub stop_threshold: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SwitchController {
    profile: SwitchProfile,
    is_on: bool,
    reference: Option<f64>,
}

impl SwitchController {
    pub fn new(profile: SwitchProfile) -> Self {
        SwitchController {
            profile,
            is_on: false,
            reference: None,
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Returns the new state on a transition, `None` otherwise.
    pub fn update(&mut self, input: &ControlInput) -> Option<bool> {
        let reference = match self.profile.role {
            Role::Heater => input.setpoints.heat,
            Role::Cooler => input.setpoints.cool,
        };
        self.reference = Some(reference);

        let next = self.profile.next_state(reference, input.temperature, self.is_on);
        if next == self.is_on {
            return None;
        }
        tracing::info!(
            switch = %self.profile.name,
            on = next,
            temperature = input.temperature,
            reference,
            "relay switched"
        );
        self.is_on = next;
        Some(next)
    }

    pub fn switch_status(&self) -> SwitchStatus {
        SwitchStatus {
            name: self.profile.name.clone(),
            role: self.profile.role,
            on: self.is_on,
            start_threshold: self.reference.map(|r| self.profile.start_threshold(r)),
            stop_threshold: self.reference.map(|r| self.profile.stop_threshold(r)),
        }
    }
}

impl Actuator for SwitchController {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn tick(&mut self, _now: TickTime, input: Option<&ControlInput>) -> Vec<ActuatorCommand> {
        input
            .and_then(|input| self.update(input))
            .map(|on| ActuatorCommand::Relay {
                switch: self.profile.name.clone(),
                on,
            })
            .into_iter()
            .collect()
    }

    fn hold(&self) -> ActuatorCommand {
        ActuatorCommand::Relay {
            switch: self.profile.name.clone(),
            on: self.is_on,
        }
    }

    fn status(&self) -> ActuatorStatus {
        ActuatorStatus::Switch(self.switch_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Setpoints;

    fn input(heat: f64, cool: f64, temperature: f64) -> ControlInput {
        ControlInput {
            setpoints: Setpoints { heat, cool },
            temperature,
        }
    }

    fn heater() -> SwitchProfile {
        SwitchProfile {
            name: "furnace".to_string(),
            role: Role::Heater,
            modifier: -1.0,
            hysteresis: 2.0,
        }
    }

    fn fan() -> SwitchProfile {
        SwitchProfile {
            name: "fan".to_string(),
            role: Role::Cooler,
            modifier: 3.0,
            hysteresis: 1.0,
        }
    }

    #[test]
    fn heater_band() {
        let mut furnace = SwitchController::new(heater());
        assert_eq!(furnace.update(&input(18.0, 24.0, 17.5)), None);
        assert_eq!(furnace.update(&input(18.0, 24.0, 17.0)), Some(true));
        assert_eq!(furnace.update(&input(18.0, 24.0, 18.0)), None);
        assert_eq!(furnace.update(&input(18.0, 24.0, 18.9)), None);
        assert!(furnace.is_on());
        assert_eq!(furnace.update(&input(18.0, 24.0, 19.0)), Some(false));
        assert_eq!(furnace.update(&input(18.0, 24.0, 17.5)), None);
        assert!(!furnace.is_on());
    }

    #[test]
    fn fan_band_follows_cooling_reference() {
        let mut fan = SwitchController::new(fan());
        assert_eq!(fan.update(&input(40.0, 24.0, 26.9)), None);
        assert_eq!(fan.update(&input(40.0, 24.0, 27.0)), Some(true));
        assert_eq!(fan.update(&input(40.0, 24.0, 26.1)), None);
        assert_eq!(fan.update(&input(40.0, 24.0, 26.0)), Some(false));
    }

    #[test]
    fn pure_transition_function() {
        let fan = fan();
        assert!(fan.next_state(24.0, 26.5, true));
        assert!(!fan.next_state(24.0, 26.5, false));
        let heater = heater();
        assert!(heater.next_state(18.0, 18.5, true));
        assert!(!heater.next_state(18.0, 18.5, false));
    }

    #[test]
    fn tick_is_edge_triggered() {
        let now = TickTime {
            wall: chrono::NaiveDate::from_ymd_opt(2017, 12, 8)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap(),
            monotonic: std::time::Instant::now(),
        };
        let mut furnace = SwitchController::new(heater());
        let cold = input(18.0, 20.0, 15.0);
        assert_eq!(
            furnace.tick(now, Some(&cold)),
            vec![ActuatorCommand::Relay { switch: "furnace".to_string(), on: true }]
        );
        assert!(furnace.tick(now, Some(&cold)).is_empty());
        assert!(furnace.tick(now, None).is_empty());
        assert!(furnace.is_on());
        assert_eq!(
            furnace.hold(),
            ActuatorCommand::Relay { switch: "furnace".to_string(), on: true }
        );
    }

    #[test]
    fn status_reports_thresholds() {
        let mut furnace = SwitchController::new(heater());
        assert_eq!(furnace.switch_status().start_threshold, None);
        furnace.update(&input(18.0, 24.0, 20.0));
        let status = furnace.switch_status();
        assert_eq!(status.start_threshold, Some(17.0));
        assert_eq!(status.stop_threshold, Some(19.0));
    }
}
