use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ConfigError, SensorFault};
use crate::schedule::{Anchor, Timepoint};
use crate::solar::Location;
use crate::switch::{Role, SwitchProfile};
use crate::vent::{Stage, VentProfile};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorLimits {
    pub min: f64,
    pub max: f64,
    /// Readings older than this are treated as missing.
    pub stale_after_secs: u64,
}

impl Default for SensorLimits {
    fn default() -> Self {
        SensorLimits {
            min: -40.0,
            max: 80.0,
            stale_after_secs: 180,
        }
    }
}

impl SensorLimits {
    pub fn check(&self, reading: Option<f64>) -> Result<f64, SensorFault> {
        let value = reading.ok_or(SensorFault::Missing)?;
        if !value.is_finite() {
            return Err(SensorFault::NotFinite);
        }
        if value < self.min || value > self.max {
            return Err(SensorFault::OutOfRange {
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenhouseConfig {
    pub location: Location,
    pub timepoints: Vec<Timepoint>,
    pub vents: Vec<VentProfile>,
    pub switches: Vec<SwitchProfile>,
    #[serde(default)]
    pub sensor: SensorLimits,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

fn default_tick_secs() -> u64 {
    1
}

fn stages(pairs: &[(f64, u8)]) -> Vec<Stage> {
    pairs
        .iter()
        .map(|&(modifier, target_percent)| Stage { modifier, target_percent })
        .collect()
}

impl Default for GreenhouseConfig {
    /// The prototype greenhouse: Montreal, eastern standard time all year.
    fn default() -> Self {
        GreenhouseConfig {
            location: Location {
                latitude: 45.50,
                longitude: -73.56,
                utc_offset: -5,
            },
            timepoints: vec![
                Timepoint::sunrise(-30, 18.0, 20.0),
                Timepoint::sunrise(0, 18.0, 22.0),
                Timepoint::clock(12, 30, 20.0, 24.0),
                Timepoint::sunset(-60, 20.0, 24.0),
                Timepoint::sunset(0, 17.0, 19.0),
            ],
            vents: vec![
                VentProfile {
                    name: "rollup1".to_string(),
                    hysteresis: 1.0,
                    rotate_up_secs: 25.0,
                    rotate_down_secs: 25.0,
                    pause_secs: 5.0,
                    stages: stages(&[(0.0, 25), (1.0, 50), (2.0, 75), (3.0, 100)]),
                },
                VentProfile {
                    name: "rollup2".to_string(),
                    hysteresis: 1.0,
                    rotate_up_secs: 25.0,
                    rotate_down_secs: 25.0,
                    pause_secs: 5.0,
                    stages: stages(&[(0.0, 10), (1.0, 30), (2.0, 50), (3.0, 70)]),
                },
            ],
            switches: vec![
                SwitchProfile {
                    name: "fan1".to_string(),
                    role: Role::Cooler,
                    modifier: 3.0,
                    hysteresis: 1.0,
                },
                SwitchProfile {
                    name: "heater1".to_string(),
                    role: Role::Heater,
                    modifier: -1.0,
                    hysteresis: 2.0,
                },
            ],
            sensor: SensorLimits::default(),
            tick_secs: default_tick_secs(),
        }
    }
}

fn in_range(
    unit: &'static str,
    name: &str,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            unit,
            name: name.to_string(),
            field,
            value,
            min,
            max,
        })
    }
}

impl GreenhouseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let loc = &self.location;
        in_range("location", "site", "latitude", loc.latitude, -90.0, 90.0)?;
        in_range("location", "site", "longitude", loc.longitude, -180.0, 180.0)?;
        in_range("location", "site", "utc_offset", loc.utc_offset as f64, -12.0, 14.0)?;
        if self.tick_secs == 0 {
            return Err(ConfigError::ZeroTick);
        }

        self.validate_timepoints()?;

        let mut names = HashSet::new();
        for vent in &self.vents {
            if !names.insert(vent.name.as_str()) {
                return Err(ConfigError::DuplicateName(vent.name.clone()));
            }
            validate_vent(vent)?;
        }
        for switch in &self.switches {
            if !names.insert(switch.name.as_str()) {
                return Err(ConfigError::DuplicateName(switch.name.clone()));
            }
            let (min, max) = match switch.role {
                Role::Cooler => (-5.0, 10.0),
                Role::Heater => (-10.0, 5.0),
            };
            in_range("switch", &switch.name, "modifier", switch.modifier, min, max)?;
            in_range("switch", &switch.name, "hysteresis", switch.hysteresis, 0.0, 5.0)?;
        }
        Ok(())
    }

    fn validate_timepoints(&self) -> Result<(), ConfigError> {
        if self.timepoints.is_empty() {
            return Err(ConfigError::NoTimepoints);
        }
        for (i, tp) in self.timepoints.iter().enumerate() {
            let name = format!("#{}", i + 1);
            let (min, max) = match tp.anchor {
                Anchor::Sunrise | Anchor::Sunset => (-60.0, 60.0),
                // 24:00 is accepted and means midnight.
                Anchor::Clock => (0.0, 24.0 * 60.0),
            };
            in_range("timepoint", &name, "offset_minutes", tp.offset_minutes as f64, min, max)?;
            in_range("timepoint", &name, "heat", tp.heat, 0.0, 50.0)?;
            in_range("timepoint", &name, "cool", tp.cool, 0.0, 50.0)?;

            // Same anchor and offset collide on every date.
            if let Some(first) = self.timepoints[..i]
                .iter()
                .position(|other| other.anchor == tp.anchor && other.fixed_offset() == tp.fixed_offset())
            {
                return Err(ConfigError::DuplicateTimepoint { first, second: i });
            }
        }
        Ok(())
    }
}

fn validate_vent(vent: &VentProfile) -> Result<(), ConfigError> {
    let name = vent.name.as_str();
    in_range("vent", name, "hysteresis", vent.hysteresis, 0.0, 5.0)?;
    in_range("vent", name, "rotate_up_secs", vent.rotate_up_secs, 0.0, 300.0)?;
    in_range("vent", name, "rotate_down_secs", vent.rotate_down_secs, 0.0, 300.0)?;
    in_range("vent", name, "pause_secs", vent.pause_secs, 0.0, 240.0)?;
    if vent.rotate_down_secs <= 0.0 {
        return Err(ConfigError::NoCalibrationTime(vent.name.clone()));
    }

    if vent.stages.is_empty() {
        return Err(ConfigError::EmptyLadder(vent.name.clone()));
    }
    for stage in &vent.stages {
        in_range("vent", name, "stage modifier", stage.modifier, -5.0, 10.0)?;
        in_range("vent", name, "stage target", stage.target_percent as f64, 0.0, 100.0)?;
    }
    for (index, pair) in vent.stages.windows(2).enumerate() {
        if pair[1].modifier <= pair[0].modifier || pair[1].target_percent <= pair[0].target_percent {
            return Err(ConfigError::UnsortedLadder {
                name: vent.name.clone(),
                index: index + 1,
            });
        }
    }
    Ok(())
}
