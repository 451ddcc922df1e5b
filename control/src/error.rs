use thiserror::Error;

/// Startup validation failures. Any of these refuses to start actuator control.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no timepoints configured")]
    NoTimepoints,
    #[error("{unit} `{name}`: {field} = {value} is outside {min}..={max}")]
    OutOfRange {
        unit: &'static str,
        name: String,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("vent `{0}` has no stages")]
    EmptyLadder(String),
    #[error("vent `{name}`: stage {index} does not increase both modifier and target")]
    UnsortedLadder { name: String, index: usize },
    #[error("vent `{0}`: rotate_down_secs must be positive for calibration")]
    NoCalibrationTime(String),
    #[error("actuator name `{0}` is used more than once")]
    DuplicateName(String),
    #[error("timepoints {first} and {second} always resolve to the same time")]
    DuplicateTimepoint { first: usize, second: usize },
    #[error("tick period must be positive")]
    ZeroTick,
}

/// Scheduling failure; the caller holds the last good setpoints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("no timepoints to schedule")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorFault {
    #[error("no temperature reading")]
    Missing,
    #[error("temperature reading is not a number")]
    NotFinite,
    #[error("temperature {value:.1} outside {min:.1}..={max:.1}")]
    OutOfRange { value: f64, min: f64, max: f64 },
}
