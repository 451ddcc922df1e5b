//! Greenhouse climate control: a sunrise/sunset anchored setpoint schedule
//! driving staged roll-up vents and on/off fans and heaters.

pub mod actuator;
pub mod clock;
pub mod config;
pub mod error;
pub mod greenhouse;
pub mod schedule;
pub mod solar;
pub mod switch;
pub mod vent;

pub use actuator::{Actuator, ActuatorCommand, ActuatorStatus, ControlInput, TickTime};
pub use config::{GreenhouseConfig, SensorLimits};
pub use greenhouse::{Greenhouse, GreenhouseStatus, TickInput, TickOutput};
pub use schedule::{Setpoints, Timepoint};
