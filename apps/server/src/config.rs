use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use greenhouse_control::GreenhouseConfig;

fn default_sensor_bind() -> String {
    "0.0.0.0:4000".to_string()
}

fn default_web_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_resend_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(flatten)]
    pub greenhouse: GreenhouseConfig,
    /// UDP address the temperature sensor reports to.
    #[serde(default = "default_sensor_bind")]
    pub sensor_bind: String,
    #[serde(default = "default_web_bind")]
    pub web_bind: String,
    /// Actuator name -> `host:port` of its relay board.
    #[serde(default)]
    pub actuators: HashMap<String, String>,
    /// Period for re-sending every actuator's current state; 0 disables it.
    #[serde(default = "default_resend_secs")]
    pub resend_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let greenhouse = GreenhouseConfig::default();
        let actuators = greenhouse
            .vents
            .iter()
            .map(|v| v.name.clone())
            .chain(greenhouse.switches.iter().map(|s| s.name.clone()))
            .map(|name| {
                let addr = format!("{}.local:4210", name);
                (name, addr)
            })
            .collect();
        ServerConfig {
            greenhouse,
            sensor_bind: default_sensor_bind(),
            web_bind: default_web_bind(),
            actuators,
            resend_secs: default_resend_secs(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ServerConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.greenhouse.validate()?;
        Ok(config)
    }
}
