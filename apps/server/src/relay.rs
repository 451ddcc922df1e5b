use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

use greenhouse_control::ActuatorCommand;

/// Sends actuator commands as JSON datagrams to each actuator's relay board.
pub struct RelaySender {
    socket: UdpSocket,
    addrs: HashMap<String, String>,
}

pub fn encode(command: &ActuatorCommand) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(command)?)
}

impl RelaySender {
    pub async fn bind(addrs: HashMap<String, String>) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("binding relay socket")?;
        Ok(RelaySender { socket, addrs })
    }

    pub async fn send(&self, command: &ActuatorCommand) -> Result<()> {
        let addr = self
            .addrs
            .get(command.actuator())
            .ok_or_else(|| anyhow!("no address for actuator `{}`", command.actuator()))?;
        let out_bytes = encode(command)?;
        self.socket
            .send_to(&out_bytes, addr.as_str())
            .await
            .with_context(|| format!("sending to {}", addr))?;
        Ok(())
    }
}

/// Decides when to repeat every actuator's full state.
pub struct ResendTimer {
    period: Option<Duration>,
    last: Instant,
}

impl ResendTimer {
    /// `period_secs == 0` never fires.
    pub fn new(period_secs: u64, now: Instant) -> Self {
        ResendTimer {
            period: (period_secs > 0).then(|| Duration::from_secs(period_secs)),
            last: now,
        }
    }

    pub fn due(&mut self, now: Instant) -> bool {
        match self.period {
            Some(period) if now.saturating_duration_since(self.last) >= period => {
                self.last = now;
                true
            }
            _ => false,
        }
    }
}
