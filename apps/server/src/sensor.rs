use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

const MAX_UDP: usize = 1460;

/// Datagram sent by the sensor node. A report carries either a reading or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReport {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Reading {
    value: Option<f64>,
    received: Instant,
}

/// Most recent sensor report, shared between the UDP listener and the control loop.
#[derive(Clone, Default)]
pub struct LatestReading {
    inner: Arc<Mutex<Option<Reading>>>,
}

impl LatestReading {
    pub fn record(&self, value: Option<f64>, received: Instant) {
        if let Ok(mut latest) = self.inner.lock() {
            *latest = Some(Reading { value, received });
        }
    }

    /// The last reading, unless it is older than `stale_after`.
    pub fn get(&self, now: Instant, stale_after: Duration) -> Option<f64> {
        let latest = (*self.inner.lock().ok()?)?;
        if now.saturating_duration_since(latest.received) > stale_after {
            return None;
        }
        latest.value
    }

    pub fn handle_datagram(&self, src: SocketAddr, buf: &[u8], received: Instant) -> Result<()> {
        let report: SensorReport = serde_json::from_slice(buf)
            .with_context(|| format!("bad sensor report from {}", src))?;
        if let Some(error) = &report.error {
            tracing::warn!(%src, %error, "sensor reported an error");
        }
        tracing::debug!(%src, temperature = ?report.temperature, "sensor report");
        self.record(report.temperature, received);
        Ok(())
    }
}

pub async fn listen(bind_addr: String, latest: LatestReading) -> Result<()> {
    let socket = UdpSocket::bind(&bind_addr)
        .await
        .with_context(|| format!("binding sensor socket {}", bind_addr))?;
    tracing::info!(%bind_addr, "listening for sensor reports");

    let mut buf = [0; MAX_UDP];
    loop {
        let (sz, src) = socket.recv_from(&mut buf).await?;
        if let Err(e) = latest.handle_datagram(src, &buf[..sz], Instant::now()) {
            tracing::warn!(%src, error = %e, "dropping datagram");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> SocketAddr {
        "192.168.0.200:5000".parse().unwrap()
    }

    #[test]
    fn keeps_latest_fresh_reading() {
        let latest = LatestReading::default();
        let t0 = Instant::now();
        assert_eq!(latest.get(t0, Duration::from_secs(180)), None);

        latest.handle_datagram(src(), br#"{"temperature": 21.5}"#, t0).unwrap();
        assert_eq!(latest.get(t0 + Duration::from_secs(60), Duration::from_secs(180)), Some(21.5));
        assert_eq!(latest.get(t0 + Duration::from_secs(181), Duration::from_secs(180)), None);
    }

    #[test]
    fn error_report_clears_reading() {
        let latest = LatestReading::default();
        let t0 = Instant::now();
        latest.handle_datagram(src(), br#"{"temperature": 21.5}"#, t0).unwrap();
        latest.handle_datagram(src(), br#"{"error": "S_CHECKSUM"}"#, t0).unwrap();
        assert_eq!(latest.get(t0, Duration::from_secs(180)), None);
    }

    #[test]
    fn rejects_garbage() {
        let latest = LatestReading::default();
        assert!(latest.handle_datagram(src(), b"21.5C", Instant::now()).is_err());
    }
}
