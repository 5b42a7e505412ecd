use std::time::Instant;

use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub dev: String,
    pub baud: u32,
    pub opened: bool,
    pub elapsed_ms: u64,
    pub note: String,
}

/// Opens the port once and releases it straight away. Says nothing about
/// whether a radar is on the other end, only that the port is usable.
pub fn probe_serial(dev: &str, baud: u32) -> ProbeResult {
    let start = Instant::now();
    let (opened, note) = match tokio_serial::new(dev, baud).open_native_async() {
        Ok(port) => {
            drop(port);
            info!("ld2410 probe: {} @ {} opened", dev, baud);
            (true, "opened".to_string())
        }
        Err(e) => {
            warn!("ld2410 probe failed dev={} baud={} err={}", dev, baud, e);
            (false, format!("open failed: {}", e))
        }
    };
    ProbeResult {
        dev: dev.to_string(),
        baud,
        opened,
        elapsed_ms: start.elapsed().as_millis() as u64,
        note,
    }
}
