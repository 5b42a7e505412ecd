use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use mmwave_driver::line::{is_serial_path, LineFactory};
use mmwave_driver::probe::probe_serial;
use mmwave_driver::sim::SimFactory;
use mmwave_driver::{DriverFactory, Verbosity};
use mmwave_proto::DetectionStatus;
use mmwave_sensor::{ComponentConfig, Mmwave, RadarParams, Resource, Sensor};

#[derive(Debug, Parser)]
#[command(name = "mmwave", version, about = "LD2410 mmWave presence sensor")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the config and the radar's serial port.
    Doctor,
    /// Validate the component config and list implicit dependencies.
    Validate,
    /// Poll readings from the radar.
    Read {
        #[arg(long)]
        count: Option<u32>,
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Print the readings map as JSON instead of a summary line.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    component: ComponentConfig,
    #[serde(default)]
    driver: DriverCfg,
    #[serde(default)]
    read: ReadCfg,
}

#[derive(Debug, Default, serde::Deserialize)]
struct DriverCfg {
    #[serde(default)]
    backend: Backend,
    device: Option<String>,
    baud: Option<u32>,
    settle_ms: Option<u64>,
    verbosity: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum Backend {
    #[default]
    Line,
    Sim,
}

#[derive(Debug, serde::Deserialize)]
struct ReadCfg {
    count: u32,
    interval_ms: u64,
}

impl Default for ReadCfg {
    fn default() -> Self {
        Self { count: 5, interval_ms: 1000 }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

impl DriverCfg {
    fn params(&self) -> Result<RadarParams> {
        let mut p = RadarParams::default();
        if let Some(dev) = &self.device { p.device = dev.clone(); }
        if let Some(baud) = self.baud { p.baud = baud; }
        if let Some(ms) = self.settle_ms { p.settle = Duration::from_millis(ms); }
        if let Some(v) = &self.verbosity {
            p.verbosity = v.parse::<Verbosity>().context("driver.verbosity")?;
        }
        Ok(p)
    }

    fn factory(&self) -> Arc<dyn DriverFactory> {
        match self.backend {
            Backend::Line => Arc::new(LineFactory),
            Backend::Sim => Arc::new(SimFactory::demo()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg).await?,
        Command::Validate => validate(&cfg)?,
        Command::Read { count, interval_ms, json } => {
            let count = count.unwrap_or(cfg.read.count);
            let interval = Duration::from_millis(interval_ms.unwrap_or(cfg.read.interval_ms));
            read(&cfg, count, interval, json).await?
        }
    }
    Ok(())
}

fn validate(cfg: &Config) -> Result<()> {
    let deps = Mmwave::validate_config(&cfg.component)?;
    println!("component={} model={}", cfg.component.name, cfg.component.model);
    println!("implicit_dependencies={:?}", deps);
    Ok(())
}

async fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    Mmwave::validate_config(&cfg.component)?;
    let p = cfg.driver.params()?;
    anyhow::ensure!(!p.device.is_empty(), "driver.device is empty");
    anyhow::ensure!(p.baud > 0, "driver.baud invalid");
    anyhow::ensure!(p.settle <= Duration::from_secs(10), "driver.settle_ms should be <= 10000");

    match cfg.driver.backend {
        Backend::Line if is_serial_path(&p.device) => {
            let r = probe_serial(&p.device, p.baud);
            println!("probe dev={} baud={} opened={} {}ms note={}", r.dev, r.baud, r.opened, r.elapsed_ms, r.note);
            if !r.opened {
                warn!("doctor: radar port not usable; readings will report Error");
            }
        }
        Backend::Line => {
            anyhow::ensure!(std::path::Path::new(&p.device).is_file(), "frame capture {} not found", p.device);
            info!("doctor: replaying capture {}", p.device);
        }
        Backend::Sim => info!("doctor: simulated radar, no device checks"),
    }

    info!("doctor: OK");
    Ok(())
}

async fn read(cfg: &Config, count: u32, interval: Duration, json: bool) -> Result<()> {
    Mmwave::validate_config(&cfg.component)?;
    let sensor = Mmwave::with_params(&cfg.component, cfg.driver.factory(), cfg.driver.params()?).await;
    if !sensor.is_ready().await {
        warn!("read: radar not ready, readings will report Error");
    }

    for i in 0..count {
        let readings = sensor.get_readings(None, None).await?;
        if json {
            println!("{}", serde_json::Value::Object(readings));
        } else {
            let r: mmwave_proto::Reading = serde_json::from_value(serde_json::Value::Object(readings))
                .context("decode readings")?;
            match r.detection_status {
                DetectionStatus::NoData | DetectionStatus::Error => println!("No valid data received."),
                _ => println!("{}", r.summary()),
            }
        }
        if i + 1 < count {
            tokio::time::sleep(interval).await;
        }
    }

    sensor.close().await;
    Ok(())
}
