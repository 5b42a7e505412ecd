//! Device-driver contract for the LD2410 radar.
//!
//! The UART protocol lives in the vendor driver. This crate only fixes the
//! shape the sensor adapter talks to, plus two backends that never touch the
//! radar's wire protocol: `line` (pre-decoded frames as text) and `sim`.

pub mod line;
pub mod probe;
pub mod sim;
mod verbosity;

use anyhow::Result;

pub use verbosity::Verbosity;

/// Serial device the radar is wired to on the reference build.
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

/// LD2410 factory baud rate.
pub const DEFAULT_BAUD: u32 = 256_000;

/// One decoded frame. Standard mode yields six values:
/// `(type, moving_dist, moving_energy, static_dist, static_energy, overall_dist)`.
pub type RawFrame = Vec<i64>;

pub trait RadarDriver: Send {
    /// Begin background polling.
    fn start(&mut self) -> Result<()>;

    /// Halt polling and release the port. Safe to call more than once.
    fn stop(&mut self) -> Result<()>;

    /// Latest decoded frame(s), or None when nothing is ready. Never blocks.
    fn get_data(&self) -> Option<Vec<RawFrame>>;
}

pub trait DriverFactory: Send + Sync {
    fn open(&self, path: &str, baud: u32, verbosity: Verbosity) -> Result<Box<dyn RadarDriver>>;
}
