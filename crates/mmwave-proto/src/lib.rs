pub mod reading;

pub use reading::{DetectionStatus, Reading};
