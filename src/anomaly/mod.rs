//! Pattern detectors that run on top of the aggregated data.

pub mod burst;
pub mod repeating;

pub use burst::{BurstDetector, BurstInterval, WindowVerdict};
pub use repeating::{RepeatingDetector, RepeatingPattern};
