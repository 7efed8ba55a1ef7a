//! fleetsim-metrics: synthetic metric generation.
//!
//! Produces plausible next-tick values for CPU, memory, disk, network and
//! response time as a clamped random walk:
//!
//! ```text
//! next = clamp(previous + uniform(-drift, +drift), domain)
//! ```
//!
//! Default drift ranges: CPU ±5, memory ±3, disk ±2, network ±15–20,
//! response time ±50 ms. The random source is always injected.

pub mod generator;

pub use generator::{GeneratorError, MetricGenerator, next_value};
