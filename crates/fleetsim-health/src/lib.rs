//! fleetsim-health: server status classification.
//!
//! Evaluates CPU, memory, disk and response time against per-metric
//! warning/critical thresholds taken from configuration.
//!
//! ```text
//! tier(metric) = critical  if value > critical
//!              = warning   if value > warning
//!              = none      otherwise
//!
//! status = max(tier(cpu), tier(memory), tier(disk), tier(response_time))
//! ```
//!
//! The classifier holds no mutable state and is safe to call from any
//! thread without locking.

pub mod classifier;

pub use classifier::{Breach, StatusClassifier};
