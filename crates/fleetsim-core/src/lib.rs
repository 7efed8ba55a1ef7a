//! fleetsim-core: shared domain types, configuration, and seed data.
//!
//! Every other fleetsim crate builds on these definitions:
//!
//! - [`types`]: servers, alerts, scaling events, failure scenarios, and
//!   the read-only views handed to external consumers
//! - [`config`]: `fleetsim.toml` parsing and the validated `EngineConfig`
//! - [`seed`]: the default analysis/operational fleet and per-role
//!   baseline metrics

pub mod config;
pub mod error;
pub mod seed;
pub mod types;

pub use config::{
    DriftConfig, EngineConfig, FleetConfig, PolicyUpdate, ScalingPolicy, ScenarioSettings,
    StatusThresholds, ThresholdPair,
};
pub use error::{ConfigError, ConfigResult};
pub use seed::SeedFleet;
pub use types::*;
