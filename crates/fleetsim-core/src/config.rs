//! fleetsim.toml configuration parser and validated engine settings.
//!
//! `FleetConfig` mirrors the file layout (every field optional, durations
//! as strings such as `"5s"` or `"5m"`). `FleetConfig::resolve` layers the
//! file over the defaults and validates the result into an `EngineConfig`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::seed::SeedFleet;
use crate::types::{FailureScenario, MetricKind};

// ── Status thresholds ─────────────────────────────────────────────

/// Warning and critical tier for one metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdPair {
    pub warning: f64,
    pub critical: f64,
}

impl ThresholdPair {
    pub const fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    fn validate(&self, metric: &'static str, percent: bool) -> ConfigResult<()> {
        for value in [self.warning, self.critical] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidNumber {
                    field: metric,
                    value,
                });
            }
            if percent && value > 100.0 {
                return Err(ConfigError::PercentOutOfRange {
                    field: metric,
                    value,
                });
            }
        }
        if self.warning >= self.critical {
            return Err(ConfigError::ThresholdOrder {
                metric,
                warning: self.warning,
                critical: self.critical,
            });
        }
        Ok(())
    }
}

/// Per-metric thresholds used by the status classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusThresholds {
    pub cpu: ThresholdPair,
    pub memory: ThresholdPair,
    pub disk: ThresholdPair,
    /// Milliseconds.
    pub response_time: ThresholdPair,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            cpu: ThresholdPair::new(70.0, 90.0),
            memory: ThresholdPair::new(80.0, 90.0),
            disk: ThresholdPair::new(85.0, 95.0),
            response_time: ThresholdPair::new(1000.0, 3000.0),
        }
    }
}

impl StatusThresholds {
    /// Metrics that take part in status classification.
    pub const CLASSIFIED: [MetricKind; 4] = [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Disk,
        MetricKind::ResponseTime,
    ];

    /// Thresholds for a metric, or `None` for metrics that are never
    /// classified (network rates).
    pub fn for_metric(&self, metric: MetricKind) -> Option<ThresholdPair> {
        match metric {
            MetricKind::Cpu => Some(self.cpu),
            MetricKind::Memory => Some(self.memory),
            MetricKind::Disk => Some(self.disk),
            MetricKind::ResponseTime => Some(self.response_time),
            MetricKind::NetworkIn | MetricKind::NetworkOut => None,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.cpu.validate("cpu", true)?;
        self.memory.validate("memory", true)?;
        self.disk.validate("disk", true)?;
        self.response_time.validate("response_time", false)?;
        Ok(())
    }
}

// ── Metric drift ──────────────────────────────────────────────────

/// Maximum per-tick random-walk step for each metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriftConfig {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub network_in: f64,
    pub network_out: f64,
    /// Milliseconds.
    pub response_time: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            cpu: 5.0,
            memory: 3.0,
            disk: 2.0,
            network_in: 20.0,
            network_out: 15.0,
            response_time: 50.0,
        }
    }
}

impl DriftConfig {
    pub fn for_metric(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::Cpu => self.cpu,
            MetricKind::Memory => self.memory,
            MetricKind::Disk => self.disk,
            MetricKind::NetworkIn => self.network_in,
            MetricKind::NetworkOut => self.network_out,
            MetricKind::ResponseTime => self.response_time,
        }
    }

    /// Each drift must be finite, non-negative and no wider than the
    /// metric's own range.
    pub fn validate(&self) -> ConfigResult<()> {
        let fields = [
            ("drift.cpu", MetricKind::Cpu),
            ("drift.memory", MetricKind::Memory),
            ("drift.disk", MetricKind::Disk),
            ("drift.network_in", MetricKind::NetworkIn),
            ("drift.network_out", MetricKind::NetworkOut),
            ("drift.response_time", MetricKind::ResponseTime),
        ];
        for (field, metric) in fields {
            let value = self.for_metric(metric);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidNumber { field, value });
            }
            let max = metric.domain().width();
            if value > max {
                return Err(ConfigError::DriftTooWide { field, value, max });
            }
        }
        Ok(())
    }
}

// ── Scaling policy ────────────────────────────────────────────────

/// Live autoscaling policy for the operational pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingPolicy {
    /// Average CPU or memory (percent) above which the pool grows.
    pub scale_out_threshold: f64,
    /// Average CPU and memory (percent) below which the pool shrinks.
    pub scale_in_threshold: f64,
    pub min_servers: usize,
    pub max_servers: usize,
    /// Servers added per scale-out.
    pub step_size: usize,
    /// Minimum time between two accepted scaling actions.
    pub cooldown_ms: u64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            scale_out_threshold: 80.0,
            scale_in_threshold: 30.0,
            min_servers: 3,
            max_servers: 30,
            step_size: 2,
            cooldown_ms: 5 * 60 * 1000,
        }
    }
}

impl ScalingPolicy {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("scale_out_threshold", self.scale_out_threshold),
            ("scale_in_threshold", self.scale_in_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::PercentOutOfRange { field, value });
            }
        }
        if self.scale_in_threshold >= self.scale_out_threshold {
            return Err(ConfigError::ScalingThresholdOrder {
                scale_in: self.scale_in_threshold,
                scale_out: self.scale_out_threshold,
            });
        }
        if self.min_servers > self.max_servers {
            return Err(ConfigError::ServerBounds {
                min: self.min_servers,
                max: self.max_servers,
            });
        }
        if self.max_servers == 0 {
            return Err(ConfigError::Zero {
                field: "max_servers",
            });
        }
        if self.step_size == 0 {
            return Err(ConfigError::Zero { field: "step_size" });
        }
        Ok(())
    }

    /// Merge `update` over this policy and validate the result.
    ///
    /// On error `self` is untouched, so the caller keeps the previous
    /// valid policy.
    pub fn merged(&self, update: &PolicyUpdate) -> ConfigResult<ScalingPolicy> {
        let merged = ScalingPolicy {
            scale_out_threshold: update
                .scale_out_threshold
                .unwrap_or(self.scale_out_threshold),
            scale_in_threshold: update
                .scale_in_threshold
                .unwrap_or(self.scale_in_threshold),
            min_servers: update.min_servers.unwrap_or(self.min_servers),
            max_servers: update.max_servers.unwrap_or(self.max_servers),
            step_size: update.step_size.unwrap_or(self.step_size),
            cooldown_ms: update.cooldown_ms.unwrap_or(self.cooldown_ms),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial scaling policy. Unset fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyUpdate {
    pub scale_out_threshold: Option<f64>,
    pub scale_in_threshold: Option<f64>,
    pub min_servers: Option<usize>,
    pub max_servers: Option<usize>,
    pub step_size: Option<usize>,
    pub cooldown_ms: Option<u64>,
}

// ── Scenarios ─────────────────────────────────────────────────────

/// Failure injection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSettings {
    pub enabled: bool,
    /// How long a scenario stays active after its last step.
    pub settle_window: Duration,
    /// Per-scenario activation probability overrides.
    pub probabilities: BTreeMap<String, f64>,
    /// Replaces the built-in scenario library when set.
    pub library: Option<Vec<FailureScenario>>,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_window: Duration::from_secs(10),
            probabilities: BTreeMap::new(),
            library: None,
        }
    }
}

// ── Engine config ─────────────────────────────────────────────────

/// Fully resolved, validated engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Period of the simulation tick.
    pub tick_interval: Duration,
    /// Period of the scaling policy evaluation.
    pub policy_interval: Duration,
    /// Seed for the injected random source; entropy when `None`.
    pub seed: Option<u64>,
    pub scaling: ScalingPolicy,
    pub thresholds: StatusThresholds,
    pub drift: DriftConfig,
    pub scenarios: ScenarioSettings,
    /// Scaling events retained in the log.
    pub history_capacity: usize,
    /// Scaling events included in the aggregated view.
    pub recent_events_limit: usize,
    pub fleet: SeedFleet,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            policy_interval: Duration::from_secs(30),
            seed: None,
            scaling: ScalingPolicy::default(),
            thresholds: StatusThresholds::default(),
            drift: DriftConfig::default(),
            scenarios: ScenarioSettings::default(),
            history_capacity: 100,
            recent_events_limit: 10,
            fleet: SeedFleet::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "tick_interval",
            });
        }
        if self.policy_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "policy_interval",
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "history_capacity",
            });
        }
        self.scaling.validate()?;
        let count = self.fleet.operational.len();
        if count < self.scaling.min_servers || count > self.scaling.max_servers {
            return Err(ConfigError::SeedOutOfBounds {
                count,
                min: self.scaling.min_servers,
                max: self.scaling.max_servers,
            });
        }
        self.thresholds.validate()?;
        self.drift.validate()?;
        for (scenario, &value) in &self.scenarios.probabilities {
            validate_probability(scenario, value)?;
        }
        Ok(())
    }
}

/// Reject activation probabilities outside `0.0..=1.0`.
pub fn validate_probability(scenario: &str, value: f64) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Probability {
            scenario: scenario.to_string(),
            value,
        });
    }
    Ok(())
}

// ── File format ───────────────────────────────────────────────────

/// On-disk `fleetsim.toml` layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    pub simulation: Option<SimulationSection>,
    pub scaling: Option<ScalingSection>,
    pub thresholds: Option<StatusThresholds>,
    pub drift: Option<DriftConfig>,
    pub scenarios: Option<ScenariosSection>,
    pub fleet: Option<SeedFleet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationSection {
    pub tick_interval: Option<String>,
    pub policy_interval: Option<String>,
    pub seed: Option<u64>,
    pub history_capacity: Option<usize>,
    pub recent_events: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalingSection {
    pub scale_out_threshold: Option<f64>,
    pub scale_in_threshold: Option<f64>,
    pub min_servers: Option<usize>,
    pub max_servers: Option<usize>,
    pub step_size: Option<usize>,
    pub cooldown: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenariosSection {
    pub enabled: Option<bool>,
    pub settle_window: Option<String>,
    pub probabilities: Option<BTreeMap<String, f64>>,
    pub library: Option<Vec<FailureScenario>>,
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The default settings in file form (seed fleet omitted).
    pub fn defaults() -> Self {
        let engine = EngineConfig::default();
        FleetConfig {
            simulation: Some(SimulationSection {
                tick_interval: Some(format_duration(engine.tick_interval)),
                policy_interval: Some(format_duration(engine.policy_interval)),
                seed: None,
                history_capacity: Some(engine.history_capacity),
                recent_events: Some(engine.recent_events_limit),
            }),
            scaling: Some(ScalingSection {
                scale_out_threshold: Some(engine.scaling.scale_out_threshold),
                scale_in_threshold: Some(engine.scaling.scale_in_threshold),
                min_servers: Some(engine.scaling.min_servers),
                max_servers: Some(engine.scaling.max_servers),
                step_size: Some(engine.scaling.step_size),
                cooldown: Some(format_duration(engine.scaling.cooldown())),
            }),
            thresholds: Some(engine.thresholds),
            drift: Some(engine.drift),
            scenarios: Some(ScenariosSection {
                enabled: Some(engine.scenarios.enabled),
                settle_window: Some(format_duration(engine.scenarios.settle_window)),
                probabilities: None,
                library: None,
            }),
            fleet: None,
        }
    }

    /// Layer this file over the defaults and validate the result.
    pub fn resolve(&self) -> ConfigResult<EngineConfig> {
        let mut config = EngineConfig::default();

        if let Some(sim) = &self.simulation {
            if let Some(s) = &sim.tick_interval {
                config.tick_interval = parse_duration(s)?;
            }
            if let Some(s) = &sim.policy_interval {
                config.policy_interval = parse_duration(s)?;
            }
            config.seed = sim.seed.or(config.seed);
            if let Some(n) = sim.history_capacity {
                config.history_capacity = n;
            }
            if let Some(n) = sim.recent_events {
                config.recent_events_limit = n;
            }
        }

        if let Some(scaling) = &self.scaling {
            let update = PolicyUpdate {
                scale_out_threshold: scaling.scale_out_threshold,
                scale_in_threshold: scaling.scale_in_threshold,
                min_servers: scaling.min_servers,
                max_servers: scaling.max_servers,
                step_size: scaling.step_size,
                cooldown_ms: match &scaling.cooldown {
                    Some(s) => Some(parse_duration(s)?.as_millis() as u64),
                    None => None,
                },
            };
            config.scaling = config.scaling.merged(&update)?;
        }

        if let Some(thresholds) = &self.thresholds {
            config.thresholds = thresholds.clone();
        }
        if let Some(drift) = &self.drift {
            config.drift = drift.clone();
        }

        if let Some(scenarios) = &self.scenarios {
            if let Some(enabled) = scenarios.enabled {
                config.scenarios.enabled = enabled;
            }
            if let Some(s) = &scenarios.settle_window {
                config.scenarios.settle_window = parse_duration(s)?;
            }
            if let Some(p) = &scenarios.probabilities {
                config.scenarios.probabilities = p.clone();
            }
            config.scenarios.library = scenarios.library.clone();
        }

        if let Some(fleet) = &self.fleet {
            config.fleet = fleet.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

/// Parse a duration string such as `"250ms"`, `"5s"`, `"5m"` or `"1h"`.
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::Duration(s.to_string());
    let (digits, unit_ms) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else {
        (s, 1000)
    };
    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    value
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

/// Render a duration in the largest unit that represents it exactly.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms == 0 {
        "0s".to_string()
    } else if ms % 3_600_000 == 0 {
        format!("{}h", ms / 3_600_000)
    } else if ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn format_duration_round_trips_units() {
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn threshold_order_is_enforced() {
        let mut thresholds = StatusThresholds::default();
        thresholds.cpu = ThresholdPair::new(90.0, 90.0);
        assert!(matches!(
            thresholds.validate(),
            Err(ConfigError::ThresholdOrder { metric: "cpu", .. })
        ));
    }

    #[test]
    fn percent_thresholds_must_stay_in_range() {
        let mut thresholds = StatusThresholds::default();
        thresholds.disk = ThresholdPair::new(90.0, 120.0);
        assert!(matches!(
            thresholds.validate(),
            Err(ConfigError::PercentOutOfRange { .. })
        ));
    }

    #[test]
    fn merged_policy_keeps_unset_fields() {
        let policy = ScalingPolicy::default();
        let merged = policy
            .merged(&PolicyUpdate {
                max_servers: Some(12),
                ..PolicyUpdate::default()
            })
            .unwrap();
        assert_eq!(merged.max_servers, 12);
        assert_eq!(merged.min_servers, policy.min_servers);
        assert_eq!(merged.cooldown_ms, policy.cooldown_ms);
    }

    #[test]
    fn merged_policy_rejects_min_above_max() {
        let policy = ScalingPolicy::default();
        let err = policy
            .merged(&PolicyUpdate {
                min_servers: Some(40),
                ..PolicyUpdate::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::ServerBounds { min: 40, max: 30 }));
    }

    #[test]
    fn merged_policy_rejects_inverted_thresholds() {
        let policy = ScalingPolicy::default();
        assert!(policy
            .merged(&PolicyUpdate {
                scale_in_threshold: Some(85.0),
                ..PolicyUpdate::default()
            })
            .is_err());
    }

    #[test]
    fn resolve_layers_file_over_defaults() {
        let config = FleetConfig::parse(
            r#"
[simulation]
tick_interval = "1s"
seed = 42

[scaling]
scale_out_threshold = 70.0
cooldown = "2m"

[thresholds.cpu]
warning = 60.0
critical = 85.0

[scenarios]
settle_window = "20s"
probabilities = { "disk-full-cascade" = 0.5 }
"#,
        )
        .unwrap()
        .resolve()
        .unwrap();

        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.policy_interval, Duration::from_secs(30));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.scaling.scale_out_threshold, 70.0);
        assert_eq!(config.scaling.cooldown_ms, 120_000);
        assert_eq!(config.scaling.min_servers, 3);
        assert_eq!(config.thresholds.cpu, ThresholdPair::new(60.0, 85.0));
        assert_eq!(config.thresholds.memory, StatusThresholds::default().memory);
        assert_eq!(config.scenarios.settle_window, Duration::from_secs(20));
        assert_eq!(config.scenarios.probabilities["disk-full-cascade"], 0.5);
    }

    #[test]
    fn resolve_rejects_bad_probability() {
        let err = FleetConfig::parse(
            r#"
[scenarios]
probabilities = { "cpu-spike" = 1.5 }
"#,
        )
        .unwrap()
        .resolve()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Probability { .. }));
    }

    #[test]
    fn seed_fleet_must_fit_scaling_bounds() {
        let mut config = EngineConfig::default();
        config.scaling.min_servers = 8;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SeedOutOfBounds { count: 5, min: 8, .. })
        ));

        let mut config = EngineConfig::default();
        config.scaling.max_servers = 4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SeedOutOfBounds { count: 5, max: 4, .. })
        ));
    }

    #[test]
    fn drift_wider_than_metric_range_is_rejected() {
        let drift = DriftConfig {
            cpu: f64::MAX,
            ..DriftConfig::default()
        };
        assert!(matches!(
            drift.validate(),
            Err(ConfigError::DriftTooWide { field: "drift.cpu", .. })
        ));

        let drift = DriftConfig {
            response_time: 60_000.0,
            ..DriftConfig::default()
        };
        assert!(matches!(
            drift.validate(),
            Err(ConfigError::DriftTooWide { field: "drift.response_time", .. })
        ));

        let drift = DriftConfig {
            cpu: 100.0,
            ..DriftConfig::default()
        };
        drift.validate().unwrap();
    }

    #[test]
    fn resolve_rejects_zero_tick_interval() {
        let err = FleetConfig::parse("[simulation]\ntick_interval = \"0s\"\n")
            .unwrap()
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Zero { field: "tick_interval" }));
    }

    #[test]
    fn defaults_render_and_parse_back() {
        let rendered = FleetConfig::defaults().to_toml_string().unwrap();
        assert!(rendered.contains("tick_interval = \"5s\""));
        let resolved = FleetConfig::parse(&rendered).unwrap().resolve().unwrap();
        assert_eq!(resolved, EngineConfig::default());
    }
}
