//! Domain types shared by every fleetsim crate.
//!
//! Servers, alerts, scaling events and failure scenarios. All types are
//! serializable so the engine's read views can be handed to exporters
//! and request layers as-is.

use serde::{Deserialize, Serialize};

/// Unique identifier for a simulated server.
pub type ServerId = String;

/// Unique identifier for an alert.
pub type AlertId = String;

/// Unique identifier for a failure scenario.
pub type ScenarioId = String;

// ── Server ────────────────────────────────────────────────────────

/// Where a simulated server pretends to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    OnPremise,
    Aws,
    Gcp,
    Kubernetes,
    Azure,
    Other,
}

/// Functional role of a server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ServerRole {
    Web,
    Api,
    Database,
    Cache,
    Storage,
    Gateway,
    Worker,
    LoadBalancer,
    Monitoring,
}

impl ServerRole {
    /// Short lowercase name used in generated hostnames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Api => "api",
            Self::Database => "db",
            Self::Cache => "cache",
            Self::Storage => "storage",
            Self::Gateway => "gw",
            Self::Worker => "worker",
            Self::LoadBalancer => "lb",
            Self::Monitoring => "mon",
        }
    }
}

/// Derived health status of a server.
///
/// Ordered by severity: `Healthy < Warning < Critical`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Healthy,
    Warning,
    Critical,
}

/// Which pool a server belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Analysis,
    Operational,
}

/// Resource metrics of one server at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMetrics {
    /// CPU usage in percent (0-100).
    pub cpu_usage: f64,
    /// Memory usage in percent (0-100).
    pub memory_usage: f64,
    /// Disk usage in percent (0-100).
    pub disk_usage: f64,
    /// Inbound network rate.
    pub network_in: f64,
    /// Outbound network rate.
    pub network_out: f64,
    /// Response time in milliseconds (>= 10).
    pub response_time_ms: f64,
    pub uptime_secs: u64,
}

impl ServerMetrics {
    /// Read a single metric by kind.
    pub fn get(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::Cpu => self.cpu_usage,
            MetricKind::Memory => self.memory_usage,
            MetricKind::Disk => self.disk_usage,
            MetricKind::NetworkIn => self.network_in,
            MetricKind::NetworkOut => self.network_out,
            MetricKind::ResponseTime => self.response_time_ms,
        }
    }

    /// Set a single metric, clamped to its domain.
    pub fn set(&mut self, metric: MetricKind, value: f64) {
        let value = metric.domain().clamp(value);
        match metric {
            MetricKind::Cpu => self.cpu_usage = value,
            MetricKind::Memory => self.memory_usage = value,
            MetricKind::Disk => self.disk_usage = value,
            MetricKind::NetworkIn => self.network_in = value,
            MetricKind::NetworkOut => self.network_out = value,
            MetricKind::ResponseTime => self.response_time_ms = value,
        }
    }

    /// Return a copy with every metric clamped to its domain.
    pub fn clamped(&self) -> Self {
        let mut out = self.clone();
        for metric in MetricKind::ALL {
            out.set(metric, self.get(metric));
        }
        out
    }
}

/// A metric that can be drifted, overridden by a scenario step, or
/// inspected by the classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
    NetworkIn,
    NetworkOut,
    ResponseTime,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Disk,
        MetricKind::NetworkIn,
        MetricKind::NetworkOut,
        MetricKind::ResponseTime,
    ];

    /// Valid value range for this metric.
    pub fn domain(&self) -> MetricDomain {
        match self {
            Self::Cpu | Self::Memory | Self::Disk => MetricDomain::PERCENT,
            Self::NetworkIn | Self::NetworkOut => MetricDomain::NETWORK,
            Self::ResponseTime => MetricDomain::RESPONSE_TIME,
        }
    }

    /// Alert kind raised for a breach of this metric.
    pub fn alert_kind(&self) -> AlertKind {
        match self {
            Self::Cpu => AlertKind::Cpu,
            Self::Memory => AlertKind::Memory,
            Self::Disk => AlertKind::Disk,
            Self::NetworkIn | Self::NetworkOut => AlertKind::Network,
            Self::ResponseTime => AlertKind::ResponseTime,
        }
    }
}

/// Closed value range of a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricDomain {
    pub min: f64,
    pub max: f64,
}

impl MetricDomain {
    pub const PERCENT: MetricDomain = MetricDomain { min: 0.0, max: 100.0 };
    pub const NETWORK: MetricDomain = MetricDomain { min: 0.0, max: 10_000.0 };
    pub const RESPONSE_TIME: MetricDomain = MetricDomain { min: 10.0, max: 60_000.0 };

    /// Clamp `value` into the domain. NaN collapses to the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// Static description used to seed a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSpec {
    pub id: ServerId,
    pub hostname: String,
    pub environment: Environment,
    pub role: ServerRole,
    pub metrics: ServerMetrics,
}

/// One simulated machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEntity {
    pub id: ServerId,
    pub hostname: String,
    pub environment: Environment,
    pub role: ServerRole,
    /// Always the classifier output for `metrics`.
    pub status: ServerStatus,
    pub metrics: ServerMetrics,
    /// Active alerts in chronological order.
    pub alerts: Vec<Alert>,
    /// Unix timestamp (milliseconds) of the last metric update.
    pub last_updated: u64,
}

impl ServerEntity {
    /// Unresolved alerts of the given kind.
    pub fn open_alerts(&self, kind: AlertKind) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(move |a| a.kind == kind && !a.resolved)
    }
}

// ── Alerts ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Cpu,
    Memory,
    Disk,
    Network,
    ResponseTime,
}

/// Alert severity. `Warning < Critical`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl From<AlertSeverity> for ServerStatus {
    fn from(severity: AlertSeverity) -> Self {
        match severity {
            AlertSeverity::Warning => ServerStatus::Warning,
            AlertSeverity::Critical => ServerStatus::Critical,
        }
    }
}

/// What raised an alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "scenario", rename_all = "snake_case")]
pub enum AlertOrigin {
    /// Raised by classification when a metric crossed a threshold.
    Threshold,
    /// Raised by a failure scenario step.
    Scenario(ScenarioId),
}

/// Kind, severity and message of an alert before it is attached to a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertTemplate {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

/// One detected condition on a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: AlertId,
    /// Back-reference to the owning server.
    pub server_id: ServerId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub origin: AlertOrigin,
    /// Unix timestamp (milliseconds).
    pub created_at: u64,
    pub resolved: bool,
}

// ── Scaling ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScalingEventType {
    ScaleOut,
    ScaleIn,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScalingTrigger {
    Auto,
    Manual,
}

/// Operational pool metrics captured when a scaling decision was made.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub critical_count: usize,
}

/// Audit record of an operational pool size change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: ScalingEventType,
    /// Unix timestamp (milliseconds).
    pub timestamp: u64,
    pub trigger: ScalingTrigger,
    pub count_before: usize,
    pub count_after: usize,
    pub reason: String,
    pub metrics_snapshot: MetricsSnapshot,
}

// ── Scenarios ─────────────────────────────────────────────────────

/// One delayed mutation of a failure scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioStep {
    /// Offset from scenario activation, in milliseconds.
    pub delay_ms: u64,
    pub target_server_id: ServerId,
    pub metric: MetricKind,
    /// Fixed value the metric is set to when the step fires.
    pub new_value: f64,
    pub alert: AlertTemplate,
}

/// A declarative multi-step failure injection template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureScenario {
    pub id: ScenarioId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Activation chance per tick (0.0-1.0).
    pub probability: f64,
    pub steps: Vec<ScenarioStep>,
}

impl FailureScenario {
    /// Delay of the last step, i.e. how long the stepping phase lasts.
    pub fn duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.delay_ms).max().unwrap_or(0)
    }
}

// ── Views ─────────────────────────────────────────────────────────

/// Summary statistics over one pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PoolSummary {
    pub total_servers: usize,
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub avg_disk: f64,
    pub avg_response_time_ms: f64,
    pub open_alerts: usize,
}

impl PoolSummary {
    /// Aggregate a set of servers. An empty set yields all-zero averages.
    pub fn from_servers(servers: &[ServerEntity]) -> Self {
        let total = servers.len();
        if total == 0 {
            return Self::default();
        }
        let n = total as f64;
        let mut summary = Self {
            total_servers: total,
            ..Self::default()
        };
        for s in servers {
            match s.status {
                ServerStatus::Healthy => summary.healthy += 1,
                ServerStatus::Warning => summary.warning += 1,
                ServerStatus::Critical => summary.critical += 1,
            }
            summary.avg_cpu += s.metrics.cpu_usage;
            summary.avg_memory += s.metrics.memory_usage;
            summary.avg_disk += s.metrics.disk_usage;
            summary.avg_response_time_ms += s.metrics.response_time_ms;
            summary.open_alerts += s.alerts.iter().filter(|a| !a.resolved).count();
        }
        summary.avg_cpu /= n;
        summary.avg_memory /= n;
        summary.avg_disk /= n;
        summary.avg_response_time_ms /= n;
        summary
    }
}

/// Simulation run metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub running: bool,
    /// Unix timestamp (milliseconds) of the last `start`.
    pub started_at: Option<u64>,
    pub tick: u64,
    pub active_scenarios: Vec<ScenarioId>,
}

/// Read-only copy of both pools plus run metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetView {
    pub analysis: Vec<ServerEntity>,
    pub operational: Vec<ServerEntity>,
    pub run: RunMetadata,
}

/// The structure external consumers (exporters, request layers) read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedFleetView {
    pub analysis_targets: Vec<ServerEntity>,
    pub operational_summary: PoolSummary,
    /// Most recent first.
    pub recent_scaling_events: Vec<ScalingEvent>,
    /// Unix timestamp (milliseconds).
    pub timestamp: u64,
}

/// Current Unix time in milliseconds.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(cpu: f64) -> ServerMetrics {
        ServerMetrics {
            cpu_usage: cpu,
            memory_usage: 40.0,
            disk_usage: 30.0,
            network_in: 100.0,
            network_out: 80.0,
            response_time_ms: 120.0,
            uptime_secs: 0,
        }
    }

    fn entity(id: &str, cpu: f64, status: ServerStatus) -> ServerEntity {
        ServerEntity {
            id: id.to_string(),
            hostname: id.to_string(),
            environment: Environment::Aws,
            role: ServerRole::Web,
            status,
            metrics: metrics(cpu),
            alerts: Vec::new(),
            last_updated: 0,
        }
    }

    #[test]
    fn set_clamps_to_domain() {
        let mut m = metrics(50.0);
        m.set(MetricKind::Cpu, 140.0);
        m.set(MetricKind::Disk, -3.0);
        m.set(MetricKind::ResponseTime, 1.0);
        assert_eq!(m.cpu_usage, 100.0);
        assert_eq!(m.disk_usage, 0.0);
        assert_eq!(m.response_time_ms, 10.0);
    }

    #[test]
    fn nan_clamps_to_lower_bound() {
        assert_eq!(MetricDomain::RESPONSE_TIME.clamp(f64::NAN), 10.0);
    }

    #[test]
    fn status_orders_by_severity() {
        assert!(ServerStatus::Critical > ServerStatus::Warning);
        assert!(ServerStatus::Warning > ServerStatus::Healthy);
        assert!(AlertSeverity::Critical > AlertSeverity::Warning);
    }

    #[test]
    fn pool_summary_of_empty_pool_is_zero() {
        let summary = PoolSummary::from_servers(&[]);
        assert_eq!(summary.total_servers, 0);
        assert_eq!(summary.avg_cpu, 0.0);
    }

    #[test]
    fn pool_summary_averages_and_counts() {
        let servers = vec![
            entity("a", 20.0, ServerStatus::Healthy),
            entity("b", 60.0, ServerStatus::Warning),
            entity("c", 100.0, ServerStatus::Critical),
        ];
        let summary = PoolSummary::from_servers(&servers);
        assert_eq!(summary.total_servers, 3);
        assert_eq!(summary.healthy, 1);
        assert_eq!(summary.warning, 1);
        assert_eq!(summary.critical, 1);
        assert!((summary.avg_cpu - 60.0).abs() < 1e-9);
    }

    #[test]
    fn scaling_event_serializes_type_field() {
        let event = ScalingEvent {
            id: "scale-1".to_string(),
            event_type: ScalingEventType::ScaleOut,
            timestamp: 1,
            trigger: ScalingTrigger::Auto,
            count_before: 8,
            count_after: 10,
            reason: "cpu".to_string(),
            metrics_snapshot: MetricsSnapshot {
                avg_cpu: 85.0,
                avg_memory: 85.0,
                critical_count: 0,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scale_out");
        assert_eq!(json["trigger"], "auto");
    }

    #[test]
    fn scenario_duration_is_last_delay() {
        let scenario = FailureScenario {
            id: "s".to_string(),
            name: "s".to_string(),
            description: String::new(),
            probability: 0.0,
            steps: vec![
                ScenarioStep {
                    delay_ms: 0,
                    target_server_id: "a".to_string(),
                    metric: MetricKind::Disk,
                    new_value: 95.0,
                    alert: AlertTemplate {
                        kind: AlertKind::Disk,
                        severity: AlertSeverity::Critical,
                        message: "disk".to_string(),
                    },
                },
                ScenarioStep {
                    delay_ms: 4000,
                    target_server_id: "a".to_string(),
                    metric: MetricKind::ResponseTime,
                    new_value: 5000.0,
                    alert: AlertTemplate {
                        kind: AlertKind::ResponseTime,
                        severity: AlertSeverity::Warning,
                        message: "slow".to_string(),
                    },
                },
            ],
        };
        assert_eq!(scenario.duration_ms(), 4000);
    }
}
