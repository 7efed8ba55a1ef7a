//! Status classification.
//!
//! Maps a metric set to a discrete health status using ordered warning and
//! critical tiers per metric. Each metric is evaluated independently and
//! the most severe tier wins.

use tracing::trace;

use fleetsim_core::{
    AlertSeverity, MetricKind, ServerMetrics, ServerStatus, StatusThresholds,
};

/// A metric that is over one of its tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub metric: MetricKind,
    pub severity: AlertSeverity,
    pub value: f64,
    /// The threshold that was exceeded.
    pub threshold: f64,
}

impl Breach {
    /// Human-readable description for alert messages.
    pub fn describe(&self) -> String {
        let tier = match self.severity {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        };
        match self.metric {
            MetricKind::ResponseTime => format!(
                "response time {:.0}ms exceeds {tier} threshold {:.0}ms",
                self.value, self.threshold
            ),
            metric => format!(
                "{} usage {:.1}% exceeds {tier} threshold {:.1}%",
                metric_label(metric),
                self.value,
                self.threshold
            ),
        }
    }
}

fn metric_label(metric: MetricKind) -> &'static str {
    match metric {
        MetricKind::Cpu => "cpu",
        MetricKind::Memory => "memory",
        MetricKind::Disk => "disk",
        MetricKind::NetworkIn => "network in",
        MetricKind::NetworkOut => "network out",
        MetricKind::ResponseTime => "response time",
    }
}

/// Stateless classifier. Cheap to clone and safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct StatusClassifier {
    thresholds: StatusThresholds,
}

impl StatusClassifier {
    pub fn new(thresholds: StatusThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &StatusThresholds {
        &self.thresholds
    }

    /// Tier a single value falls into, or `None` when below warning.
    ///
    /// Thresholds are exclusive: a value equal to the critical threshold
    /// is only a warning.
    pub fn tier(&self, metric: MetricKind, value: f64) -> Option<AlertSeverity> {
        let pair = self.thresholds.for_metric(metric)?;
        if value > pair.critical {
            Some(AlertSeverity::Critical)
        } else if value > pair.warning {
            Some(AlertSeverity::Warning)
        } else {
            None
        }
    }

    /// Every classified metric that is over a tier.
    pub fn breaches(&self, metrics: &ServerMetrics) -> Vec<Breach> {
        StatusThresholds::CLASSIFIED
            .iter()
            .filter_map(|&metric| {
                let value = metrics.get(metric);
                let severity = self.tier(metric, value)?;
                let pair = self.thresholds.for_metric(metric)?;
                let threshold = match severity {
                    AlertSeverity::Warning => pair.warning,
                    AlertSeverity::Critical => pair.critical,
                };
                Some(Breach {
                    metric,
                    severity,
                    value,
                    threshold,
                })
            })
            .collect()
    }

    /// Most severe tier triggered by any single metric.
    pub fn classify(&self, metrics: &ServerMetrics) -> ServerStatus {
        let status = StatusThresholds::CLASSIFIED
            .iter()
            .filter_map(|&metric| self.tier(metric, metrics.get(metric)))
            .max()
            .map(ServerStatus::from)
            .unwrap_or(ServerStatus::Healthy);
        trace!(?status, cpu = metrics.cpu_usage, "classified");
        status
    }
}
