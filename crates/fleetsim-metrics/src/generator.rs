//! Metric generator: bounded random walk over server metrics.
//!
//! Every function takes the random source as a parameter so callers can
//! inject a seeded `StdRng` and get reproducible drift.

use rand::Rng;
use thiserror::Error;

use fleetsim_core::{DriftConfig, MetricDomain, MetricKind, ServerMetrics, ServerRole};
use fleetsim_core::seed::baseline_metrics;

/// A previous metric set could not be advanced.
#[derive(Debug, Error, PartialEq)]
pub enum GeneratorError {
    #[error("metric {metric:?} has non-finite value {value}")]
    NonFinite { metric: MetricKind, value: f64 },
}

/// Next value of a bounded random walk.
///
/// Draws a step uniformly from `[-drift, +drift]` and clamps the result
/// to `domain`. A zero drift returns the clamped previous value; a drift
/// wider than the domain is capped at its width.
pub fn next_value<R: Rng + ?Sized>(
    previous: f64,
    drift: f64,
    domain: MetricDomain,
    rng: &mut R,
) -> f64 {
    let drift = if drift.is_finite() {
        drift.min(domain.width())
    } else {
        0.0
    };
    let step = if drift > 0.0 {
        rng.gen_range(-drift..=drift)
    } else {
        0.0
    };
    domain.clamp(previous + step)
}

/// Produces next-tick metric sets from configured drift ranges.
#[derive(Debug, Clone, Default)]
pub struct MetricGenerator {
    drift: DriftConfig,
}

impl MetricGenerator {
    pub fn new(drift: DriftConfig) -> Self {
        Self { drift }
    }

    pub fn drift(&self) -> &DriftConfig {
        &self.drift
    }

    /// Advance every metric by one tick and add `elapsed_secs` of uptime.
    pub fn next_metrics<R: Rng + ?Sized>(
        &self,
        previous: &ServerMetrics,
        elapsed_secs: u64,
        rng: &mut R,
    ) -> Result<ServerMetrics, GeneratorError> {
        for metric in MetricKind::ALL {
            let value = previous.get(metric);
            if !value.is_finite() {
                return Err(GeneratorError::NonFinite { metric, value });
            }
        }

        let mut next = previous.clone();
        for metric in MetricKind::ALL {
            let value = next_value(
                previous.get(metric),
                self.drift.for_metric(metric),
                metric.domain(),
                rng,
            );
            next.set(metric, value);
        }
        next.uptime_secs = previous.uptime_secs.saturating_add(elapsed_secs);
        Ok(next)
    }

    /// Fresh metrics for a newly provisioned server: the role baseline
    /// with a little jitter, zero uptime.
    pub fn initial_metrics<R: Rng + ?Sized>(&self, role: ServerRole, rng: &mut R) -> ServerMetrics {
        let base = baseline_metrics(role);
        let mut out = base.clone();
        for metric in MetricKind::ALL {
            let jitter = self.drift.for_metric(metric) * 2.0;
            out.set(metric, next_value(base.get(metric), jitter, metric.domain(), rng));
        }
        out.uptime_secs = 0;
        out
    }
}
