//! Autoscaler: threshold-driven sizing of the operational pool.
//!
//! Aggregates the operational pool, applies the scale-out / scale-in rule
//! and executes the result through the fleet store. Every executed
//! decision is recorded as a `ScalingEvent` and restarts the cooldown.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use fleetsim_core::{
    ConfigResult, Environment, MetricsSnapshot, PolicyUpdate, ScalingEvent, ScalingEventType,
    ScalingPolicy, ScalingTrigger, ServerEntity, ServerRole, ServerSpec, ServerStatus,
};
use fleetsim_metrics::MetricGenerator;
use fleetsim_state::{FleetStore, StateResult};

/// Roles new operational servers are drawn from.
pub const OPTIMAL_ROLES: [ServerRole; 4] = [
    ServerRole::Web,
    ServerRole::Api,
    ServerRole::Worker,
    ServerRole::Cache,
];

/// Share of critical servers above which the pool grows regardless of load.
const CRITICAL_SHARE: f64 = 0.2;

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    ScaleOut { target: usize },
    ScaleIn { target: usize },
    Maintain,
}

/// Load aggregate of the operational pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolAggregate {
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub critical_count: usize,
    pub total_servers: usize,
}

impl PoolAggregate {
    /// `None` for an empty pool.
    pub fn from_servers(servers: &[ServerEntity]) -> Option<Self> {
        if servers.is_empty() {
            return None;
        }
        let n = servers.len() as f64;
        Some(Self {
            avg_cpu: servers.iter().map(|s| s.metrics.cpu_usage).sum::<f64>() / n,
            avg_memory: servers.iter().map(|s| s.metrics.memory_usage).sum::<f64>() / n,
            critical_count: servers
                .iter()
                .filter(|s| s.status == ServerStatus::Critical)
                .count(),
            total_servers: servers.len(),
        })
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            avg_cpu: self.avg_cpu,
            avg_memory: self.avg_memory,
            critical_count: self.critical_count,
        }
    }

    fn critical_share_exceeded(&self) -> bool {
        self.critical_count as f64 > CRITICAL_SHARE * self.total_servers as f64
    }
}

struct ScaleRequest {
    target: usize,
    trigger: ScalingTrigger,
    reason: String,
}

/// Decides and executes operational pool size changes.
#[derive(Debug, Clone)]
pub struct Autoscaler {
    policy: ScalingPolicy,
    /// Epoch millis of the last executed scaling action.
    last_action_ms: Option<u64>,
    next_server_seq: u64,
}

impl Autoscaler {
    pub fn new(policy: ScalingPolicy) -> Self {
        Self {
            policy,
            last_action_ms: None,
            next_server_seq: 0,
        }
    }

    pub fn policy(&self) -> &ScalingPolicy {
        &self.policy
    }

    /// Merge `update` into the live policy. An invalid result is rejected
    /// and the current policy stays in effect.
    pub fn update_policy(&mut self, update: &PolicyUpdate) -> ConfigResult<&ScalingPolicy> {
        self.policy = self.policy.merged(update)?;
        info!(
            scale_out = self.policy.scale_out_threshold,
            scale_in = self.policy.scale_in_threshold,
            min = self.policy.min_servers,
            max = self.policy.max_servers,
            step = self.policy.step_size,
            cooldown_ms = self.policy.cooldown_ms,
            "scaling policy updated"
        );
        Ok(&self.policy)
    }

    pub fn last_action_ms(&self) -> Option<u64> {
        self.last_action_ms
    }

    /// Whether strictly more than the cooldown has passed since the last
    /// action.
    pub fn cooldown_elapsed(&self, now: u64) -> bool {
        match self.last_action_ms {
            None => true,
            Some(last) => now.saturating_sub(last) > self.policy.cooldown_ms,
        }
    }

    /// The scaling rule. First match wins; an empty pool maintains.
    ///
    /// A pool outside `[min_servers, max_servers]` (after a policy update
    /// narrowed the bounds) is brought back to the nearest bound before
    /// any load rule applies.
    pub fn decide(&self, aggregate: Option<&PoolAggregate>) -> ScaleDecision {
        let Some(agg) = aggregate else {
            return ScaleDecision::Maintain;
        };
        let p = &self.policy;
        let total = agg.total_servers;

        if total < p.min_servers {
            return ScaleDecision::ScaleOut {
                target: p.min_servers,
            };
        }
        if total > p.max_servers {
            return ScaleDecision::ScaleIn {
                target: p.max_servers,
            };
        }

        let overloaded = agg.avg_cpu > p.scale_out_threshold
            || agg.avg_memory > p.scale_out_threshold
            || agg.critical_share_exceeded();
        if overloaded && total < p.max_servers {
            return ScaleDecision::ScaleOut {
                target: (total + p.step_size).min(p.max_servers),
            };
        }

        let idle = agg.avg_cpu < p.scale_in_threshold
            && agg.avg_memory < p.scale_in_threshold
            && agg.critical_count == 0;
        if idle && total > p.min_servers {
            return ScaleDecision::ScaleIn {
                target: total.saturating_sub(1).max(p.min_servers),
            };
        }

        ScaleDecision::Maintain
    }

    /// One policy cycle: check the cooldown, decide and execute.
    pub fn evaluate<R: Rng + ?Sized>(
        &mut self,
        store: &mut FleetStore,
        generator: &MetricGenerator,
        now: u64,
        rng: &mut R,
    ) -> StateResult<Option<ScalingEvent>> {
        if !self.cooldown_elapsed(now) {
            debug!(
                since_last_ms = now.saturating_sub(self.last_action_ms.unwrap_or(now)),
                cooldown_ms = self.policy.cooldown_ms,
                "scaling cooldown active"
            );
            return Ok(None);
        }

        let Some(aggregate) = PoolAggregate::from_servers(store.operational()) else {
            debug!("operational pool empty; maintaining");
            return Ok(None);
        };

        let request = match self.decide(Some(&aggregate)) {
            ScaleDecision::Maintain => {
                debug!(
                    avg_cpu = aggregate.avg_cpu,
                    avg_memory = aggregate.avg_memory,
                    critical = aggregate.critical_count,
                    servers = aggregate.total_servers,
                    "maintaining operational pool"
                );
                return Ok(None);
            }
            ScaleDecision::ScaleOut { target } => ScaleRequest {
                target,
                trigger: ScalingTrigger::Auto,
                reason: self.scale_out_reason(&aggregate),
            },
            ScaleDecision::ScaleIn { target } => ScaleRequest {
                target,
                trigger: ScalingTrigger::Auto,
                reason: self.scale_in_reason(&aggregate),
            },
        };

        self.resize(store, generator, request, now, rng)
    }

    /// Manually resize the operational pool. `target` is clamped to the
    /// policy bounds; a no-op resize records nothing.
    pub fn scale_to<R: Rng + ?Sized>(
        &mut self,
        store: &mut FleetStore,
        generator: &MetricGenerator,
        target: usize,
        now: u64,
        rng: &mut R,
    ) -> StateResult<Option<ScalingEvent>> {
        let clamped = target.clamp(self.policy.min_servers, self.policy.max_servers);
        let request = ScaleRequest {
            target: clamped,
            trigger: ScalingTrigger::Manual,
            reason: format!("manual scale to {clamped} servers (requested {target})"),
        };
        self.resize(store, generator, request, now, rng)
    }

    fn scale_out_reason(&self, agg: &PoolAggregate) -> String {
        let threshold = self.policy.scale_out_threshold;
        if agg.total_servers < self.policy.min_servers {
            format!(
                "{} servers below min_servers {}",
                agg.total_servers, self.policy.min_servers
            )
        } else if agg.avg_cpu > threshold {
            format!("avg cpu {:.1}% above {threshold:.1}%", agg.avg_cpu)
        } else if agg.avg_memory > threshold {
            format!("avg memory {:.1}% above {threshold:.1}%", agg.avg_memory)
        } else {
            format!(
                "{} of {} servers critical",
                agg.critical_count, agg.total_servers
            )
        }
    }

    fn scale_in_reason(&self, agg: &PoolAggregate) -> String {
        if agg.total_servers > self.policy.max_servers {
            return format!(
                "{} servers above max_servers {}",
                agg.total_servers, self.policy.max_servers
            );
        }
        format!(
            "avg cpu {:.1}% and memory {:.1}% below {:.1}%",
            agg.avg_cpu, agg.avg_memory, self.policy.scale_in_threshold
        )
    }

    fn resize<R: Rng + ?Sized>(
        &mut self,
        store: &mut FleetStore,
        generator: &MetricGenerator,
        request: ScaleRequest,
        now: u64,
        rng: &mut R,
    ) -> StateResult<Option<ScalingEvent>> {
        let before = store.operational().len();
        if request.target == before {
            return Ok(None);
        }
        let snapshot = PoolAggregate::from_servers(store.operational())
            .map(|a| a.snapshot())
            .unwrap_or(MetricsSnapshot {
                avg_cpu: 0.0,
                avg_memory: 0.0,
                critical_count: 0,
            });

        let event_type = if request.target > before {
            for _ in before..request.target {
                let spec = self.provision(store, generator, rng);
                store.add_operational(&spec, now)?;
            }
            ScalingEventType::ScaleOut
        } else {
            for id in scale_in_candidates(store.operational(), before - request.target) {
                store.remove_operational(&id)?;
            }
            ScalingEventType::ScaleIn
        };

        self.last_action_ms = Some(now);
        let event = store.record_scaling_event(ScalingEvent {
            id: String::new(),
            event_type,
            timestamp: now,
            trigger: request.trigger,
            count_before: before,
            count_after: store.operational().len(),
            reason: request.reason,
            metrics_snapshot: snapshot,
        });
        info!(
            event = %event.id,
            kind = ?event.event_type,
            trigger = ?event.trigger,
            from = event.count_before,
            to = event.count_after,
            reason = %event.reason,
            "operational pool scaled"
        );
        Ok(Some(event))
    }

    /// Spec for a fresh operational server with an unused `auto-NNN` id.
    fn provision<R: Rng + ?Sized>(
        &mut self,
        store: &FleetStore,
        generator: &MetricGenerator,
        rng: &mut R,
    ) -> ServerSpec {
        let id = loop {
            self.next_server_seq += 1;
            let candidate = format!("auto-{:03}", self.next_server_seq);
            if !store.contains(&candidate) {
                break candidate;
            }
        };
        let role = OPTIMAL_ROLES.choose(rng).copied().unwrap_or(ServerRole::Web);
        ServerSpec {
            hostname: format!("{}-{id}.ops.internal", role.as_str()),
            id,
            environment: Environment::Kubernetes,
            role,
            metrics: generator.initial_metrics(role, rng),
        }
    }
}

/// Ids of the `count` servers to remove: healthiest status first, then
/// lowest CPU.
fn scale_in_candidates(servers: &[ServerEntity], count: usize) -> Vec<String> {
    let mut ordered: Vec<&ServerEntity> = servers.iter().collect();
    ordered.sort_by(|a, b| {
        a.status
            .cmp(&b.status)
            .then(a.metrics.cpu_usage.total_cmp(&b.metrics.cpu_usage))
    });
    ordered.into_iter().take(count).map(|s| s.id.clone()).collect()
}
