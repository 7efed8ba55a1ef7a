//! Built-in failure scenarios.
//!
//! Every scenario targets analysis-pool hosts, so the step targets always
//! exist while the seed fleet is in use.

use fleetsim_core::seed::{
    API_PROD_01, CACHE_01, DB_MASTER_01, DB_REPLICA_01, GATEWAY_01, LB_01, MONITOR_01,
    STORAGE_01, WEB_PROD_01, WEB_PROD_02,
};
use fleetsim_core::{AlertSeverity, AlertTemplate, FailureScenario, MetricKind, ScenarioStep};

fn step(
    delay_ms: u64,
    target: &str,
    metric: MetricKind,
    new_value: f64,
    severity: AlertSeverity,
    message: &str,
) -> ScenarioStep {
    ScenarioStep {
        delay_ms,
        target_server_id: target.to_string(),
        metric,
        new_value,
        alert: AlertTemplate {
            kind: metric.alert_kind(),
            severity,
            message: message.to_string(),
        },
    }
}

fn scenario(
    id: &str,
    name: &str,
    description: &str,
    probability: f64,
    steps: Vec<ScenarioStep>,
) -> FailureScenario {
    FailureScenario {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        probability,
        steps,
    }
}

/// The default scenario library.
pub fn default_library() -> Vec<FailureScenario> {
    use AlertSeverity::{Critical, Warning};
    use MetricKind::*;

    vec![
        scenario(
            "disk-full-cascade",
            "Database disk full",
            "Primary database runs out of disk; query latency climbs and spreads to the API and web tiers.",
            0.01,
            vec![
                step(0, DB_MASTER_01, Disk, 95.0, Critical, "disk nearly full on db-master-01"),
                step(2_000, DB_MASTER_01, ResponseTime, 5000.0, Warning, "query latency degraded on db-master-01"),
                step(6_000, API_PROD_01, ResponseTime, 3500.0, Warning, "upstream database latency on api-prod-01"),
                step(10_000, WEB_PROD_01, ResponseTime, 4000.0, Critical, "page loads exceed 4s on web-prod-01"),
            ],
        ),
        scenario(
            "cpu-spike",
            "Web CPU spike",
            "A traffic burst pins a web node; the load balancer and edge gateway feel it next.",
            0.02,
            vec![
                step(0, WEB_PROD_02, Cpu, 96.0, Critical, "cpu saturated on web-prod-02"),
                step(3_000, LB_01, ResponseTime, 1500.0, Warning, "backend latency rising on lb-main-01"),
                step(5_000, GATEWAY_01, Cpu, 78.0, Warning, "elevated cpu on gw-edge-01"),
            ],
        ),
        scenario(
            "memory-leak",
            "API memory leak",
            "API process leaks memory until it swaps; cache lookups slow down.",
            0.015,
            vec![
                step(0, API_PROD_01, Memory, 85.0, Warning, "memory growing steadily on api-prod-01"),
                step(8_000, API_PROD_01, Memory, 94.0, Critical, "memory exhausted on api-prod-01"),
                step(12_000, CACHE_01, ResponseTime, 1200.0, Warning, "cache responses slow on cache-redis-01"),
            ],
        ),
        scenario(
            "network-issue",
            "Edge network degradation",
            "Packet loss at the edge gateway backs up the load balancer and starves a web node.",
            0.02,
            vec![
                step(0, GATEWAY_01, NetworkIn, 9500.0, Warning, "inbound traffic surge on gw-edge-01"),
                step(2_000, LB_01, ResponseTime, 2500.0, Warning, "connection queueing on lb-main-01"),
                step(4_000, WEB_PROD_01, NetworkOut, 20.0, Critical, "outbound traffic collapsed on web-prod-01"),
            ],
        ),
        scenario(
            "storage-pressure",
            "Shared storage pressure",
            "NFS volume fills up, the replica falls behind and monitoring scrapes start timing out.",
            0.01,
            vec![
                step(0, STORAGE_01, Disk, 92.0, Warning, "volume filling on storage-nfs-01"),
                step(5_000, DB_REPLICA_01, Disk, 96.0, Critical, "replica disk full on db-replica-01"),
                step(8_000, MONITOR_01, Cpu, 75.0, Warning, "scrape backlog on mon-prom-01"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsim_core::SeedFleet;

    #[test]
    fn every_step_targets_a_seeded_analysis_host() {
        let seed = SeedFleet::default();
        for scenario in default_library() {
            for step in &scenario.steps {
                assert!(
                    seed.analysis.iter().any(|s| s.id == step.target_server_id),
                    "{} targets {}",
                    scenario.id,
                    step.target_server_id
                );
            }
        }
    }

    #[test]
    fn steps_are_ordered_and_probabilities_small() {
        for scenario in default_library() {
            assert!(!scenario.steps.is_empty());
            assert!(scenario.steps.windows(2).all(|w| w[0].delay_ms <= w[1].delay_ms));
            assert!(scenario.probability > 0.0 && scenario.probability < 0.1);
        }
    }
}
