//! Default seed fleet and per-role baseline metrics.
//!
//! The analysis pool is a fixed set of well-known hosts spread over
//! several environments; the operational pool starts with a handful of
//! auto-managed nodes. The built-in failure scenarios target the
//! analysis hosts by id.

use serde::{Deserialize, Serialize};

use crate::types::*;

pub const WEB_PROD_01: &str = "web-prod-01";
pub const WEB_PROD_02: &str = "web-prod-02";
pub const API_PROD_01: &str = "api-prod-01";
pub const DB_MASTER_01: &str = "db-master-01";
pub const DB_REPLICA_01: &str = "db-replica-01";
pub const CACHE_01: &str = "cache-redis-01";
pub const STORAGE_01: &str = "storage-nfs-01";
pub const GATEWAY_01: &str = "gw-edge-01";
pub const LB_01: &str = "lb-main-01";
pub const MONITOR_01: &str = "mon-prom-01";

/// Servers the store is populated with on first start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedFleet {
    pub analysis: Vec<ServerSpec>,
    pub operational: Vec<ServerSpec>,
}

impl Default for SeedFleet {
    fn default() -> Self {
        let analysis = [
            (WEB_PROD_01, Environment::OnPremise, ServerRole::Web),
            (WEB_PROD_02, Environment::Aws, ServerRole::Web),
            (API_PROD_01, Environment::Kubernetes, ServerRole::Api),
            (DB_MASTER_01, Environment::OnPremise, ServerRole::Database),
            (DB_REPLICA_01, Environment::Aws, ServerRole::Database),
            (CACHE_01, Environment::Kubernetes, ServerRole::Cache),
            (STORAGE_01, Environment::OnPremise, ServerRole::Storage),
            (GATEWAY_01, Environment::Gcp, ServerRole::Gateway),
            (LB_01, Environment::Azure, ServerRole::LoadBalancer),
            (MONITOR_01, Environment::Gcp, ServerRole::Monitoring),
        ]
        .into_iter()
        .map(|(id, environment, role)| ServerSpec {
            id: id.to_string(),
            hostname: format!("{id}.analysis.internal"),
            environment,
            role,
            metrics: baseline_metrics(role),
        })
        .collect();

        let operational_roles = [
            ServerRole::Web,
            ServerRole::Api,
            ServerRole::Worker,
            ServerRole::Cache,
            ServerRole::Web,
        ];
        let operational = operational_roles
            .into_iter()
            .enumerate()
            .map(|(i, role)| {
                let id = format!("ops-{:03}", i + 1);
                ServerSpec {
                    hostname: format!("{}-{id}.ops.internal", role.as_str()),
                    id,
                    environment: Environment::Kubernetes,
                    role,
                    metrics: baseline_metrics(role),
                }
            })
            .collect();

        Self {
            analysis,
            operational,
        }
    }
}

/// Typical steady-state metrics for a role.
pub fn baseline_metrics(role: ServerRole) -> ServerMetrics {
    // cpu, memory, disk, network in, network out, response time
    let (cpu, memory, disk, net_in, net_out, rt) = match role {
        ServerRole::Web => (35.0, 60.0, 45.0, 320.0, 540.0, 180.0),
        ServerRole::Api => (40.0, 55.0, 35.0, 280.0, 300.0, 220.0),
        ServerRole::Database => (45.0, 75.0, 60.0, 150.0, 210.0, 90.0),
        ServerRole::Cache => (25.0, 70.0, 20.0, 400.0, 420.0, 15.0),
        ServerRole::Storage => (20.0, 40.0, 70.0, 120.0, 90.0, 60.0),
        ServerRole::Gateway => (30.0, 45.0, 25.0, 600.0, 580.0, 40.0),
        ServerRole::Worker => (50.0, 50.0, 30.0, 80.0, 60.0, 300.0),
        ServerRole::LoadBalancer => (20.0, 35.0, 15.0, 750.0, 740.0, 25.0),
        ServerRole::Monitoring => (30.0, 55.0, 50.0, 200.0, 40.0, 110.0),
    };
    ServerMetrics {
        cpu_usage: cpu,
        memory_usage: memory,
        disk_usage: disk,
        network_in: net_in,
        network_out: net_out,
        response_time_ms: rt,
        uptime_secs: 0,
    }
}
