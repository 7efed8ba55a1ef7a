//! Dual-pool manager: the read side of the engine.
//!
//! External consumers (exporters, request layers) read the fleet through
//! this handle. Every accessor copies under the engine lock and nothing
//! here mutates state.

use std::sync::Arc;

use tokio::sync::Mutex;

use fleetsim_core::{AggregatedFleetView, ScalingEvent, ServerEntity, epoch_millis};

use crate::simulation::SimulationCore;

/// Cloneable read handle over both server pools.
#[derive(Debug, Clone)]
pub struct DualPoolManager {
    core: Arc<Mutex<SimulationCore>>,
}

impl DualPoolManager {
    pub(crate) fn new(core: Arc<Mutex<SimulationCore>>) -> Self {
        Self { core }
    }

    /// The fixed analysis identities, in seed order.
    pub async fn analysis_targets(&self) -> Vec<ServerEntity> {
        self.core.lock().await.store().analysis().to_vec()
    }

    /// The current operational pool.
    pub async fn operational_servers(&self) -> Vec<ServerEntity> {
        self.core.lock().await.store().operational().to_vec()
    }

    /// Analysis targets, operational summary and recent scaling events,
    /// all taken under one lock.
    pub async fn aggregated_view(&self) -> AggregatedFleetView {
        self.core.lock().await.aggregated_view(epoch_millis())
    }

    /// Up to `limit` scaling events, most recent first.
    pub async fn scaling_history(&self, limit: usize) -> Vec<ScalingEvent> {
        self.core.lock().await.store().scaling_history(limit)
    }
}
