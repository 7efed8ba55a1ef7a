//! FleetEngine: the lifecycle facade.
//!
//! Owns the simulation core and the handles of its two driver tasks.
//! There is no global instance; whoever constructs the engine owns it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use fleetsim_core::{
    AggregatedFleetView, EngineConfig, FleetView, PolicyUpdate, ScalingEvent, ScalingPolicy,
    epoch_millis,
};

use crate::error::{EngineError, EngineResult};
use crate::pools::DualPoolManager;
use crate::simulation::{SimulationCore, run_policy_loop, run_simulation_loop};

/// Running driver tasks plus the channel that stops them.
struct Drivers {
    shutdown: watch::Sender<bool>,
    simulation: JoinHandle<()>,
    policy: JoinHandle<()>,
}

/// Fleet simulation and autoscaling engine.
pub struct FleetEngine {
    core: Arc<Mutex<SimulationCore>>,
    drivers: Mutex<Option<Drivers>>,
    tick_interval: Duration,
    policy_interval: Duration,
}

impl FleetEngine {
    /// Validate `config` and build a stopped engine with an empty store.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let core = SimulationCore::new(&config)?;
        Ok(Self {
            core: Arc::new(Mutex::new(core)),
            drivers: Mutex::new(None),
            tick_interval: config.tick_interval,
            policy_interval: config.policy_interval,
        })
    }

    /// Seed the store if needed, reset the tick counter and spawn both
    /// drivers.
    pub async fn start(&self) -> EngineResult<()> {
        let mut drivers = self.drivers.lock().await;
        if drivers.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        {
            let mut core = self.core.lock().await;
            let now = epoch_millis();
            core.ensure_seeded(now)?;
            core.begin_run(now);
        }

        let (shutdown, rx) = watch::channel(false);
        let simulation = tokio::spawn(run_simulation_loop(
            self.core.clone(),
            self.tick_interval,
            rx.clone(),
        ));
        let policy = tokio::spawn(run_policy_loop(
            self.core.clone(),
            self.policy_interval,
            rx,
        ));
        *drivers = Some(Drivers {
            shutdown,
            simulation,
            policy,
        });

        info!(
            tick_interval = ?self.tick_interval,
            policy_interval = ?self.policy_interval,
            "simulation started"
        );
        Ok(())
    }

    /// Signal both drivers, wait for them and clear scenario state. The
    /// store stays readable.
    pub async fn stop(&self) -> EngineResult<()> {
        let mut guard = self.drivers.lock().await;
        let Some(drivers) = guard.take() else {
            return Err(EngineError::NotRunning);
        };

        let _ = drivers.shutdown.send(true);
        for (name, handle) in [("simulation", drivers.simulation), ("policy", drivers.policy)] {
            if let Err(e) = handle.await {
                error!(driver = name, error = %e, "driver task failed");
            }
        }

        let mut core = self.core.lock().await;
        core.finish_run();
        info!(tick = core.store().run().tick, "simulation stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.drivers.lock().await.is_some()
    }

    /// Deep copy of both pools and the run metadata.
    pub async fn snapshot(&self) -> FleetView {
        self.core.lock().await.snapshot()
    }

    pub async fn aggregated_view(&self) -> AggregatedFleetView {
        self.core.lock().await.aggregated_view(epoch_millis())
    }

    pub async fn scaling_history(&self, limit: usize) -> Vec<ScalingEvent> {
        self.core.lock().await.store().scaling_history(limit)
    }

    /// Read handle for external consumers.
    pub fn pools(&self) -> DualPoolManager {
        DualPoolManager::new(self.core.clone())
    }

    pub async fn scaling_policy(&self) -> ScalingPolicy {
        self.core.lock().await.scaling_policy().clone()
    }

    /// Merge `update` into the live policy. Rejected updates leave the
    /// current policy in place.
    pub async fn update_scaling_policy(&self, update: PolicyUpdate) -> EngineResult<ScalingPolicy> {
        self.core.lock().await.update_policy(&update)
    }

    /// Activate a failure scenario immediately. Only while running.
    /// Returns the number of steps that fired right away.
    pub async fn inject_scenario(&self, id: &str) -> EngineResult<usize> {
        // The run flag is checked under the core lock, so a concurrent
        // `stop` either sees the scenario and clears it or rejects it here.
        self.core.lock().await.inject_scenario(id, epoch_millis())
    }

    /// Manually resize the operational pool (clamped to the policy bounds).
    pub async fn scale_operational(&self, target: usize) -> EngineResult<Option<ScalingEvent>> {
        self.core.lock().await.scale_to(target, epoch_millis())
    }

    /// Drop all servers and history. The next `start` reseeds.
    pub async fn reset(&self) -> EngineResult<()> {
        if self.is_running().await {
            return Err(EngineError::AlreadyRunning);
        }
        self.core.lock().await.reset();
        Ok(())
    }
}
