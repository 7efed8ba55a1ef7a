//! Simulation core and its two periodic drivers.
//!
//! `SimulationCore` bundles everything a tick or a policy evaluation
//! touches: the fleet store, the scenario engine, the autoscaler, the
//! metric generator and the random source. The engine keeps it behind a
//! single `tokio::sync::Mutex`, so a tick and a scaling action never
//! interleave and readers never observe half a tick.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, trace, warn};

use fleetsim_autoscale::Autoscaler;
use fleetsim_core::{
    AggregatedFleetView, EngineConfig, FleetView, PolicyUpdate, ScalingEvent, ScalingPolicy,
    SeedFleet, epoch_millis,
};
use fleetsim_health::StatusClassifier;
use fleetsim_metrics::MetricGenerator;
use fleetsim_scenario::{AdvanceReport, ScenarioEngine, default_library};
use fleetsim_state::{FleetStore, MetricUpdate};

use crate::error::{EngineError, EngineResult};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Tick counter after the tick.
    pub tick: u64,
    /// Servers whose metrics could not be advanced.
    pub anomalies: usize,
    pub alerts_swept: usize,
    pub scenarios: AdvanceReport,
}

/// Mutable state shared by the simulation and policy drivers.
#[derive(Debug)]
pub struct SimulationCore {
    store: FleetStore,
    scenarios: ScenarioEngine,
    autoscaler: Autoscaler,
    generator: MetricGenerator,
    rng: StdRng,
    fleet: SeedFleet,
    tick_interval_ms: u64,
    /// Sub-second remainder not yet credited to server uptime.
    uptime_carry_ms: u64,
    recent_events_limit: usize,
}

impl SimulationCore {
    /// Build a core from a validated configuration. The store stays
    /// unseeded until [`SimulationCore::ensure_seeded`].
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let library = config
            .scenarios
            .library
            .clone()
            .unwrap_or_else(default_library);
        let mut scenarios = ScenarioEngine::new(library, config.scenarios.settle_window)?;
        scenarios.set_auto_activation(config.scenarios.enabled);
        for (id, &probability) in &config.scenarios.probabilities {
            scenarios.set_probability(id, probability)?;
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            store: FleetStore::new(
                StatusClassifier::new(config.thresholds.clone()),
                config.history_capacity,
            ),
            scenarios,
            autoscaler: Autoscaler::new(config.scaling.clone()),
            generator: MetricGenerator::new(config.drift.clone()),
            rng,
            fleet: config.fleet.clone(),
            tick_interval_ms: config.tick_interval.as_millis() as u64,
            uptime_carry_ms: 0,
            recent_events_limit: config.recent_events_limit,
        })
    }

    pub fn store(&self) -> &FleetStore {
        &self.store
    }

    pub fn scenarios(&self) -> &ScenarioEngine {
        &self.scenarios
    }

    pub fn scaling_policy(&self) -> &ScalingPolicy {
        self.autoscaler.policy()
    }

    /// Populate the store from the seed fleet unless already done.
    pub fn ensure_seeded(&mut self, now: u64) -> EngineResult<()> {
        if !self.store.is_seeded() {
            self.store
                .initialize(&self.fleet.analysis, &self.fleet.operational, now)?;
        }
        Ok(())
    }

    /// Simulation clock in milliseconds: ticks so far times the interval.
    pub fn sim_clock_ms(&self) -> u64 {
        self.store.run().tick * self.tick_interval_ms
    }

    pub fn begin_run(&mut self, now: u64) {
        self.store.begin_run(now);
    }

    /// Clear scenario state and mark the run stopped. The store keeps its
    /// servers for reads.
    pub fn finish_run(&mut self) {
        self.scenarios.clear(&mut self.store);
        self.store.finish_run();
    }

    /// Drop all servers and scaling history and restart the cooldown.
    pub fn reset(&mut self) {
        self.scenarios.clear(&mut self.store);
        self.store.reset();
        self.uptime_carry_ms = 0;
        self.autoscaler = Autoscaler::new(self.autoscaler.policy().clone());
        info!("simulation reset");
    }

    /// One simulation tick.
    ///
    /// 1. drift and reclassify every server in both pools, then sweep
    ///    resolved alerts
    /// 2. roll idle scenarios and advance active ones
    /// 3. increment the tick counter
    pub fn run_tick(&mut self, now: u64) -> TickReport {
        let elapsed_ms = self.uptime_carry_ms + self.tick_interval_ms;
        let elapsed_secs = elapsed_ms / 1000;
        self.uptime_carry_ms = elapsed_ms % 1000;
        let mut anomalies = 0;

        for id in self.store.server_ids() {
            let Some(server) = self.store.server(&id) else {
                continue;
            };
            let next = match self
                .generator
                .next_metrics(&server.metrics, elapsed_secs, &mut self.rng)
            {
                Ok(next) => next,
                Err(err) => {
                    anomalies += 1;
                    warn!(server = %id, %err, "metric drift failed; keeping previous state");
                    continue;
                }
            };
            if let Err(err) = self
                .store
                .apply_metric_update(&id, MetricUpdate::Replace(next), now)
            {
                anomalies += 1;
                warn!(server = %id, %err, "metric update rejected");
            }
        }
        let alerts_swept = self.store.sweep_resolved_alerts();

        let sim_ms = self.sim_clock_ms();
        let scenarios = self
            .scenarios
            .advance(sim_ms, now, &mut self.store, &mut self.rng);
        self.store.set_active_scenarios(self.scenarios.active_ids());

        let tick = self.store.advance_tick();
        trace!(
            tick,
            anomalies,
            alerts_swept,
            steps_fired = scenarios.steps_fired,
            "tick complete"
        );
        TickReport {
            tick,
            anomalies,
            alerts_swept,
            scenarios,
        }
    }

    /// One scaling policy evaluation.
    pub fn evaluate_policy(&mut self, now: u64) -> EngineResult<Option<ScalingEvent>> {
        Ok(self
            .autoscaler
            .evaluate(&mut self.store, &self.generator, now, &mut self.rng)?)
    }

    /// Manually resize the operational pool.
    pub fn scale_to(&mut self, target: usize, now: u64) -> EngineResult<Option<ScalingEvent>> {
        self.ensure_seeded(now)?;
        Ok(self
            .autoscaler
            .scale_to(&mut self.store, &self.generator, target, now, &mut self.rng)?)
    }

    pub fn update_policy(&mut self, update: &PolicyUpdate) -> EngineResult<ScalingPolicy> {
        Ok(self.autoscaler.update_policy(update)?.clone())
    }

    /// Activate a scenario at the current simulation clock. Only while a
    /// run is in progress.
    pub fn inject_scenario(&mut self, id: &str, now: u64) -> EngineResult<usize> {
        if !self.store.run().running {
            return Err(EngineError::NotRunning);
        }
        let sim_ms = self.sim_clock_ms();
        let fired = self.scenarios.activate(id, sim_ms, now, &mut self.store)?;
        self.store.set_active_scenarios(self.scenarios.active_ids());
        Ok(fired)
    }

    pub fn snapshot(&self) -> FleetView {
        self.store.snapshot()
    }

    pub fn aggregated_view(&self, now: u64) -> AggregatedFleetView {
        AggregatedFleetView {
            analysis_targets: self.store.analysis().to_vec(),
            operational_summary: self.store.operational_summary(),
            recent_scaling_events: self.store.scaling_history(self.recent_events_limit),
            timestamp: now,
        }
    }
}

/// Tick driver: one `run_tick` per `interval` until shutdown.
///
/// A tick that is in progress when shutdown is signalled completes first.
pub async fn run_simulation_loop(
    core: Arc<Mutex<SimulationCore>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(?interval, "simulation loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let report = core.lock().await.run_tick(epoch_millis());
                for id in &report.scenarios.activated {
                    debug!(tick = report.tick, scenario = %id, "scenario activated");
                }
            }
            _ = shutdown.changed() => {
                debug!("simulation loop shutting down");
                break;
            }
        }
    }
}

/// Policy driver: one scaling evaluation per `interval` until shutdown.
pub async fn run_policy_loop(
    core: Arc<Mutex<SimulationCore>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(?interval, "policy loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let result = core.lock().await.evaluate_policy(epoch_millis());
                if let Err(e) = result {
                    error!(error = %e, "scaling evaluation failed");
                }
            }
            _ = shutdown.changed() => {
                debug!("policy loop shutting down");
                break;
            }
        }
    }
}
