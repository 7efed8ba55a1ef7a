//! Scenario engine: drives the per-scenario state machine.
//!
//! Idle scenarios roll for activation once per tick. Active scenarios
//! fire every step whose delay has elapsed, then settle for a fixed
//! window before their alerts are resolved and they return to idle.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use fleetsim_core::config::validate_probability;
use fleetsim_core::{AlertId, AlertOrigin, FailureScenario, ScenarioId};
use fleetsim_state::{FleetStore, MetricUpdate, StateError};

use crate::error::{ScenarioError, ScenarioResult};

/// Where a scenario is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioPhase {
    /// Not active; rolls for activation every tick.
    Idle,
    /// Activated, no step has fired yet.
    Triggered,
    /// Some steps fired, more are pending.
    Stepping,
    /// Every step fired; waiting out the settle window.
    Settling,
}

/// What one `advance` call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceReport {
    pub activated: Vec<ScenarioId>,
    pub steps_fired: usize,
    pub completed: Vec<ScenarioId>,
}

#[derive(Debug, Clone)]
struct ActiveScenario {
    /// Simulation clock (ms) at activation.
    activated_at_ms: u64,
    /// Index of the next step to fire.
    next_step: usize,
    alerts: Vec<AlertId>,
}

/// Owns the scenario library and the set of active scenarios.
#[derive(Debug)]
pub struct ScenarioEngine {
    library: Vec<FailureScenario>,
    active: BTreeMap<ScenarioId, ActiveScenario>,
    settle_window_ms: u64,
    /// When false, idle scenarios never roll; injected ones still step.
    auto_activation: bool,
}

impl ScenarioEngine {
    /// Validate `library` and build an engine with no active scenarios.
    pub fn new(library: Vec<FailureScenario>, settle_window: Duration) -> ScenarioResult<Self> {
        let mut ids = HashSet::new();
        for scenario in &library {
            if !ids.insert(scenario.id.as_str()) {
                return Err(ScenarioError::DuplicateScenario(scenario.id.clone()));
            }
            validate_probability(&scenario.id, scenario.probability)?;
            if scenario.steps.is_empty() {
                return Err(ScenarioError::NoSteps(scenario.id.clone()));
            }
            if let Some(index) = scenario
                .steps
                .windows(2)
                .position(|w| w[1].delay_ms < w[0].delay_ms)
            {
                return Err(ScenarioError::StepOrder {
                    scenario: scenario.id.clone(),
                    index: index + 1,
                });
            }
        }

        Ok(Self {
            library,
            active: BTreeMap::new(),
            settle_window_ms: settle_window.as_millis() as u64,
            auto_activation: true,
        })
    }

    pub fn library(&self) -> &[FailureScenario] {
        &self.library
    }

    pub fn set_auto_activation(&mut self, enabled: bool) {
        self.auto_activation = enabled;
    }

    /// Change a scenario's per-tick activation probability.
    pub fn set_probability(&mut self, id: &str, probability: f64) -> ScenarioResult<()> {
        validate_probability(id, probability)?;
        let scenario = self
            .library
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ScenarioError::UnknownScenario(id.to_string()))?;
        scenario.probability = probability;
        Ok(())
    }

    /// Current phase of a scenario, `None` for ids not in the library.
    pub fn phase(&self, id: &str) -> Option<ScenarioPhase> {
        let scenario = self.library.iter().find(|s| s.id == id)?;
        let phase = match self.active.get(id) {
            None => ScenarioPhase::Idle,
            Some(run) if run.next_step == 0 => ScenarioPhase::Triggered,
            Some(run) if run.next_step < scenario.steps.len() => ScenarioPhase::Stepping,
            Some(_) => ScenarioPhase::Settling,
        };
        Some(phase)
    }

    /// Ids of active scenarios in sorted order.
    pub fn active_ids(&self) -> Vec<ScenarioId> {
        self.active.keys().cloned().collect()
    }

    /// Activate a scenario now, bypassing its probability.
    ///
    /// Steps that are already due (delay zero) fire immediately. Returns
    /// the number of steps fired.
    pub fn activate(
        &mut self,
        id: &str,
        sim_ms: u64,
        wall_ms: u64,
        store: &mut FleetStore,
    ) -> ScenarioResult<usize> {
        let scenario = self
            .library
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ScenarioError::UnknownScenario(id.to_string()))?;
        if self.active.contains_key(id) {
            return Err(ScenarioError::AlreadyActive(id.to_string()));
        }

        info!(scenario = %id, "scenario injected");
        let mut run = ActiveScenario {
            activated_at_ms: sim_ms,
            next_step: 0,
            alerts: Vec::new(),
        };
        let fired = fire_due_steps(scenario, &mut run, sim_ms, wall_ms, store);
        self.active.insert(scenario.id.clone(), run);
        Ok(fired)
    }

    /// One tick of the scenario clock.
    ///
    /// `sim_ms` schedules steps; `wall_ms` timestamps the alerts and
    /// metric updates written to the store.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        sim_ms: u64,
        wall_ms: u64,
        store: &mut FleetStore,
        rng: &mut R,
    ) -> AdvanceReport {
        let mut report = AdvanceReport::default();

        for scenario in &self.library {
            if !self.auto_activation || self.active.contains_key(&scenario.id) {
                continue;
            }
            if rng.gen_bool(scenario.probability) {
                info!(
                    scenario = %scenario.id,
                    name = %scenario.name,
                    steps = scenario.steps.len(),
                    "scenario triggered"
                );
                self.active.insert(
                    scenario.id.clone(),
                    ActiveScenario {
                        activated_at_ms: sim_ms,
                        next_step: 0,
                        alerts: Vec::new(),
                    },
                );
                report.activated.push(scenario.id.clone());
            }
        }

        for (id, run) in self.active.iter_mut() {
            let Some(scenario) = self.library.iter().find(|s| &s.id == id) else {
                continue;
            };
            report.steps_fired += fire_due_steps(scenario, run, sim_ms, wall_ms, store);

            let settles_at = run.activated_at_ms + scenario.duration_ms() + self.settle_window_ms;
            if run.next_step == scenario.steps.len() && sim_ms >= settles_at {
                report.completed.push(id.clone());
            }
        }

        for id in &report.completed {
            if let Some(run) = self.active.remove(id) {
                resolve_alerts(id, &run.alerts, store);
                info!(scenario = %id, alerts = run.alerts.len(), "scenario settled");
            }
        }

        report
    }

    /// Drop every active scenario, resolving the alerts it raised.
    pub fn clear(&mut self, store: &mut FleetStore) -> Vec<ScenarioId> {
        let active = std::mem::take(&mut self.active);
        let mut cleared = Vec::with_capacity(active.len());
        for (id, run) in active {
            resolve_alerts(&id, &run.alerts, store);
            cleared.push(id);
        }
        if !cleared.is_empty() {
            debug!(count = cleared.len(), "active scenarios cleared");
        }
        cleared
    }
}

/// Fire every step of `scenario` whose delay has elapsed. Each step
/// appends its alert first, then overrides the target metric.
fn fire_due_steps(
    scenario: &FailureScenario,
    run: &mut ActiveScenario,
    sim_ms: u64,
    wall_ms: u64,
    store: &mut FleetStore,
) -> usize {
    let mut fired = 0;
    while let Some(step) = scenario.steps.get(run.next_step) {
        if run.activated_at_ms + step.delay_ms > sim_ms {
            break;
        }
        run.next_step += 1;

        let origin = AlertOrigin::Scenario(scenario.id.clone());
        let alert_id = match store.append_alert(&step.target_server_id, &step.alert, origin, wall_ms) {
            Ok(id) => id,
            Err(err) => {
                warn!(
                    scenario = %scenario.id,
                    server = %step.target_server_id,
                    %err,
                    "scenario step skipped"
                );
                continue;
            }
        };
        run.alerts.push(alert_id);

        let update = MetricUpdate::Set(step.metric, step.new_value);
        if let Err(err) = store.apply_metric_update(&step.target_server_id, update, wall_ms) {
            warn!(scenario = %scenario.id, %err, "scenario metric override failed");
            continue;
        }
        fired += 1;
        debug!(
            scenario = %scenario.id,
            step = run.next_step,
            server = %step.target_server_id,
            metric = ?step.metric,
            value = step.new_value,
            "scenario step fired"
        );
    }
    fired
}

fn resolve_alerts(scenario: &str, alerts: &[AlertId], store: &mut FleetStore) {
    for alert in alerts {
        match store.resolve_alert(alert) {
            Ok(()) => {}
            // The owning server was scaled away.
            Err(StateError::AlertNotFound(_)) => {
                debug!(scenario, %alert, "scenario alert already gone");
            }
            Err(err) => warn!(scenario, %alert, %err, "failed to resolve scenario alert"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsim_core::{
        AlertKind, AlertSeverity, AlertTemplate, Environment, MetricKind, ScenarioStep,
        ServerMetrics, ServerRole, ServerSpec,
    };
    use fleetsim_health::StatusClassifier;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn spec(id: &str) -> ServerSpec {
        ServerSpec {
            id: id.to_string(),
            hostname: format!("{id}.test"),
            environment: Environment::OnPremise,
            role: ServerRole::Database,
            metrics: ServerMetrics {
                cpu_usage: 30.0,
                memory_usage: 40.0,
                disk_usage: 50.0,
                network_in: 100.0,
                network_out: 100.0,
                response_time_ms: 100.0,
                uptime_secs: 0,
            },
        }
    }

    fn store() -> FleetStore {
        let mut store = FleetStore::new(StatusClassifier::default(), 10);
        store
            .initialize(&[spec("a"), spec("b"), spec("c")], &[], 0)
            .unwrap();
        store
    }

    fn step(
        delay_ms: u64,
        target: &str,
        metric: MetricKind,
        value: f64,
        severity: AlertSeverity,
    ) -> ScenarioStep {
        ScenarioStep {
            delay_ms,
            target_server_id: target.to_string(),
            metric,
            new_value: value,
            alert: AlertTemplate {
                kind: metric.alert_kind(),
                severity,
                message: format!("{metric:?} on {target}"),
            },
        }
    }

    fn disk_full(probability: f64) -> FailureScenario {
        FailureScenario {
            id: "disk-full".to_string(),
            name: "disk full".to_string(),
            description: String::new(),
            probability,
            steps: vec![
                step(0, "a", MetricKind::Disk, 95.0, AlertSeverity::Critical),
                step(2_000, "a", MetricKind::ResponseTime, 5000.0, AlertSeverity::Warning),
                step(6_000, "c", MetricKind::ResponseTime, 3500.0, AlertSeverity::Warning),
            ],
        }
    }

    fn engine(library: Vec<FailureScenario>) -> ScenarioEngine {
        ScenarioEngine::new(library, Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn cascade_fires_steps_in_delay_order() {
        let mut store = store();
        let mut engine = engine(vec![disk_full(0.0)]);

        // t+0: disk override plus a critical alert on the first target.
        assert_eq!(engine.activate("disk-full", 0, 0, &mut store).unwrap(), 1);
        let a = store.server("a").unwrap();
        assert_eq!(a.metrics.disk_usage, 95.0);
        let disk: Vec<_> = a.open_alerts(AlertKind::Disk).collect();
        assert_eq!(disk.len(), 1);
        assert_eq!(disk[0].severity, AlertSeverity::Critical);
        assert_eq!(engine.phase("disk-full"), Some(ScenarioPhase::Stepping));

        let mut rng = StdRng::seed_from_u64(1);

        // t+2s: response time on the same server.
        let report = engine.advance(2_000, 2_000, &mut store, &mut rng);
        assert_eq!(report.steps_fired, 1);
        let a = store.server("a").unwrap();
        assert_eq!(a.metrics.response_time_ms, 5000.0);
        assert!(
            a.open_alerts(AlertKind::ResponseTime)
                .any(|al| al.severity == AlertSeverity::Warning
                    && al.origin == AlertOrigin::Scenario("disk-full".to_string()))
        );

        // Third server untouched until its delay elapses.
        engine.advance(5_999, 5_999, &mut store, &mut rng);
        let c = store.server("c").unwrap();
        assert_eq!(c.metrics.response_time_ms, 100.0);
        assert!(c.alerts.is_empty());

        engine.advance(6_000, 6_000, &mut store, &mut rng);
        assert_eq!(store.server("c").unwrap().metrics.response_time_ms, 3500.0);
        assert_eq!(engine.phase("disk-full"), Some(ScenarioPhase::Settling));
    }

    #[test]
    fn settle_window_then_alerts_resolved() {
        let mut store = store();
        let mut engine = engine(vec![disk_full(0.0)]);
        let mut rng = StdRng::seed_from_u64(2);
        engine.activate("disk-full", 0, 0, &mut store).unwrap();
        engine.advance(6_000, 6_000, &mut store, &mut rng);

        // Last delay 6s + settle 10s.
        let report = engine.advance(15_999, 15_999, &mut store, &mut rng);
        assert!(report.completed.is_empty());
        assert_eq!(engine.active_ids(), vec!["disk-full".to_string()]);

        let report = engine.advance(16_000, 16_000, &mut store, &mut rng);
        assert_eq!(report.completed, vec!["disk-full".to_string()]);
        assert_eq!(engine.phase("disk-full"), Some(ScenarioPhase::Idle));
        let scenario_alerts_open = store
            .snapshot()
            .analysis
            .iter()
            .flat_map(|s| s.alerts.iter())
            .filter(|al| matches!(al.origin, AlertOrigin::Scenario(_)))
            .any(|al| !al.resolved);
        assert!(!scenario_alerts_open);
    }

    #[test]
    fn certain_probability_activates_once() {
        let mut store = store();
        let mut engine = engine(vec![disk_full(1.0)]);
        let mut rng = StdRng::seed_from_u64(3);

        let first = engine.advance(0, 0, &mut store, &mut rng);
        assert_eq!(first.activated, vec!["disk-full".to_string()]);
        assert_eq!(first.steps_fired, 1);

        // Active scenarios do not roll again.
        let second = engine.advance(1_000, 1_000, &mut store, &mut rng);
        assert!(second.activated.is_empty());
        assert_eq!(engine.active_ids().len(), 1);
    }

    #[test]
    fn zero_probability_never_activates() {
        let mut store = store();
        let mut engine = engine(vec![disk_full(0.0)]);
        let mut rng = StdRng::seed_from_u64(4);
        for tick in 0..500 {
            let report = engine.advance(tick * 5_000, 0, &mut store, &mut rng);
            assert!(report.activated.is_empty());
        }
    }

    #[test]
    fn injected_scenario_steps_without_auto_activation() {
        let mut store = store();
        let mut engine = engine(vec![disk_full(1.0)]);
        engine.set_auto_activation(false);
        let mut rng = StdRng::seed_from_u64(8);
        assert!(engine.advance(0, 0, &mut store, &mut rng).activated.is_empty());

        engine.activate("disk-full", 0, 0, &mut store).unwrap();
        let report = engine.advance(2_000, 2_000, &mut store, &mut rng);
        assert_eq!(report.steps_fired, 1);
    }

    #[test]
    fn second_activation_is_rejected() {
        let mut store = store();
        let mut engine = engine(vec![disk_full(0.0)]);
        engine.activate("disk-full", 0, 0, &mut store).unwrap();
        assert!(matches!(
            engine.activate("disk-full", 10, 10, &mut store),
            Err(ScenarioError::AlreadyActive(_))
        ));
        assert!(matches!(
            engine.activate("nope", 10, 10, &mut store),
            Err(ScenarioError::UnknownScenario(_))
        ));
    }

    #[test]
    fn missing_target_is_skipped() {
        let mut store = store();
        let scenario = FailureScenario {
            steps: vec![
                step(0, "ghost", MetricKind::Cpu, 99.0, AlertSeverity::Critical),
                step(0, "b", MetricKind::Cpu, 95.0, AlertSeverity::Critical),
            ],
            ..disk_full(0.0)
        };
        let mut engine = engine(vec![scenario]);
        assert_eq!(engine.activate("disk-full", 0, 0, &mut store).unwrap(), 1);
        assert_eq!(store.server("b").unwrap().metrics.cpu_usage, 95.0);
    }

    #[test]
    fn delayed_first_step_is_triggered_phase() {
        let mut store = store();
        let scenario = FailureScenario {
            steps: vec![step(3_000, "a", MetricKind::Cpu, 95.0, AlertSeverity::Critical)],
            ..disk_full(0.0)
        };
        let mut engine = engine(vec![scenario]);
        assert_eq!(engine.activate("disk-full", 0, 0, &mut store).unwrap(), 0);
        assert_eq!(engine.phase("disk-full"), Some(ScenarioPhase::Triggered));
    }

    #[test]
    fn clear_resolves_alerts_and_idles() {
        let mut store = store();
        let mut engine = engine(vec![disk_full(0.0)]);
        engine.activate("disk-full", 0, 0, &mut store).unwrap();
        assert_eq!(engine.clear(&mut store), vec!["disk-full".to_string()]);
        assert!(engine.active_ids().is_empty());
        let a = store.server("a").unwrap();
        assert!(a.alerts.iter().all(|al| al.resolved));
    }

    #[test]
    fn library_validation() {
        let dup = ScenarioEngine::new(vec![disk_full(0.0), disk_full(0.5)], Duration::ZERO);
        assert!(matches!(dup, Err(ScenarioError::DuplicateScenario(_))));

        let bad_p = ScenarioEngine::new(vec![disk_full(1.5)], Duration::ZERO);
        assert!(matches!(bad_p, Err(ScenarioError::Config(_))));

        let mut unordered = disk_full(0.1);
        unordered.steps.reverse();
        assert!(matches!(
            ScenarioEngine::new(vec![unordered], Duration::ZERO),
            Err(ScenarioError::StepOrder { index: 1, .. })
        ));

        let empty = FailureScenario {
            steps: Vec::new(),
            ..disk_full(0.1)
        };
        assert!(matches!(
            ScenarioEngine::new(vec![empty], Duration::ZERO),
            Err(ScenarioError::NoSteps(_))
        ));
    }

    #[test]
    fn set_probability_validates() {
        let mut engine = engine(vec![disk_full(0.0)]);
        engine.set_probability("disk-full", 0.25).unwrap();
        assert_eq!(engine.library()[0].probability, 0.25);
        assert!(engine.set_probability("disk-full", -0.1).is_err());
        assert!(matches!(
            engine.set_probability("nope", 0.1),
            Err(ScenarioError::UnknownScenario(_))
        ));
    }

    #[test]
    fn default_library_is_valid() {
        ScenarioEngine::new(crate::default_library(), Duration::from_secs(10)).unwrap();
    }
}
