//! FleetStore: the single source of truth for simulated servers.
//!
//! Holds both pools, their alerts, the bounded scaling-event log and the
//! run metadata. The store itself is a plain struct; the engine guards it
//! with one mutex so every mutation below runs under exclusive access.
//!
//! Every metric change goes through [`FleetStore::apply_metric_update`],
//! which clamps, reclassifies and reconciles threshold alerts in one step,
//! so `status` can never disagree with the current metrics.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info};

use fleetsim_core::{
    Alert, AlertId, AlertKind, AlertOrigin, AlertTemplate, FleetView, MetricKind, PoolKind,
    PoolSummary, RunMetadata, ScalingEvent, ScenarioId, ServerEntity, ServerId, ServerMetrics,
    ServerSpec, ServerStatus, StatusThresholds,
};
use fleetsim_health::StatusClassifier;

use crate::error::{StateError, StateResult};

/// A change to a server's metric set.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricUpdate {
    /// Replace every metric (one generator tick).
    Replace(ServerMetrics),
    /// Override a single metric (a scenario step).
    Set(MetricKind, f64),
}

/// In-memory store for both server pools.
#[derive(Debug)]
pub struct FleetStore {
    analysis: Vec<ServerEntity>,
    operational: Vec<ServerEntity>,
    classifier: StatusClassifier,
    seeded: bool,
    next_alert_seq: u64,
    /// Most recent first.
    scaling_events: VecDeque<ScalingEvent>,
    event_capacity: usize,
    next_event_seq: u64,
    run: RunMetadata,
}

impl FleetStore {
    /// Create an empty store. `event_capacity` bounds the scaling log.
    pub fn new(classifier: StatusClassifier, event_capacity: usize) -> Self {
        Self {
            analysis: Vec::new(),
            operational: Vec::new(),
            classifier,
            seeded: false,
            next_alert_seq: 0,
            scaling_events: VecDeque::new(),
            event_capacity: event_capacity.max(1),
            next_event_seq: 0,
            run: RunMetadata::default(),
        }
    }

    pub fn classifier(&self) -> &StatusClassifier {
        &self.classifier
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Populate both pools.
    ///
    /// All ids are checked for collisions (within and across pools)
    /// before anything is inserted, so a failed call leaves the store
    /// empty.
    pub fn initialize(
        &mut self,
        analysis: &[ServerSpec],
        operational: &[ServerSpec],
        now: u64,
    ) -> StateResult<()> {
        if self.seeded {
            return Err(StateError::AlreadySeeded);
        }

        let mut seen = HashSet::new();
        for spec in analysis.iter().chain(operational) {
            if !seen.insert(spec.id.as_str()) {
                return Err(StateError::DuplicateServer(spec.id.clone()));
            }
        }

        for spec in analysis {
            let entity = self.build_entity(spec, now);
            self.analysis.push(entity);
        }
        for spec in operational {
            let entity = self.build_entity(spec, now);
            self.operational.push(entity);
        }
        self.seeded = true;

        info!(
            analysis = self.analysis.len(),
            operational = self.operational.len(),
            "fleet seeded"
        );
        Ok(())
    }

    /// Drop every server, alert and scaling event and return to the
    /// unseeded state.
    pub fn reset(&mut self) {
        self.analysis.clear();
        self.operational.clear();
        self.scaling_events.clear();
        self.seeded = false;
        self.next_alert_seq = 0;
        self.next_event_seq = 0;
        self.run = RunMetadata::default();
        debug!("fleet store reset");
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Deep copy of both pools plus run metadata.
    pub fn snapshot(&self) -> FleetView {
        FleetView {
            analysis: self.analysis.clone(),
            operational: self.operational.clone(),
            run: self.run.clone(),
        }
    }

    pub fn analysis(&self) -> &[ServerEntity] {
        &self.analysis
    }

    pub fn operational(&self) -> &[ServerEntity] {
        &self.operational
    }

    pub fn server(&self, id: &str) -> Option<&ServerEntity> {
        self.analysis
            .iter()
            .chain(self.operational.iter())
            .find(|s| s.id == id)
    }

    /// Which pool a server belongs to.
    pub fn pool_of(&self, id: &str) -> Option<PoolKind> {
        if self.analysis.iter().any(|s| s.id == id) {
            Some(PoolKind::Analysis)
        } else if self.operational.iter().any(|s| s.id == id) {
            Some(PoolKind::Operational)
        } else {
            None
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pool_of(id).is_some()
    }

    /// Ids of every server, analysis pool first.
    pub fn server_ids(&self) -> Vec<ServerId> {
        self.analysis
            .iter()
            .chain(self.operational.iter())
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn operational_summary(&self) -> PoolSummary {
        PoolSummary::from_servers(&self.operational)
    }

    // ── Metric and alert mutations ─────────────────────────────────

    /// Apply a metric change, reclassify and reconcile threshold alerts.
    ///
    /// Returns the server's new status.
    pub fn apply_metric_update(
        &mut self,
        server_id: &str,
        update: MetricUpdate,
        now: u64,
    ) -> StateResult<ServerStatus> {
        let classifier = &self.classifier;
        let seq = &mut self.next_alert_seq;
        let server = self
            .analysis
            .iter_mut()
            .chain(self.operational.iter_mut())
            .find(|s| s.id == server_id)
            .ok_or_else(|| StateError::NotFound(server_id.to_string()))?;

        match update {
            MetricUpdate::Replace(metrics) => server.metrics = metrics.clamped(),
            MetricUpdate::Set(metric, value) => server.metrics.set(metric, value),
        }

        let previous = server.status;
        server.status = classifier.classify(&server.metrics);
        server.last_updated = now;
        reconcile_threshold_alerts(classifier, seq, server, now);

        if server.status != previous {
            debug!(
                server = %server.id,
                from = ?previous,
                to = ?server.status,
                "status changed"
            );
        }
        Ok(server.status)
    }

    /// Attach an alert built from `template` to a server.
    pub fn append_alert(
        &mut self,
        server_id: &str,
        template: &AlertTemplate,
        origin: AlertOrigin,
        now: u64,
    ) -> StateResult<AlertId> {
        let seq = &mut self.next_alert_seq;
        let server = self
            .analysis
            .iter_mut()
            .chain(self.operational.iter_mut())
            .find(|s| s.id == server_id)
            .ok_or_else(|| StateError::NotFound(server_id.to_string()))?;

        let alert = new_alert(seq, &server.id, template, origin, now);
        let id = alert.id.clone();
        debug!(
            server = %server.id,
            alert = %id,
            kind = ?alert.kind,
            severity = ?alert.severity,
            "alert raised"
        );
        server.alerts.push(alert);
        Ok(id)
    }

    /// Mark an alert resolved. Resolving twice is a no-op.
    pub fn resolve_alert(&mut self, alert_id: &str) -> StateResult<()> {
        let alert = self
            .analysis
            .iter_mut()
            .chain(self.operational.iter_mut())
            .flat_map(|s| s.alerts.iter_mut())
            .find(|a| a.id == alert_id)
            .ok_or_else(|| StateError::AlertNotFound(alert_id.to_string()))?;
        alert.resolved = true;
        Ok(())
    }

    /// Remove resolved alerts from every server. Returns how many went.
    pub fn sweep_resolved_alerts(&mut self) -> usize {
        let mut removed = 0;
        for server in self.analysis.iter_mut().chain(self.operational.iter_mut()) {
            let before = server.alerts.len();
            server.alerts.retain(|a| !a.resolved);
            removed += before - server.alerts.len();
        }
        removed
    }

    // ── Operational pool structure ─────────────────────────────────

    /// Add a server to the operational pool. The id must be unused in
    /// both pools.
    pub fn add_operational(&mut self, spec: &ServerSpec, now: u64) -> StateResult<()> {
        if self.contains(&spec.id) {
            return Err(StateError::DuplicateServer(spec.id.clone()));
        }
        let entity = self.build_entity(spec, now);
        debug!(server = %entity.id, role = ?entity.role, "operational server added");
        self.operational.push(entity);
        Ok(())
    }

    /// Remove a server from the operational pool. Analysis servers can
    /// never be removed.
    pub fn remove_operational(&mut self, server_id: &str) -> StateResult<ServerEntity> {
        match self.operational.iter().position(|s| s.id == server_id) {
            Some(index) => {
                let entity = self.operational.remove(index);
                debug!(server = %entity.id, "operational server removed");
                Ok(entity)
            }
            None if self.analysis.iter().any(|s| s.id == server_id) => {
                Err(StateError::NotOperational(server_id.to_string()))
            }
            None => Err(StateError::NotFound(server_id.to_string())),
        }
    }

    // ── Scaling log ────────────────────────────────────────────────

    /// Append a scaling event. The store assigns its id; the oldest event
    /// is dropped once the log is full.
    pub fn record_scaling_event(&mut self, mut event: ScalingEvent) -> ScalingEvent {
        self.next_event_seq += 1;
        event.id = format!("scale-{}", self.next_event_seq);
        self.scaling_events.push_front(event.clone());
        self.scaling_events.truncate(self.event_capacity);
        event
    }

    /// Up to `limit` scaling events, most recent first.
    pub fn scaling_history(&self, limit: usize) -> Vec<ScalingEvent> {
        self.scaling_events.iter().take(limit).cloned().collect()
    }

    // ── Run metadata ───────────────────────────────────────────────

    pub fn run(&self) -> &RunMetadata {
        &self.run
    }

    pub fn begin_run(&mut self, now: u64) {
        self.run.running = true;
        self.run.started_at = Some(now);
        self.run.tick = 0;
        self.run.active_scenarios.clear();
    }

    pub fn finish_run(&mut self) {
        self.run.running = false;
        self.run.active_scenarios.clear();
    }

    /// Increment the tick counter and return the new value.
    pub fn advance_tick(&mut self) -> u64 {
        self.run.tick += 1;
        self.run.tick
    }

    pub fn set_active_scenarios(&mut self, ids: Vec<ScenarioId>) {
        self.run.active_scenarios = ids;
    }

    // ── Internal ───────────────────────────────────────────────────

    fn build_entity(&mut self, spec: &ServerSpec, now: u64) -> ServerEntity {
        let metrics = spec.metrics.clamped();
        let mut entity = ServerEntity {
            id: spec.id.clone(),
            hostname: spec.hostname.clone(),
            environment: spec.environment,
            role: spec.role,
            status: self.classifier.classify(&metrics),
            metrics,
            alerts: Vec::new(),
            last_updated: now,
        };
        reconcile_threshold_alerts(&self.classifier, &mut self.next_alert_seq, &mut entity, now);
        entity
    }
}

fn new_alert(
    seq: &mut u64,
    server_id: &str,
    template: &AlertTemplate,
    origin: AlertOrigin,
    now: u64,
) -> Alert {
    *seq += 1;
    Alert {
        id: format!("alert-{seq}"),
        server_id: server_id.to_string(),
        kind: template.kind,
        severity: template.severity,
        message: template.message.clone(),
        origin,
        created_at: now,
        resolved: false,
    }
}

/// Bring threshold alerts in line with the current metrics.
///
/// A breach raises an alert unless an unresolved alert of the same kind
/// (from any origin) is already at least as severe. Threshold alerts of a
/// kind are resolved once its metric is back below warning, or replaced
/// when the breach escalates.
fn reconcile_threshold_alerts(
    classifier: &StatusClassifier,
    seq: &mut u64,
    server: &mut ServerEntity,
    now: u64,
) {
    let breaches = classifier.breaches(&server.metrics);
    for metric in StatusThresholds::CLASSIFIED {
        let kind = metric.alert_kind();
        match breaches.iter().find(|b| b.metric == metric) {
            Some(breach) => {
                if server.open_alerts(kind).any(|a| a.severity >= breach.severity) {
                    continue;
                }
                resolve_threshold_alerts(server, kind);
                let template = AlertTemplate {
                    kind,
                    severity: breach.severity,
                    message: breach.describe(),
                };
                let alert = new_alert(seq, &server.id, &template, AlertOrigin::Threshold, now);
                server.alerts.push(alert);
            }
            None => resolve_threshold_alerts(server, kind),
        }
    }
}

fn resolve_threshold_alerts(server: &mut ServerEntity, kind: AlertKind) {
    for alert in server
        .alerts
        .iter_mut()
        .filter(|a| a.kind == kind && !a.resolved && a.origin == AlertOrigin::Threshold)
    {
        alert.resolved = true;
    }
}
