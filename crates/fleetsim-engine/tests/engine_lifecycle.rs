//! Lifecycle tests for the engine facade with real (short) intervals.

use std::time::Duration;

use fleetsim_core::{EngineConfig, PolicyUpdate, ScalingTrigger, SeedFleet};
use fleetsim_engine::{EngineError, FleetEngine};

fn fast_config() -> EngineConfig {
    EngineConfig {
        tick_interval: Duration::from_millis(10),
        policy_interval: Duration::from_millis(25),
        seed: Some(42),
        ..EngineConfig::default()
    }
}

async fn wait_for_tick(engine: &FleetEngine, at_least: u64) -> u64 {
    for _ in 0..200 {
        let tick = engine.snapshot().await.run.tick;
        if tick >= at_least {
            return tick;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("engine never reached tick {at_least}");
}

#[tokio::test]
async fn second_start_is_rejected_and_keeps_tick() {
    let engine = FleetEngine::new(fast_config()).unwrap();
    engine.start().await.unwrap();
    let before = wait_for_tick(&engine, 3).await;

    assert!(matches!(engine.start().await, Err(EngineError::AlreadyRunning)));
    let after = engine.snapshot().await.run.tick;
    assert!(after >= before);

    engine.stop().await.unwrap();
}

#[tokio::test]
async fn stop_twice_is_rejected() {
    let engine = FleetEngine::new(fast_config()).unwrap();
    assert!(matches!(engine.stop().await, Err(EngineError::NotRunning)));

    engine.start().await.unwrap();
    engine.stop().await.unwrap();
    assert!(!engine.is_running().await);
    assert!(matches!(engine.stop().await, Err(EngineError::NotRunning)));
}

#[tokio::test]
async fn store_stays_readable_after_stop() {
    let engine = FleetEngine::new(fast_config()).unwrap();
    engine.start().await.unwrap();
    wait_for_tick(&engine, 2).await;
    engine.stop().await.unwrap();

    let view = engine.snapshot().await;
    assert!(!view.run.running);
    assert!(view.run.active_scenarios.is_empty());
    assert_eq!(view.analysis.len(), SeedFleet::default().analysis.len());

    // Ticks no longer advance.
    let frozen = view.run.tick;
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(engine.snapshot().await.run.tick, frozen);
}

#[tokio::test]
async fn restart_resets_tick_but_keeps_fleet() {
    let engine = FleetEngine::new(fast_config()).unwrap();
    engine.start().await.unwrap();
    wait_for_tick(&engine, 2).await;
    engine.stop().await.unwrap();
    engine.scale_operational(9).await.unwrap();

    engine.start().await.unwrap();
    let view = engine.snapshot().await;
    assert!(view.run.running);
    assert!(view.run.tick <= 1);
    assert!(view.operational.len() >= 3);
    assert_eq!(engine.scaling_history(10).await[0].trigger, ScalingTrigger::Manual);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn reset_requires_stopped_engine() {
    let engine = FleetEngine::new(fast_config()).unwrap();
    engine.start().await.unwrap();
    assert!(matches!(engine.reset().await, Err(EngineError::AlreadyRunning)));
    engine.stop().await.unwrap();

    engine.reset().await.unwrap();
    let view = engine.snapshot().await;
    assert!(view.analysis.is_empty());
    assert!(view.operational.is_empty());
}

#[tokio::test]
async fn scenario_injection_requires_running_engine() {
    let engine = FleetEngine::new(fast_config()).unwrap();
    assert!(matches!(
        engine.inject_scenario("disk-full-cascade").await,
        Err(EngineError::NotRunning)
    ));

    engine.start().await.unwrap();
    assert_eq!(engine.inject_scenario("disk-full-cascade").await.unwrap(), 1);
    assert!(matches!(
        engine.inject_scenario("disk-full-cascade").await,
        Err(EngineError::Scenario(_))
    ));
    assert!(matches!(
        engine.inject_scenario("no-such-scenario").await,
        Err(EngineError::Scenario(_))
    ));
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn injection_after_stop_is_rejected_and_restart_is_clean() {
    let engine = FleetEngine::new(fast_config()).unwrap();
    engine.start().await.unwrap();
    wait_for_tick(&engine, 5).await;
    engine.stop().await.unwrap();

    assert!(matches!(
        engine.inject_scenario("disk-full-cascade").await,
        Err(EngineError::NotRunning)
    ));
    assert!(engine.snapshot().await.run.active_scenarios.is_empty());

    engine.start().await.unwrap();
    assert_eq!(engine.inject_scenario("disk-full-cascade").await.unwrap(), 1);
    assert!(
        engine
            .snapshot()
            .await
            .run
            .active_scenarios
            .contains(&"disk-full-cascade".to_string())
    );
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn policy_update_is_validated() {
    let engine = FleetEngine::new(fast_config()).unwrap();
    let bad = PolicyUpdate {
        min_servers: Some(100),
        ..PolicyUpdate::default()
    };
    assert!(matches!(
        engine.update_scaling_policy(bad).await,
        Err(EngineError::Config(_))
    ));
    assert_eq!(engine.scaling_policy().await.min_servers, 3);

    let good = PolicyUpdate {
        max_servers: Some(12),
        ..PolicyUpdate::default()
    };
    assert_eq!(engine.update_scaling_policy(good).await.unwrap().max_servers, 12);
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = fast_config();
    config.scaling.min_servers = 40;
    assert!(matches!(FleetEngine::new(config), Err(EngineError::Config(_))));
}

#[tokio::test]
async fn pool_manager_reads_both_pools() {
    let engine = FleetEngine::new(fast_config()).unwrap();
    engine.start().await.unwrap();
    wait_for_tick(&engine, 1).await;

    let pools = engine.pools();
    let analysis = pools.analysis_targets().await;
    let seed = SeedFleet::default();
    let ids: Vec<_> = analysis.iter().map(|s| s.id.as_str()).collect();
    let expected: Vec<_> = seed.analysis.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, expected);

    let view = pools.aggregated_view().await;
    assert_eq!(view.analysis_targets.len(), seed.analysis.len());
    assert_eq!(
        view.operational_summary.total_servers,
        pools.operational_servers().await.len()
    );
    assert!(view.recent_scaling_events.len() <= 10);

    engine.stop().await.unwrap();
}
