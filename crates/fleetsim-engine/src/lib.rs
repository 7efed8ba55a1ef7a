//! fleetsim-engine: simulation loop, scaling loop and read views.
//!
//! [`FleetEngine`] is the facade callers own. It runs two tokio tasks over
//! one shared core:
//!
//! ```text
//! FleetEngine
//!   ├── Arc<Mutex<SimulationCore>>
//!   │     ├── FleetStore      (both pools, alerts, scaling log)
//!   │     ├── ScenarioEngine  (cascading failure injection)
//!   │     ├── Autoscaler      (operational pool policy)
//!   │     ├── MetricGenerator
//!   │     └── StdRng          (seeded or from entropy)
//!   ├── tick driver    every tick_interval   → run_tick
//!   ├── policy driver  every policy_interval → evaluate_policy
//!   └── DualPoolManager (read-only copies for consumers)
//! ```
//!
//! Both drivers stop on a `watch` shutdown signal; `stop` waits for them.

pub mod engine;
pub mod error;
pub mod pools;
pub mod simulation;

pub use engine::FleetEngine;
pub use error::{EngineError, EngineResult};
pub use pools::DualPoolManager;
pub use simulation::{SimulationCore, TickReport};
