//! Engine error types.

use thiserror::Error;

use fleetsim_core::ConfigError;
use fleetsim_scenario::ScenarioError;
use fleetsim_state::StateError;

/// Errors returned by the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("simulation is already running")]
    AlreadyRunning,

    #[error("simulation is not running")]
    NotRunning,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("fleet store error: {0}")]
    State(#[from] StateError),

    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),
}

pub type EngineResult<T> = Result<T, EngineError>;
