//! Error types for the failure scenario engine.

use thiserror::Error;

use fleetsim_core::ConfigError;

/// Result type alias for scenario operations.
pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("scenario {0} is already active")]
    AlreadyActive(String),

    #[error("scenario id {0} is defined twice")]
    DuplicateScenario(String),

    #[error("scenario {0} has no steps")]
    NoSteps(String),

    #[error("scenario {scenario}: step {index} fires before the step preceding it")]
    StepOrder { scenario: String, index: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
