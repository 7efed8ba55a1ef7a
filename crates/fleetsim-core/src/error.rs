//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration parsing and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A configuration value was rejected. The previously active
/// configuration stays in effect.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{metric} thresholds out of order: warning {warning} must be below critical {critical}")]
    ThresholdOrder {
        metric: &'static str,
        warning: f64,
        critical: f64,
    },

    #[error("{field} must be a percentage in 0..=100, got {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },

    #[error("scale-in threshold {scale_in} must be below scale-out threshold {scale_out}")]
    ScalingThresholdOrder { scale_in: f64, scale_out: f64 },

    #[error("min_servers {min} exceeds max_servers {max}")]
    ServerBounds { min: usize, max: usize },

    #[error("{field} must be at least 1")]
    Zero { field: &'static str },

    #[error("{field} must be a finite, non-negative number, got {value}")]
    InvalidNumber { field: &'static str, value: f64 },

    #[error("{field} drift {value} exceeds the metric range width {max}")]
    DriftTooWide {
        field: &'static str,
        value: f64,
        max: f64,
    },

    #[error("operational seed fleet has {count} servers, outside min_servers {min} .. max_servers {max}")]
    SeedOutOfBounds { count: usize, min: usize, max: usize },

    #[error("probability for scenario {scenario} must be in 0.0..=1.0, got {value}")]
    Probability { scenario: String, value: f64 },

    #[error("invalid duration: {0:?}")]
    Duration(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}
