//! Error types for gapsim.
//!
//! All fallible operations return `Result<T, SimError>`. Physics and sensor
//! failures propagate to the caller unchanged; only the batch and adversarial
//! evaluators catch per-episode errors (partial-failure isolation).

use thiserror::Error;

/// Result type alias for gapsim operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all gapsim operations.
#[derive(Debug, Error)]
pub enum SimError {
    /// Physics engine failure.
    #[error("Physics error: {0}")]
    Physics(String),

    /// Sensor model failure.
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Unknown noise distribution identifier. Raised at sampler construction,
    /// never at sampling time.
    #[error("Unknown noise distribution '{0}'")]
    UnknownDistribution(String),

    /// Invalid noise sampler configuration (e.g. negative coupling).
    #[error("Noise configuration error: {message}")]
    NoiseConfig {
        /// Description of the invalid parameter.
        message: String,
    },

    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Replay bundle cannot be driven (mode/state mismatch).
    #[error("Replay error: {0}")]
    Replay(String),

    /// Evaluation-layer failure.
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl SimError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a physics error.
    #[must_use]
    pub fn physics(message: impl Into<String>) -> Self {
        Self::Physics(message.into())
    }

    /// Create a sensor error.
    #[must_use]
    pub fn sensor(message: impl Into<String>) -> Self {
        Self::Sensor(message.into())
    }

    /// Create a noise configuration error.
    #[must_use]
    pub fn noise_config(message: impl Into<String>) -> Self {
        Self::NoiseConfig {
            message: message.into(),
        }
    }

    /// Create a replay error.
    #[must_use]
    pub fn replay(message: impl Into<String>) -> Self {
        Self::Replay(message.into())
    }

    /// Create an evaluation error.
    #[must_use]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }
}
