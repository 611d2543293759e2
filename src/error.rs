//! Error types shared across the simulator.

use thiserror::Error;

/// Errors that may occur when evaluating water/steam properties.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    /// The state lies outside the range the property formulation covers.
    #[error("out of domain: {context}")]
    OutOfDomain { context: String },

    /// The formulation returned a non-finite or non-physical value.
    #[error("calculation error: {context}")]
    Calculation { context: String },
}

/// Errors raised while loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error (toml): {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config parse error (json): {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range or thresholds are ordered inconsistently.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors surfaced by the simulation engine and its host.
#[derive(Debug, Error)]
pub enum SimError {
    /// A previous step failed part-way; the engine must not keep stepping.
    #[error("engine corrupted: {0}")]
    Corrupted(String),

    /// A cross-component handshake was misused (e.g. a second pre-applied delta).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Step inputs were not usable (non-finite or non-positive timestep, etc.).
    #[error("invalid step input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Initial conditions could not be evaluated.
    #[error("initial state: {0}")]
    Property(#[from] PropertyError),

    /// The worker thread running a step did not complete.
    #[error("worker failed: {0}")]
    Worker(String),
}
