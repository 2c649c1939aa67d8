//! Error types for the cough survey wizard.

use std::path::PathBuf;

use crate::wizard::validation::StepValidation;

/// Top-level error type for the wizard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("View error: {0}")]
    View(#[from] ViewError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Answer store persistence errors.
///
/// These never reach `AnswerStore` callers; the file store logs them and
/// keeps serving the in-memory record.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Step registry construction errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry has no steps")]
    Empty,

    #[error("Duplicate step route: {0}")]
    DuplicateRoute(String),

    #[error("Step {from} points at unknown route {target}")]
    DanglingTarget { from: String, target: String },
}

/// Errors raised while driving a mounted step.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Step {route} is no longer active")]
    Inactive { route: String },

    #[error("Step {route} has {count} invalid field(s)", count = .validation.field_errors.len())]
    Invalid {
        route: String,
        validation: StepValidation,
    },

    #[error("Step {route} has no next step")]
    NoNextStep { route: String },

    #[error("Step {route} has no detour named {name}")]
    UnknownDetour { route: String, name: String },

    #[error("No step registered for route {0}")]
    UnknownRoute(String),

    #[error("No history to go back to from {route}")]
    NoHistory { route: String },
}

/// View renderer errors.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the wizard.
pub type Result<T> = std::result::Result<T, Error>;
