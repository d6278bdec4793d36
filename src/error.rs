//! Error types for the tenant reconciler.
//!
//! Component-specific errors (`StoreError`, `ProbeError`, `OidcConfigError`,
//! `ClientError`) live next to the code that produces them. `ReconcilerError`
//! covers construction, registration and dispatch failures that surface at
//! startup or to the owner of the listen loop.

use crate::config::ConfigurationError;
use crate::dispatch::ActionType;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Missing dependency: {0} is required")]
    MissingDependency(&'static str),
    #[error("Unknown action type: {0}")]
    UnknownAction(String),
    #[error("Handler already registered for action {0}")]
    DuplicateHandler(ActionType),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

impl From<ConfigurationError> for ReconcilerError {
    fn from(error: ConfigurationError) -> Self {
        ReconcilerError::Configuration(error.to_string())
    }
}

impl From<sqlx::Error> for ReconcilerError {
    fn from(error: sqlx::Error) -> Self {
        ReconcilerError::Store(StoreError::from(error))
    }
}

pub type Result<T> = std::result::Result<T, ReconcilerError>;
