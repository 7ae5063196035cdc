//! Error types for Pulsewatch

use thiserror::Error;

/// Errors that can occur while monitoring or classifying
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Transport disconnected: {0}")]
    TransportDisconnected(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model bundle error: {0}")]
    ModelBundle(String),

    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Monitoring cancelled")]
    Cancelled,
}

impl MonitorError {
    /// Whether this error ends a monitoring run (as opposed to one questionnaire cycle)
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            MonitorError::Classifier(_) | MonitorError::SchemaMismatch(_)
        )
    }
}
