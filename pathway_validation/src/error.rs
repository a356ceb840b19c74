//! Error types for the validation engine.
//!
//! User-data problems (conflicting tags, missing requirements) are reported as
//! findings on the result, not through these types.

use thiserror::Error;

/// An internal invariant violation inside a validator.
///
/// The orchestrator converts these into a single `internal_fault` finding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFault {
    #[error("Cycle detection lost track of node '{0}'")]
    CycleTracking(String),

    #[error("Validator panicked: {0}")]
    Panic(String),

    #[error("Internal validation fault: {0}")]
    Internal(String),
}

/// Errors raised while loading a [`crate::ValidatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_messages() {
        let fault = ValidationFault::CycleTracking("b1".to_string());
        assert_eq!(fault.to_string(), "Cycle detection lost track of node 'b1'");

        let err = ConfigError::Invalid("cache capacity must be positive".to_string());
        assert!(err.to_string().contains("cache capacity"));
    }
}
