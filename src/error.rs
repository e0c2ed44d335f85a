//! Custom error types and handling
//!
//! Fatal conditions abort a benchmark run before any record is produced.
//! Per-sample failures (timeouts, crashes) are not errors: they are recorded
//! as [`crate::models::ExecutionOutcome`] values.

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Run-aborting benchmark errors
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Compilation error: {0}")]
    Compilation(String),

    // External service errors
    #[error("Docker error: {0}")]
    Docker(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    // Validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Provisioning(_) => "PROVISIONING_ERROR",
            Self::Compilation(_) => "COMPILATION_ERROR",
            Self::Docker(_) => "DOCKER_ERROR",
            Self::Workspace(_) => "WORKSPACE_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error was raised before any sample was measured
    pub fn is_pre_measurement(&self) -> bool {
        matches!(
            self,
            Self::Provisioning(_) | Self::Compilation(_) | Self::Workspace(_)
        )
    }
}

impl From<bollard::errors::Error> for AppError {
    fn from(err: bollard::errors::Error) -> Self {
        AppError::Docker(err.to_string())
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Provisioning("build failed".into()).error_code(),
            "PROVISIONING_ERROR"
        );
        assert_eq!(
            AppError::Compilation("syntax".into()).error_code(),
            "COMPILATION_ERROR"
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_pre_measurement_errors() {
        assert!(AppError::Provisioning("x".into()).is_pre_measurement());
        assert!(AppError::Compilation("x".into()).is_pre_measurement());
        assert!(!AppError::Docker("x".into()).is_pre_measurement());
    }

    #[test]
    fn test_io_conversion() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(err.to_string().contains("gone"));
    }
}
