use thiserror::Error;

/// Errors raised by collaborators: run stores, LLM providers and progress
/// hubs. The orchestrator maps them into `WorkflowError` at its boundary.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A run or step run id that is not a UUID
    #[error("Invalid ID format: {message}")]
    InvalidId { message: String },

    /// Transport, HTTP status or response-shape failure from an LLM backend
    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    /// The model answered, but not in the format the request asked for
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// The caller's cancellation signal fired before the request went out
    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Duplicate run id or `(run_id, step_name)` pair
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Progress delivery failed; logged and dropped by the reporter
    #[error("Notification error: {message}")]
    Notification { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn notification(message: impl Into<String>) -> Self {
        Self::Notification {
            message: message.into(),
        }
    }
}
