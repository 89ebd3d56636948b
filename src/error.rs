//! Error types for Astro Guide.

use std::time::Duration;

use crate::stages::Stage;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },
}

/// Content-generation stage errors.
///
/// Every provider failure shape (transport error, timeout, empty text) is
/// collapsed into `ProviderFailure`; the caller has a single remediation,
/// which is an explicit retry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    #[error("Stage {stage} failed: {reason}")]
    ProviderFailure { stage: Stage, reason: String },
}

impl StageError {
    /// Collapse any provider error into a stage failure.
    pub fn provider(stage: Stage, err: impl std::fmt::Display) -> Self {
        Self::ProviderFailure {
            stage,
            reason: err.to_string(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::ProviderFailure { stage, .. } => *stage,
        }
    }
}

/// Session sequencing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A caller asked for a transition the current state does not allow,
    /// e.g. `advance` before the active stage succeeded.
    #[error("Invalid transition: cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    /// Pipeline operation requested before intake has handed off a profile.
    #[error("Pipeline not started: intake is still in progress")]
    NotReady,
}

impl SessionError {
    pub fn invalid(action: impl Into<String>, state: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            action: action.into(),
            state: state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failure_keeps_stage_and_reason() {
        let err = StageError::provider(
            Stage::Roadmap,
            LlmError::EmptyResponse {
                provider: "stub".to_string(),
            },
        );
        assert_eq!(err.stage(), Stage::Roadmap);
        let msg = err.to_string();
        assert!(msg.contains("roadmap"));
        assert!(msg.contains("empty response"));
    }

    #[test]
    fn invalid_transition_message() {
        let err = SessionError::invalid("advance", "pending");
        assert_eq!(
            err.to_string(),
            "Invalid transition: cannot advance while pending"
        );
    }
}
