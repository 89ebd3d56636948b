//! Stage generator — one provider call per stage artifact.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::GuideConfig;
use crate::error::{LlmError, StageError};
use crate::intake::Profile;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

use super::prompts::{profile_context, stage_instruction};
use super::state::{Horizon, Stage};

/// Configuration for artifact generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// LLM temperature for every stage.
    pub temperature: f32,
    /// Max tokens for LLM response.
    pub max_tokens: u32,
    /// Upper bound on a single provider call.
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&GuideConfig> for GeneratorConfig {
    fn from(config: &GuideConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.request_timeout,
        }
    }
}

/// Turns a profile (and horizon) into a stage artifact using an LLM.
pub struct StageGenerator {
    llm: Arc<dyn LlmProvider>,
    config: GeneratorConfig,
}

impl StageGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Compose the request for `stage`: the stage's system instruction plus
    /// the serialized profile as the user message.
    pub fn build_request(
        &self,
        stage: Stage,
        profile: &Profile,
        horizon: Option<Horizon>,
    ) -> CompletionRequest {
        CompletionRequest::new(vec![
            ChatMessage::system(stage_instruction(stage)),
            ChatMessage::user(profile_context(profile, horizon)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
    }

    /// Issue exactly one provider request for `stage`.
    ///
    /// Transport errors, timeouts and blank responses all come back as
    /// `StageError::ProviderFailure`. Nothing is retried here.
    pub async fn generate(
        &self,
        stage: Stage,
        profile: &Profile,
        horizon: Option<Horizon>,
    ) -> Result<String, StageError> {
        let request = self.build_request(stage, profile, horizon);
        info!(
            stage = %stage,
            horizon = ?horizon,
            model = self.llm.model_name(),
            "Requesting stage artifact"
        );

        let result = tokio::time::timeout(self.config.timeout, self.llm.complete(request))
            .await
            .unwrap_or_else(|_| {
                Err(LlmError::Timeout {
                    provider: self.llm.model_name().to_string(),
                    timeout: self.config.timeout,
                })
            });

        let response = result.map_err(|e| {
            warn!(stage = %stage, error = %e, "Stage request failed");
            StageError::provider(stage, e)
        })?;

        let text = response.content.trim();
        if text.is_empty() {
            warn!(stage = %stage, "Stage request returned no text");
            return Err(StageError::provider(
                stage,
                LlmError::EmptyResponse {
                    provider: self.llm.model_name().to_string(),
                },
            ));
        }

        debug!(
            stage = %stage,
            chars = text.len(),
            output_tokens = response.output_tokens,
            "Stage artifact received"
        );
        Ok(text.to_string())
    }
}
