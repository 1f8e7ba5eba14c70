//! Hand-off of comparison prompts to an external text-generation service.

use crate::store::LoadedArtifact;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "ministral-3";
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(180);

/// Produces free-text analysis for a prompt.
///
/// `None` means no analysis was produced (unavailable, failed, timed out or
/// empty). Callers record a placeholder and carry on; retries are the
/// implementor's business.
pub trait AnalysisDispatcher {
    fn analyze(&self, prompt: &str) -> Option<String>;

    /// Shown in the analysis report header.
    fn describe(&self) -> String;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama `/api/generate`, non-streaming, bounded by a global timeout.
pub struct OllamaAnalyzer {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
}

impl OllamaAnalyzer {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String, ureq::Error> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let mut response = self.agent.post(&url).send_json(&body)?;
        let reply: GenerateResponse = response.body_mut().read_json()?;
        Ok(reply.response)
    }
}

impl AnalysisDispatcher for OllamaAnalyzer {
    fn analyze(&self, prompt: &str) -> Option<String> {
        debug!(model = %self.model, endpoint = %self.endpoint, prompt_len = prompt.len(), "requesting analysis");
        match self.generate(prompt) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!(model = %self.model, "analysis returned an empty response");
                None
            }
            Err(error) => {
                warn!(model = %self.model, endpoint = %self.endpoint, %error, "analysis call failed");
                None
            }
        }
    }

    fn describe(&self) -> String {
        format!("OLLAMA ({})", self.model)
    }
}

/// Model used for analysis: explicit setting, else the first artifact that
/// names one, else [`DEFAULT_OLLAMA_MODEL`].
pub fn pick_model(configured: Option<&str>, artifacts: &[LoadedArtifact]) -> String {
    configured
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            artifacts
                .iter()
                .find_map(|a| a.artifact.test_info.model.clone())
                .filter(|m| !m.trim().is_empty())
        })
        .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string())
}
