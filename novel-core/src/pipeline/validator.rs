//! Judge stage.
//!
//! A second model pass checks each extracted candidate against the
//! source text. Validation is fail-closed: a candidate only reaches the
//! store with an explicit PASS, so a missing or unmatched verdict
//! becomes a FAIL rather than a silent save.

use super::PipelineConfig;
use crate::character::CharacterRecord;
use crate::extract::parse_json;
use crate::model::Model;
use gemini::{Content, Request};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors from the validation stage.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("API error: {0}")]
    Api(#[from] gemini::Error),

    #[error("Model output was not usable: {0}")]
    Malformed(String),

    #[error("Candidate list could not be serialized: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// The judge's call on one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

/// One candidate's verdict with the judge's reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub full_name: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Deserialize)]
struct ValidationReply {
    #[serde(default)]
    verdicts: Vec<ValidationVerdict>,
}

/// Second pipeline stage: judge candidates against the source text.
pub struct Validator {
    model: Arc<dyn Model>,
    config: PipelineConfig,
}

impl Validator {
    pub fn new(model: Arc<dyn Model>, config: PipelineConfig) -> Self {
        Self { model, config }
    }

    /// Judge each candidate against the source text.
    ///
    /// Returns exactly one verdict per candidate, in candidate order.
    /// Verdicts are matched to candidates by `full_name`; a candidate
    /// the judge did not rule on gets a FAIL. An empty candidate list
    /// skips the model call entirely.
    pub async fn validate(
        &self,
        text: &str,
        candidates: &[CharacterRecord],
    ) -> Result<Vec<ValidationVerdict>, ValidationError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let candidate_json = serde_json::to_string_pretty(candidates)?;
        let user_message = format!(
            "## 소설 원문\n{text}\n\n## 추출된 등장인물 후보\n```json\n{candidate_json}\n```"
        );

        let mut request = Request::new(vec![Content::user(user_message)])
            .with_system(include_str!("prompts/validator.txt"))
            .with_max_tokens(self.config.max_tokens);
        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.model.complete(request).await?;
        let mut reply: ValidationReply =
            parse_json(&response.text()).map_err(ValidationError::Malformed)?;

        // Align to candidate order by name. First matching verdict
        // wins; extras and unknown names are dropped.
        let mut aligned = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let position = reply
                .verdicts
                .iter()
                .position(|v| v.full_name == candidate.full_name);
            let verdict = match position {
                Some(i) => reply.verdicts.remove(i),
                None => {
                    tracing::warn!(
                        full_name = %candidate.full_name,
                        "judge returned no verdict, failing closed"
                    );
                    ValidationVerdict {
                        full_name: candidate.full_name.clone(),
                        verdict: Verdict::Fail,
                        rationale: "no verdict returned for this candidate".to_string(),
                    }
                }
            };
            aligned.push(verdict);
        }

        let passed = aligned.iter().filter(|v| v.verdict == Verdict::Pass).count();
        tracing::debug!(
            model = self.model.name(),
            candidates = candidates.len(),
            passed,
            "validation complete"
        );
        Ok(aligned)
    }
}
