//! Character extraction stage.

use super::PipelineConfig;
use crate::character::{dedup_candidates, CharacterRecord};
use crate::extract::parse_json;
use crate::model::Model;
use gemini::{Content, Request};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the extraction stage.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("API error: {0}")]
    Api(#[from] gemini::Error),

    #[error("Model output was not usable: {0}")]
    Malformed(String),
}

/// What the model is asked to return, one entry per character.
#[derive(Debug, Deserialize)]
struct ExtractedCharacter {
    full_name: String,
    #[serde(default)]
    events: Vec<String>,
    #[serde(default)]
    characteristics: Vec<String>,
    #[serde(default)]
    occupation: Option<String>,
    #[serde(default)]
    relationships: BTreeMap<String, String>,
    /// Source quotes backing the extraction. Prompted for to keep the
    /// model honest, then dropped; verdicts come from the validator.
    #[serde(default)]
    #[allow(dead_code)]
    evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractionReply {
    #[serde(default)]
    characters: Vec<ExtractedCharacter>,
}

/// First pipeline stage: ask the model for character candidates.
pub struct Extractor {
    model: Arc<dyn Model>,
    config: PipelineConfig,
}

impl Extractor {
    pub fn new(model: Arc<dyn Model>, config: PipelineConfig) -> Self {
        Self { model, config }
    }

    /// Extract character candidates from one chunk of narrative text.
    ///
    /// Candidates sharing a `full_name` are merged into one record.
    /// Zero candidates is a valid result, not an error.
    pub async fn extract(
        &self,
        text: &str,
        title: Option<&str>,
    ) -> Result<Vec<CharacterRecord>, ExtractionError> {
        let user_message = match title {
            Some(title) => format!("소설 제목: {title}\n\n{text}"),
            None => text.to_string(),
        };

        let mut request = Request::new(vec![Content::user(user_message)])
            .with_system(include_str!("prompts/extractor.txt"))
            .with_max_tokens(self.config.max_tokens);
        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.model.complete(request).await?;
        let reply: ExtractionReply =
            parse_json(&response.text()).map_err(ExtractionError::Malformed)?;

        let mut candidates: Vec<CharacterRecord> = reply
            .characters
            .into_iter()
            .filter(|c| !c.full_name.trim().is_empty())
            .map(|c| CharacterRecord {
                full_name: c.full_name,
                events: c.events,
                characteristics: c.characteristics,
                occupation: c.occupation,
                relationships: c.relationships,
                novel_title: title.map(String::from),
            })
            .collect();
        candidates = dedup_candidates(candidates);

        tracing::debug!(
            model = self.model.name(),
            count = candidates.len(),
            "extraction produced candidates"
        );
        Ok(candidates)
    }
}
