//! The novel analysis pipeline.
//!
//! Three stages run in sequence over a chunk of narrative text:
//! [`Extractor`] asks the model for character candidates, [`Validator`]
//! asks a second model pass to judge each candidate against the source
//! text, and [`Persister`] writes the survivors to the store without any
//! model involvement. Each stage consumes the previous stage's output
//! through the [`StageData`] envelope, so the stages stay individually
//! runnable and testable.

mod extractor;
mod persister;
mod validator;

pub use extractor::{ExtractionError, Extractor};
pub use persister::{PersistFailure, Persister};
pub use validator::{ValidationError, ValidationVerdict, Validator, Verdict};

use crate::character::CharacterRecord;
use crate::model::Model;
use crate::store::{CharacterStore, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Configuration shared by the model-backed stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens for responses.
    pub max_tokens: u32,

    /// Temperature for generation. Extraction and validation want
    /// determinism, so the default is low.
    pub temperature: Option<f32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 8192,
            temperature: Some(0.2),
        }
    }
}

/// One record that did not make it into the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub full_name: String,
    pub reason: String,
}

/// What a pipeline run accomplished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Candidates the extractor produced, after same-name merging.
    pub candidates_extracted: usize,

    /// Candidates the validator judged PASS.
    pub validated: usize,

    /// Records actually written to the store.
    pub saved: usize,

    /// Per-record reasons for everything extracted but not saved.
    pub failures: Vec<RecordFailure>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extracted {}, validated {}, saved {}",
            self.candidates_extracted, self.validated, self.saved
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.full_name, failure.reason)?;
        }
        Ok(())
    }
}

/// Errors from a single pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Stage {stage} expected {expected} input, got {got}")]
    InputMismatch {
        stage: &'static str,
        expected: &'static str,
        got: &'static str,
    },
}

/// A stage error together with what the run had accomplished before it.
#[derive(Debug)]
pub struct StageFailure {
    pub error: StageError,
    pub partial: RunSummary,
}

/// Why a pipeline run stopped early. `summary` reports progress up to
/// the failing stage, so callers can see what was already persisted.
#[derive(Debug, Error)]
#[error("{error} (after: {summary})")]
pub struct PipelineError {
    pub error: StageError,
    pub summary: RunSummary,
}

/// The payload handed from one stage to the next.
#[derive(Debug)]
pub enum StageData {
    /// Raw narrative text, optionally tagged with its novel's title.
    Source {
        text: String,
        title: Option<String>,
    },

    /// Extracted candidates, plus the source text the validator needs.
    Candidates {
        text: String,
        candidates: Vec<CharacterRecord>,
    },

    /// One verdict per candidate, in candidate order.
    Verdicts {
        candidates: Vec<CharacterRecord>,
        verdicts: Vec<ValidationVerdict>,
    },

    /// Final report from the persister.
    Report(RunSummary),
}

impl StageData {
    fn kind(&self) -> &'static str {
        match self {
            StageData::Source { .. } => "source text",
            StageData::Candidates { .. } => "candidates",
            StageData::Verdicts { .. } => "verdicts",
            StageData::Report(_) => "report",
        }
    }
}

/// A pipeline stage. All three run through the same `run` signature so
/// the pipeline can thread [`StageData`] through them uniformly.
pub enum PipelineStage {
    Extract(Extractor),
    Validate(Validator),
    Persist(Persister),
}

impl PipelineStage {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Extract(_) => "extract",
            PipelineStage::Validate(_) => "validate",
            PipelineStage::Persist(_) => "persist",
        }
    }

    /// Run this stage over the previous stage's output.
    pub async fn run(&self, data: StageData) -> Result<StageData, StageFailure> {
        match (self, data) {
            (PipelineStage::Extract(extractor), StageData::Source { text, title }) => {
                let candidates = extractor
                    .extract(&text, title.as_deref())
                    .await
                    .map_err(|e| StageFailure {
                        error: e.into(),
                        partial: RunSummary::default(),
                    })?;
                Ok(StageData::Candidates { text, candidates })
            }
            (PipelineStage::Validate(validator), StageData::Candidates { text, candidates }) => {
                let verdicts =
                    validator
                        .validate(&text, &candidates)
                        .await
                        .map_err(|e| StageFailure {
                            error: e.into(),
                            partial: RunSummary {
                                candidates_extracted: candidates.len(),
                                ..RunSummary::default()
                            },
                        })?;
                Ok(StageData::Verdicts {
                    candidates,
                    verdicts,
                })
            }
            (
                PipelineStage::Persist(persister),
                StageData::Verdicts {
                    candidates,
                    verdicts,
                },
            ) => {
                let summary = persister
                    .persist(&candidates, &verdicts)
                    .map_err(|failure| StageFailure {
                        error: failure.error.into(),
                        partial: failure.partial,
                    })?;
                Ok(StageData::Report(summary))
            }
            (stage, data) => Err(StageFailure {
                error: StageError::InputMismatch {
                    stage: stage.name(),
                    expected: stage.expected_input(),
                    got: data.kind(),
                },
                partial: RunSummary::default(),
            }),
        }
    }

    fn expected_input(&self) -> &'static str {
        match self {
            PipelineStage::Extract(_) => "source text",
            PipelineStage::Validate(_) => "candidates",
            PipelineStage::Persist(_) => "verdicts",
        }
    }
}

/// The extract, validate, persist sequence as a single runnable unit.
pub struct Pipeline {
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    /// Build the standard three-stage pipeline.
    pub fn new(model: Arc<dyn Model>, store: Arc<CharacterStore>) -> Self {
        Self::with_config(model, store, PipelineConfig::default())
    }

    /// Build the standard pipeline with custom model settings.
    pub fn with_config(
        model: Arc<dyn Model>,
        store: Arc<CharacterStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            stages: vec![
                PipelineStage::Extract(Extractor::new(model.clone(), config.clone())),
                PipelineStage::Validate(Validator::new(model, config)),
                PipelineStage::Persist(Persister::new(store)),
            ],
        }
    }

    /// Analyze one chunk of narrative text end to end.
    ///
    /// Runs extraction, validation, and persistence in order and
    /// returns the run report. A run that extracts zero candidates is
    /// a normal completed run with an all-zero summary. A stage error
    /// stops the run; the returned [`PipelineError`] carries the
    /// progress made before the failure. There are no retries.
    pub async fn analyze(
        &self,
        text: &str,
        title: Option<&str>,
    ) -> Result<RunSummary, PipelineError> {
        let mut data = StageData::Source {
            text: text.to_string(),
            title: title.map(String::from),
        };

        for stage in &self.stages {
            tracing::info!(stage = stage.name(), "running pipeline stage");
            data = stage.run(data).await.map_err(|failure| PipelineError {
                error: failure.error,
                summary: failure.partial,
            })?;
        }

        match data {
            StageData::Report(summary) => {
                tracing::info!(%summary, "pipeline run complete");
                Ok(summary)
            }
            other => Err(PipelineError {
                error: StageError::InputMismatch {
                    stage: "pipeline",
                    expected: "report",
                    got: other.kind(),
                },
                summary: RunSummary::default(),
            }),
        }
    }
}
