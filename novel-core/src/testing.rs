//! Testing utilities for the character pipeline.
//!
//! This module provides tools for integration testing:
//! - `MockModel` for deterministic testing without API calls
//! - `PipelineHarness` for scripted analysis runs against an in-memory store
//! - Assertion helpers for verifying store state

use crate::character::CharacterRecord;
use crate::model::Model;
use crate::pipeline::{Pipeline, PipelineError, RunSummary};
use crate::store::{CharacterSink, CharacterStore, StorageError};
use async_trait::async_trait;
use gemini::{FinishReason, FunctionCall, Part, Request, Response, Usage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A mock model that returns scripted responses in order.
///
/// Use this for deterministic tests without API calls. Requests are
/// recorded so tests can inspect what was sent.
pub struct MockModel {
    responses: Mutex<VecDeque<Result<Response, gemini::Error>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain text reply.
    pub fn queue_text(&self, text: impl Into<String>) {
        self.queue_response(Response {
            content: vec![Part::Text(text.into())],
            finish_reason: FinishReason::Stop,
            usage: Usage {
                input_tokens: 0,
                output_tokens: 0,
            },
        });
    }

    /// Queue a reply that calls a function.
    pub fn queue_function_call(&self, name: impl Into<String>, args: serde_json::Value) {
        self.queue_response(Response {
            content: vec![Part::FunctionCall(FunctionCall {
                name: name.into(),
                args,
            })],
            finish_reason: FinishReason::Stop,
            usage: Usage {
                input_tokens: 0,
                output_tokens: 0,
            },
        });
    }

    /// Queue a full response.
    pub fn queue_response(&self, response: Response) {
        self.responses
            .lock()
            .expect("mock mutex poisoned")
            .push_back(Ok(response));
    }

    /// Queue an error.
    pub fn queue_error(&self, error: gemini::Error) {
        self.responses
            .lock()
            .expect("mock mutex poisoned")
            .push_back(Err(error));
    }

    /// Requests the mock has received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("mock mutex poisoned").clone()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Model for MockModel {
    async fn complete(&self, request: Request) -> Result<Response, gemini::Error> {
        self.requests
            .lock()
            .expect("mock mutex poisoned")
            .push(request);
        self.responses
            .lock()
            .expect("mock mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(gemini::Error::Network(
                    "mock model has no more scripted responses".to_string(),
                ))
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A store wrapper whose writes start failing after a set number of
/// successful upserts. Reads go through the wrapped store as usual.
pub struct FailingStore {
    inner: Arc<CharacterStore>,
    writes_left: Mutex<usize>,
}

impl FailingStore {
    /// Allow `successful_writes` upserts, then fail every write.
    pub fn after(inner: Arc<CharacterStore>, successful_writes: usize) -> Self {
        Self {
            inner,
            writes_left: Mutex::new(successful_writes),
        }
    }
}

impl CharacterSink for FailingStore {
    fn upsert(&self, record: &CharacterRecord) -> Result<(), StorageError> {
        let mut writes_left = self.writes_left.lock().expect("mock mutex poisoned");
        if *writes_left == 0 {
            return Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        *writes_left -= 1;
        self.inner.upsert(record)
    }
}

/// Test harness for running scripted pipeline scenarios.
pub struct PipelineHarness {
    /// The mock model, shared by the extractor and validator.
    pub model: Arc<MockModel>,
    /// In-memory store the pipeline persists into.
    pub store: Arc<CharacterStore>,
    pipeline: Pipeline,
}

impl PipelineHarness {
    pub fn new() -> Self {
        let model = Arc::new(MockModel::new());
        let store = Arc::new(
            CharacterStore::in_memory().expect("in-memory store should open"),
        );
        let pipeline = Pipeline::new(model.clone(), store.clone());
        Self {
            model,
            store,
            pipeline,
        }
    }

    /// Queue the extractor's reply for the next run.
    pub fn expect_extraction(&self, json: impl Into<String>) -> &Self {
        self.model.queue_text(json);
        self
    }

    /// Queue the validator's reply for the next run.
    pub fn expect_validation(&self, json: impl Into<String>) -> &Self {
        self.model.queue_text(json);
        self
    }

    /// Run the pipeline over the given text.
    pub async fn analyze(
        &self,
        text: &str,
        title: Option<&str>,
    ) -> Result<RunSummary, PipelineError> {
        self.pipeline.analyze(text, title).await
    }

    /// Number of characters currently persisted.
    pub fn saved_count(&self) -> usize {
        self.store.count().expect("store count should succeed")
    }

    /// Whether a character with this exact name is persisted.
    pub fn has_character(&self, name: &str) -> bool {
        self.store
            .get(name)
            .expect("store read should succeed")
            .is_some()
    }
}

impl Default for PipelineHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that a character with the given name is persisted.
#[track_caller]
pub fn assert_saved(harness: &PipelineHarness, name: &str) {
    assert!(
        harness.has_character(name),
        "Expected character '{name}' to be in the store"
    );
}

/// Assert that NO character with the given name is persisted.
#[track_caller]
pub fn assert_not_saved(harness: &PipelineHarness, name: &str) {
    assert!(
        !harness.has_character(name),
        "Expected character '{name}' to NOT be in the store"
    );
}

/// Assert the summary's counters.
#[track_caller]
pub fn assert_counts(summary: &RunSummary, extracted: usize, validated: usize, saved: usize) {
    assert_eq!(
        (
            summary.candidates_extracted,
            summary.validated,
            summary.saved
        ),
        (extracted, validated, saved),
        "Expected extracted/validated/saved {extracted}/{validated}/{saved}, \
         got {}/{}/{}",
        summary.candidates_extracted,
        summary.validated,
        summary.saved
    );
}
