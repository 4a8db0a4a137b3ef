//! Conversational lookup agent.
//!
//! Answers natural-language questions about persisted characters by
//! letting the model call the read-only store tools. Independent of the
//! analysis pipeline: it reads whatever the store currently holds.

use super::tools::{execute_tool_call, QueryTools};
use crate::model::Model;
use crate::store::{CharacterStore, StorageError};
use gemini::{Content, Request, Role};
use std::sync::Arc;
use thiserror::Error;

/// Errors from the query agent.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("API error: {0}")]
    Api(#[from] gemini::Error),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration for the query agent.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens for responses.
    pub max_tokens: u32,

    /// Temperature for generation.
    pub temperature: Option<f32>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 2048,
            temperature: Some(0.7),
        }
    }
}

/// The character lookup agent.
pub struct QueryAgent {
    model: Arc<dyn Model>,
    store: Arc<CharacterStore>,
    config: QueryConfig,
}

impl QueryAgent {
    pub fn new(model: Arc<dyn Model>, store: Arc<CharacterStore>) -> Self {
        Self {
            model,
            store,
            config: QueryConfig::default(),
        }
    }

    /// Configure the agent.
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    /// Answer one question about the persisted characters.
    ///
    /// Runs the tool loop until the model answers without requesting
    /// another lookup. Asking about an unknown name is not an error;
    /// the model sees the not-found payload and says so in its answer.
    pub async fn ask(&self, question: &str) -> Result<String, QueryError> {
        let mut messages = vec![Content::user(question)];
        let mut answer = String::new();

        loop {
            let mut request = Request::new(messages.clone())
                .with_system(include_str!("prompts/query.txt"))
                .with_max_tokens(self.config.max_tokens)
                .with_tools(QueryTools::all());
            if let Some(ref model) = self.config.model {
                request = request.with_model(model);
            }
            if let Some(temperature) = self.config.temperature {
                request = request.with_temperature(temperature);
            }

            let response = self.model.complete(request).await?;

            let text = response.text();
            if !text.is_empty() {
                if !answer.is_empty() {
                    answer.push('\n');
                }
                answer.push_str(&text);
            }

            let calls: Vec<_> = response
                .function_calls()
                .into_iter()
                .cloned()
                .collect();
            if calls.is_empty() {
                break;
            }

            messages.push(Content {
                role: Role::Model,
                parts: response.content.clone(),
            });

            for call in &calls {
                tracing::debug!(tool = %call.name, "executing lookup tool");
                let result = execute_tool_call(&self.store, call)?;
                messages.push(Content::function_response(&call.name, result));
            }
        }

        Ok(answer)
    }
}
